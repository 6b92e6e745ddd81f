//! Skill requirement validation.
//!
//! Checks that a skill's declared prerequisites are satisfiable on this
//! host: any-of executables, all-of executables, required files (after
//! environment expansion), and required environment variables. `check`
//! gates on the first failing category; `diagnose` collects every
//! category's shortfalls for diagnostics.

use std::env;
use std::path::{Path, PathBuf};

use lazy_static::lazy_static;
use regex::Regex;

use super::error::SkillError;
use super::skill::SkillRequirements;

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// Shortfalls across all four requirement categories.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequirementsReport {
    /// All any-of candidates, when none of them resolved.
    pub missing_any_bins: Vec<String>,
    /// The subset of all-of executables that did not resolve.
    pub missing_all_bins: Vec<String>,
    /// The subset of required files that do not exist.
    pub missing_files: Vec<String>,
    /// The subset of required env vars that are unset or empty.
    pub missing_env: Vec<String>,
}

impl RequirementsReport {
    pub fn is_satisfied(&self) -> bool {
        self.missing_any_bins.is_empty()
            && self.missing_all_bins.is_empty()
            && self.missing_files.is_empty()
            && self.missing_env.is_empty()
    }

    /// One-line human summary of everything missing.
    pub fn summary(&self) -> String {
        let mut parts = Vec::new();
        if !self.missing_any_bins.is_empty() {
            parts.push(format!(
                "none of the executables [{}] found",
                self.missing_any_bins.join(", ")
            ));
        }
        if !self.missing_all_bins.is_empty() {
            parts.push(format!(
                "missing executables [{}]",
                self.missing_all_bins.join(", ")
            ));
        }
        if !self.missing_files.is_empty() {
            parts.push(format!("missing files [{}]", self.missing_files.join(", ")));
        }
        if !self.missing_env.is_empty() {
            parts.push(format!(
                "missing env vars [{}]",
                self.missing_env.join(", ")
            ));
        }
        parts.join("; ")
    }
}

// ---------------------------------------------------------------------------
// Checks
// ---------------------------------------------------------------------------

/// Gating check: short-circuits on the first failing category.
pub fn check(skill_name: &str, requirements: &SkillRequirements) -> Result<(), SkillError> {
    if !requirements.any_bins.is_empty()
        && !requirements.any_bins.iter().any(|b| resolve_executable(b).is_some())
    {
        return Err(SkillError::RequirementsNotMet {
            skill: skill_name.to_string(),
            detail: format!(
                "none of the executables [{}] found",
                requirements.any_bins.join(", ")
            ),
        });
    }

    let missing_bins: Vec<&String> = requirements
        .all_bins
        .iter()
        .filter(|b| resolve_executable(b).is_none())
        .collect();
    if !missing_bins.is_empty() {
        return Err(SkillError::RequirementsNotMet {
            skill: skill_name.to_string(),
            detail: format!(
                "missing executables [{}]",
                missing_bins
                    .iter()
                    .map(|s| s.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        });
    }

    let missing_files: Vec<&String> = requirements
        .files
        .iter()
        .filter(|f| !expand_path(f).exists())
        .collect();
    if !missing_files.is_empty() {
        return Err(SkillError::RequirementsNotMet {
            skill: skill_name.to_string(),
            detail: format!(
                "missing files [{}]",
                missing_files
                    .iter()
                    .map(|s| s.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        });
    }

    let missing_env: Vec<&String> = requirements
        .env
        .iter()
        .filter(|v| env_is_missing(v))
        .collect();
    if !missing_env.is_empty() {
        return Err(SkillError::RequirementsNotMet {
            skill: skill_name.to_string(),
            detail: format!(
                "missing env vars [{}]",
                missing_env
                    .iter()
                    .map(|s| s.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        });
    }

    Ok(())
}

/// Diagnostic check: reports every failing category simultaneously.
pub fn diagnose(requirements: &SkillRequirements) -> RequirementsReport {
    let mut report = RequirementsReport::default();

    if !requirements.any_bins.is_empty()
        && !requirements.any_bins.iter().any(|b| resolve_executable(b).is_some())
    {
        report.missing_any_bins = requirements.any_bins.clone();
    }

    report.missing_all_bins = requirements
        .all_bins
        .iter()
        .filter(|b| resolve_executable(b).is_none())
        .cloned()
        .collect();

    report.missing_files = requirements
        .files
        .iter()
        .filter(|f| !expand_path(f).exists())
        .cloned()
        .collect();

    report.missing_env = requirements
        .env
        .iter()
        .filter(|v| env_is_missing(v))
        .cloned()
        .collect();

    report
}

fn env_is_missing(name: &str) -> bool {
    env::var(name).map(|v| v.trim().is_empty()).unwrap_or(true)
}

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

/// Resolve an executable name against `$PATH`, checking the executable
/// bit. An absolute or relative path is checked directly.
pub fn resolve_executable(name: &str) -> Option<PathBuf> {
    let as_path = Path::new(name);
    if as_path.components().count() > 1 {
        return is_executable(as_path).then(|| as_path.to_path_buf());
    }

    let path_var = env::var_os("PATH")?;
    env::split_paths(&path_var)
        .map(|dir| dir.join(name))
        .find(|candidate| is_executable(candidate))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

lazy_static! {
    static ref ENV_REF: Regex =
        Regex::new(r"\$\{?([A-Za-z_][A-Za-z0-9_]*)\}?").expect("env ref regex");
}

/// Expand `~`, `$VAR`, and `${VAR}` in a declared file path; relative
/// paths resolve against the home directory.
pub fn expand_path(raw: &str) -> PathBuf {
    let home = env::var("HOME").unwrap_or_else(|_| ".".to_string());

    let mut expanded = ENV_REF
        .replace_all(raw, |caps: &regex::Captures<'_>| {
            env::var(&caps[1]).unwrap_or_default()
        })
        .into_owned();

    if expanded == "~" {
        expanded = home.clone();
    } else if let Some(rest) = expanded.strip_prefix("~/") {
        expanded = format!("{}/{}", home, rest);
    }

    let path = PathBuf::from(expanded);
    if path.is_absolute() {
        path
    } else {
        PathBuf::from(home).join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MISSING_BIN: &str = "definitely-not-a-real-binary-7f3a";

    #[test]
    fn test_resolve_common_executable() {
        // `sh` exists on any unix PATH this crate targets.
        assert!(resolve_executable("sh").is_some());
        assert!(resolve_executable(MISSING_BIN).is_none());
    }

    #[test]
    fn test_check_passes_empty_requirements() {
        assert!(check("s", &SkillRequirements::default()).is_ok());
    }

    #[test]
    fn test_check_any_bins_one_suffices() {
        let reqs = SkillRequirements {
            any_bins: vec![MISSING_BIN.to_string(), "sh".to_string()],
            ..Default::default()
        };
        assert!(check("s", &reqs).is_ok());
    }

    #[test]
    fn test_check_all_bins_names_missing_subset() {
        let reqs = SkillRequirements {
            all_bins: vec!["sh".to_string(), "ffmpeg-imaginary".to_string()],
            ..Default::default()
        };
        let err = check("media", &reqs).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("ffmpeg-imaginary"));
        assert!(!msg.contains("[sh"));
    }

    #[test]
    fn test_check_short_circuits_on_first_category() {
        let reqs = SkillRequirements {
            any_bins: vec![MISSING_BIN.to_string()],
            env: vec!["SKILLHOST_SURELY_UNSET_VAR".to_string()],
            ..Default::default()
        };
        let err = check("s", &reqs).unwrap_err();
        // Only the first failing category is reported.
        let msg = err.to_string();
        assert!(msg.contains("none of the executables"));
        assert!(!msg.contains("env"));
    }

    #[test]
    fn test_diagnose_reports_every_category() {
        let dir = tempfile::tempdir().unwrap();
        let missing_file = dir.path().join("absent.cfg");
        let reqs = SkillRequirements {
            any_bins: vec![MISSING_BIN.to_string()],
            all_bins: vec!["another-missing-bin".to_string()],
            files: vec![missing_file.to_string_lossy().into_owned()],
            env: vec!["SKILLHOST_SURELY_UNSET_VAR".to_string()],
        };
        let report = diagnose(&reqs);
        assert!(!report.is_satisfied());
        assert_eq!(report.missing_any_bins, vec![MISSING_BIN]);
        assert_eq!(report.missing_all_bins, vec!["another-missing-bin"]);
        assert_eq!(report.missing_files.len(), 1);
        assert_eq!(report.missing_env, vec!["SKILLHOST_SURELY_UNSET_VAR"]);
        assert!(report.summary().contains("missing env vars"));
    }

    #[test]
    fn test_diagnose_satisfied_when_requirements_met() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let reqs = SkillRequirements {
            all_bins: vec!["sh".to_string()],
            files: vec![file.path().to_string_lossy().into_owned()],
            ..Default::default()
        };
        assert!(diagnose(&reqs).is_satisfied());
    }

    #[test]
    fn test_expand_path_env_and_home() {
        env::set_var("SKILLHOST_TEST_DIR", "/opt/data");
        assert_eq!(
            expand_path("$SKILLHOST_TEST_DIR/file.txt"),
            PathBuf::from("/opt/data/file.txt")
        );

        let home = env::var("HOME").unwrap_or_else(|_| ".".to_string());
        assert_eq!(expand_path("~/notes.md"), PathBuf::from(format!("{}/notes.md", home)));
        assert_eq!(
            expand_path("relative.txt"),
            PathBuf::from(format!("{}/relative.txt", home))
        );
    }
}

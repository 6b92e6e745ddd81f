//! Skill discovery.
//!
//! Scans configured search paths for skill directories containing a
//! `SKILL.md` manifest, parses each one, attaches discovered scripts and
//! reference files, and validates requirements. Heterogeneous directories
//! are expected: a subdirectory without a manifest is silently skipped,
//! a skill that fails to parse or validate is logged and excluded without
//! affecting its siblings, and a missing search path is non-fatal.

use std::fs;
use std::path::{Path, PathBuf};

use super::error::SkillError;
use super::manifest::{extract_actions, parse_manifest};
use super::skill::{
    ScriptInterpreter, Skill, SkillReference, SkillScript, MANIFEST_FILENAME,
};
use super::validator;

/// Conventional reference-file prefixes, matched case-insensitively
/// against top-level filenames (the manifest itself is excluded).
const REFERENCE_PREFIXES: &[&str] = &["readme", "usage", "notes", "examples", "reference"];

/// Discovers skills under a set of search paths.
#[derive(Debug, Clone)]
pub struct SkillLoader {
    search_paths: Vec<PathBuf>,
}

impl SkillLoader {
    /// Create a loader. Empty `search_paths` falls back to the defaults:
    /// `~/.skillhost/skills` and `./skills`.
    pub fn new(search_paths: Vec<PathBuf>) -> Self {
        let search_paths = if search_paths.is_empty() {
            default_search_paths()
        } else {
            search_paths
        };
        Self { search_paths }
    }

    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    /// Discover every loadable, valid skill. Never fails as a whole;
    /// individual problems are logged and the skill excluded.
    pub fn discover(&self) -> Vec<Skill> {
        let mut skills = Vec::new();

        for search_path in &self.search_paths {
            if !search_path.is_dir() {
                log::debug!("skill search path {} does not exist, skipping", search_path.display());
                continue;
            }

            let entries = match fs::read_dir(search_path) {
                Ok(entries) => entries,
                Err(e) => {
                    log::warn!("cannot read skill search path {}: {}", search_path.display(), e);
                    continue;
                }
            };

            for entry in entries.flatten() {
                let dir = entry.path();
                if !dir.is_dir() {
                    continue;
                }
                match load_skill_dir(&dir) {
                    Ok(Some(skill)) => match validator::check(&skill.name, &skill.requirements) {
                        Ok(()) => {
                            log::debug!("loaded skill '{}' from {}", skill.name, dir.display());
                            skills.push(skill);
                        }
                        Err(e) => {
                            log::warn!("skill '{}' excluded: {}", skill.name, e);
                        }
                    },
                    Ok(None) => {} // no manifest, not a skill directory
                    Err(e) => {
                        log::warn!("failed to load skill from {}: {}", dir.display(), e);
                    }
                }
            }
        }

        skills.sort_by(|a, b| a.name.cmp(&b.name));
        skills
    }
}

fn default_search_paths() -> Vec<PathBuf> {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    vec![
        PathBuf::from(home).join(".skillhost").join("skills"),
        PathBuf::from("skills"),
    ]
}

// ---------------------------------------------------------------------------
// Loading one directory
// ---------------------------------------------------------------------------

/// Load a single skill directory. `Ok(None)` means "no manifest here".
pub fn load_skill_dir(dir: &Path) -> Result<Option<Skill>, SkillError> {
    let manifest_path = Skill::manifest_path(dir);
    if !manifest_path.is_file() {
        return Ok(None);
    }

    let content = fs::read_to_string(&manifest_path)?;
    let path_label = manifest_path.display().to_string();
    let parsed = parse_manifest(&content, &path_label)?;

    let name = parsed
        .meta
        .name
        .filter(|n| !n.trim().is_empty())
        .ok_or(SkillError::MissingField {
            path: path_label.clone(),
            field: "name",
        })?;
    let description = parsed
        .meta
        .description
        .filter(|d| !d.trim().is_empty())
        .ok_or(SkillError::MissingField {
            path: path_label,
            field: "description",
        })?;

    let actions = extract_actions(&parsed.body);
    let scripts = discover_scripts(dir);
    let references = discover_references(dir);

    Ok(Some(Skill {
        name,
        description,
        emoji: parsed.meta.emoji,
        dir: dir.to_path_buf(),
        body: parsed.body,
        requirements: parsed.meta.requirements,
        env: parsed.meta.env,
        scripts,
        references,
        actions,
    }))
}

// ---------------------------------------------------------------------------
// Scripts
// ---------------------------------------------------------------------------

/// Any executable file under the directory whose extension maps to a
/// known interpreter counts as a script; its name is the file stem.
fn discover_scripts(dir: &Path) -> Vec<SkillScript> {
    let mut scripts = Vec::new();
    collect_scripts(dir, dir, &mut scripts);
    scripts.sort_by(|a, b| a.path.cmp(&b.path));
    scripts
}

fn collect_scripts(root: &Path, dir: &Path, out: &mut Vec<SkillScript>) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_scripts(root, &path, out);
            continue;
        }
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            continue;
        };
        let Some(interpreter) = ScriptInterpreter::from_extension(ext) else {
            continue;
        };
        if !is_executable_file(&path) {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        let rel = path.strip_prefix(root).unwrap_or(&path).to_path_buf();
        out.push(SkillScript {
            name: stem.to_string(),
            path: rel,
            interpreter,
        });
    }
}

#[cfg(unix)]
fn is_executable_file(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable_file(path: &Path) -> bool {
    path.is_file()
}

// ---------------------------------------------------------------------------
// References
// ---------------------------------------------------------------------------

/// Match the small fixed set of conventional reference files: top-level
/// README*/USAGE*/NOTES*/EXAMPLES*/reference*, plus markdown under
/// `docs/`. The manifest itself never counts.
fn discover_references(dir: &Path) -> Vec<SkillReference> {
    let mut references = Vec::new();

    if let Ok(entries) = fs::read_dir(dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if file_name == MANIFEST_FILENAME {
                continue;
            }
            let lower = file_name.to_lowercase();
            if let Some(category) = REFERENCE_PREFIXES.iter().find(|p| lower.starts_with(*p)) {
                references.push(SkillReference {
                    name: file_name.to_string(),
                    path: PathBuf::from(file_name),
                    category: (*category).to_string(),
                });
            }
        }
    }

    let docs_dir = dir.join("docs");
    if let Ok(entries) = fs::read_dir(&docs_dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            let is_markdown = path.extension().and_then(|e| e.to_str()) == Some("md");
            if path.is_file() && is_markdown {
                if let Some(file_name) = path.file_name().and_then(|n| n.to_str()) {
                    references.push(SkillReference {
                        name: file_name.to_string(),
                        path: PathBuf::from("docs").join(file_name),
                        category: "docs".to_string(),
                    });
                }
            }
        }
    }

    references.sort_by(|a, b| a.path.cmp(&b.path));
    references
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn write_manifest(dir: &Path, content: &str) {
        fs::write(dir.join(MANIFEST_FILENAME), content).unwrap();
    }

    #[cfg(unix)]
    fn write_script(dir: &Path, name: &str, body: &str) {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join(name);
        fs::write(&path, body).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    }

    fn skill_dir(root: &Path, name: &str) -> PathBuf {
        let dir = root.join(name);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_directories_without_manifest_skipped() {
        let root = tempfile::tempdir().unwrap();
        skill_dir(root.path(), "just-data");
        fs::write(root.path().join("just-data").join("data.txt"), "x").unwrap();

        let skills = SkillLoader::new(vec![root.path().to_path_buf()]).discover();
        assert!(skills.is_empty());
    }

    #[test]
    fn test_missing_search_path_non_fatal() {
        let skills =
            SkillLoader::new(vec![PathBuf::from("/nonexistent/skillhost-test-path")]).discover();
        assert!(skills.is_empty());
    }

    #[test]
    fn test_loads_valid_skill() {
        let root = tempfile::tempdir().unwrap();
        let dir = skill_dir(root.path(), "weather");
        write_manifest(
            &dir,
            "---\nname: weather\ndescription: get forecasts\n---\n## Current\n\nWeather now.\n",
        );

        let skills = SkillLoader::new(vec![root.path().to_path_buf()]).discover();
        assert_eq!(skills.len(), 1);
        assert_eq!(skills[0].name, "weather");
        assert_eq!(skills[0].actions, vec!["current"]);
    }

    #[test]
    fn test_skill_missing_description_excluded() {
        let root = tempfile::tempdir().unwrap();
        let dir = skill_dir(root.path(), "broken");
        write_manifest(&dir, "---\nname: broken\n---\nbody\n");

        let skills = SkillLoader::new(vec![root.path().to_path_buf()]).discover();
        assert!(skills.is_empty());

        // The underlying error names the field.
        let err = load_skill_dir(&dir).unwrap_err();
        assert!(matches!(err, SkillError::MissingField { field: "description", .. }));
    }

    #[test]
    fn test_unmet_requirements_excluded_but_parseable() {
        let root = tempfile::tempdir().unwrap();
        let dir = skill_dir(root.path(), "media");
        write_manifest(
            &dir,
            "---\nname: media\ndescription: convert media\nallBins: [no-such-transcoder-bin]\n---\nbody\n",
        );

        // Load succeeds...
        assert!(load_skill_dir(&dir).unwrap().is_some());
        // ...but discovery excludes it on validation.
        let skills = SkillLoader::new(vec![root.path().to_path_buf()]).discover();
        assert!(skills.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_scripts_and_references_attached() {
        let root = tempfile::tempdir().unwrap();
        let dir = skill_dir(root.path(), "tasks");
        write_manifest(&dir, "---\nname: tasks\ndescription: manage tasks\n---\nbody\n");
        write_script(&dir, "list.sh", "#!/bin/sh\necho listing\n");
        write_script(&dir, "add.py", "#!/usr/bin/env python3\nprint('add')\n");
        // Non-executable files and unknown extensions are not scripts.
        fs::write(dir.join("helper.py"), "print('nope')").unwrap();
        fs::write(dir.join("data.csv"), "a,b").unwrap();
        fs::write(dir.join("README.md"), "# tasks").unwrap();
        fs::create_dir_all(dir.join("docs")).unwrap();
        fs::write(dir.join("docs").join("guide.md"), "guide").unwrap();

        let skill = load_skill_dir(&dir).unwrap().unwrap();
        let script_names: Vec<&str> = skill.scripts.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(script_names, vec!["add", "list"]);
        assert_eq!(skill.scripts[1].interpreter, ScriptInterpreter::Shell);

        let ref_names: Vec<&str> = skill.references.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(ref_names, vec!["README.md", "guide.md"]);
        assert_eq!(skill.references[1].category, "docs");
    }

    #[test]
    fn test_nested_scripts_found() {
        #[cfg(unix)]
        {
            let root = tempfile::tempdir().unwrap();
            let dir = skill_dir(root.path(), "deep");
            write_manifest(&dir, "---\nname: deep\ndescription: nested\n---\nbody\n");
            fs::create_dir_all(dir.join("bin")).unwrap();
            write_script(&dir.join("bin"), "run.sh", "#!/bin/sh\n");

            let skill = load_skill_dir(&dir).unwrap().unwrap();
            assert_eq!(skill.scripts.len(), 1);
            assert_eq!(skill.scripts[0].path, PathBuf::from("bin/run.sh"));
        }
    }
}

//! Skill data model.
//!
//! A skill is a filesystem-discovered unit of external functionality:
//! a `SKILL.md` manifest (metadata block + documentation body), optional
//! executable scripts, and optional reference files. Skills are built by
//! discovery, immutable within a cache window, and replaced wholesale on
//! reload.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Conventional manifest filename inside a skill directory.
pub const MANIFEST_FILENAME: &str = "SKILL.md";

// ---------------------------------------------------------------------------
// Requirements
// ---------------------------------------------------------------------------

/// Declared prerequisites of a skill, four independently validated
/// classes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SkillRequirements {
    /// At least one of these executables must resolve on `$PATH`.
    #[serde(rename = "anyBins")]
    pub any_bins: Vec<String>,
    /// Every one of these executables must resolve on `$PATH`.
    #[serde(rename = "allBins")]
    pub all_bins: Vec<String>,
    /// Files that must exist (env-expanded; relative paths resolve
    /// against the home directory).
    #[serde(rename = "requiredFiles")]
    pub files: Vec<String>,
    /// Environment variables that must be set non-empty.
    #[serde(rename = "requiredEnv")]
    pub env: Vec<String>,
}

impl SkillRequirements {
    pub fn is_empty(&self) -> bool {
        self.any_bins.is_empty()
            && self.all_bins.is_empty()
            && self.files.is_empty()
            && self.env.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Scripts
// ---------------------------------------------------------------------------

/// Interpreter inferred from a script's file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScriptInterpreter {
    Shell,
    Python,
    Node,
    Ruby,
    Perl,
    Php,
}

impl ScriptInterpreter {
    /// Map a file extension to a known interpreter.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "sh" | "bash" => Some(Self::Shell),
            "py" => Some(Self::Python),
            "js" | "mjs" => Some(Self::Node),
            "rb" => Some(Self::Ruby),
            "pl" => Some(Self::Perl),
            "php" => Some(Self::Php),
            _ => None,
        }
    }

    /// Program used to run a script with this interpreter.
    pub fn program(&self) -> &'static str {
        match self {
            Self::Shell => "bash",
            Self::Python => "python3",
            Self::Node => "node",
            Self::Ruby => "ruby",
            Self::Perl => "perl",
            Self::Php => "php",
        }
    }
}

/// An executable script discovered under a skill directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillScript {
    /// Filename without extension.
    pub name: String,
    /// Path relative to the skill directory.
    pub path: PathBuf,
    pub interpreter: ScriptInterpreter,
}

// ---------------------------------------------------------------------------
// References
// ---------------------------------------------------------------------------

/// A conventional reference file (README, usage notes, examples, ...)
/// discovered alongside the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillReference {
    pub name: String,
    /// Path relative to the skill directory.
    pub path: PathBuf,
    /// Which conventional pattern matched (readme, usage, notes,
    /// examples, reference, docs).
    pub category: String,
}

// ---------------------------------------------------------------------------
// Skill
// ---------------------------------------------------------------------------

/// A fully loaded skill.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Skill {
    pub name: String,
    pub description: String,
    /// Display hint shown alongside the name (an emoji by convention).
    pub emoji: Option<String>,
    /// Directory the skill was loaded from.
    pub dir: PathBuf,
    /// Free-text documentation body (manifest minus the metadata block).
    pub body: String,
    pub requirements: SkillRequirements,
    /// Skill-specific environment variables injected into every
    /// invocation, from the manifest's `env:` map.
    pub env: std::collections::HashMap<String, String>,
    pub scripts: Vec<SkillScript>,
    pub references: Vec<SkillReference>,
    /// Action vocabulary mined from the body, in precedence order.
    pub actions: Vec<String>,
}

impl Skill {
    /// Absolute path of a script belonging to this skill.
    pub fn script_path(&self, script: &SkillScript) -> PathBuf {
        self.dir.join(&script.path)
    }

    /// Display label combining the emoji hint and the name.
    pub fn display_label(&self) -> String {
        match &self.emoji {
            Some(emoji) => format!("{} {}", emoji, self.name),
            None => self.name.clone(),
        }
    }

    pub fn manifest_path(dir: &Path) -> PathBuf {
        dir.join(MANIFEST_FILENAME)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interpreter_from_extension() {
        assert_eq!(
            ScriptInterpreter::from_extension("sh"),
            Some(ScriptInterpreter::Shell)
        );
        assert_eq!(
            ScriptInterpreter::from_extension("py"),
            Some(ScriptInterpreter::Python)
        );
        assert_eq!(ScriptInterpreter::from_extension("exe"), None);
    }

    #[test]
    fn test_requirements_is_empty() {
        assert!(SkillRequirements::default().is_empty());
        let reqs = SkillRequirements {
            all_bins: vec!["ffmpeg".to_string()],
            ..Default::default()
        };
        assert!(!reqs.is_empty());
    }

    #[test]
    fn test_display_label_with_emoji() {
        let skill = Skill {
            name: "weather".to_string(),
            description: "get forecasts".to_string(),
            emoji: Some("🌤".to_string()),
            dir: PathBuf::from("/tmp/weather"),
            body: String::new(),
            requirements: SkillRequirements::default(),
            env: std::collections::HashMap::new(),
            scripts: Vec::new(),
            references: Vec::new(),
            actions: Vec::new(),
        };
        assert_eq!(skill.display_label(), "🌤 weather");
    }
}

//! Filesystem-discovered skills and their execution.
//!
//! A skill is a directory containing a `SKILL.md` manifest (YAML
//! frontmatter plus a Markdown body), optional scripts, and optional
//! reference documents. Discovered skills are validated against their
//! declared requirements, cached with a TTL, and exposed to models as
//! tools through the adapter.

pub mod adapter;
pub mod discovery;
pub mod error;
pub mod executor;
pub mod manager;
pub mod manifest;
pub mod skill;
pub mod validator;

pub use adapter::generate_tools;
pub use discovery::SkillLoader;
pub use error::SkillError;
pub use executor::SkillExecutor;
pub use manager::SkillManager;
pub use manifest::{extract_actions, parse_manifest, SkillManifest};
pub use skill::{Skill, SkillReference, SkillRequirements, SkillScript, MANIFEST_FILENAME};
pub use validator::RequirementsReport;

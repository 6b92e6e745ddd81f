//! Error types for the skills subsystem.

use thiserror::Error;

/// Errors raised while loading, validating, or executing skills.
///
/// Load-time and validation errors exclude one skill without affecting
/// others; dispatch-level problems surface as failed tool results rather
/// than propagating as errors.
#[derive(Debug, Error)]
pub enum SkillError {
    /// Opening metadata delimiter with no closing one.
    #[error("malformed metadata block in {path}: {message}")]
    MalformedMetadata { path: String, message: String },

    /// Metadata parsed but a mandatory field is absent.
    #[error("manifest in {path} is missing required field '{field}'")]
    MissingField { path: String, field: &'static str },

    /// Metadata block is not valid YAML.
    #[error("invalid metadata in {path}: {source}")]
    InvalidMetadata {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    /// A prerequisite category failed its gating check.
    #[error("skill '{skill}' requirements not met: {detail}")]
    RequirementsNotMet { skill: String, detail: String },

    /// Lookup against the available set missed.
    #[error("skill '{0}' not found")]
    NotFound(String),

    /// Action rejected by the skill's configured allow-list.
    #[error("action '{action}' is not allowed for skill '{skill}'")]
    ActionNotAllowed { skill: String, action: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

//! Runtime configuration consumed at construction time.
//!
//! The embedding runtime (session/workspace layer) owns where this comes
//! from; this crate only consumes the resolved values.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::tools::engine::{DEFAULT_MAX_DEPTH, DEFAULT_MAX_PARALLEL};

/// Default cache window for the discovered skill set.
pub const DEFAULT_CACHE_TTL_SECS: u64 = 3600;

/// Default wall-clock bound for one skill invocation.
pub const DEFAULT_EXEC_TIMEOUT_SECS: u64 = 30;

/// Configuration for the skills subsystem and the execution engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SkillsConfig {
    /// Master switch; when off, initialization and discovery are no-ops.
    pub enabled: bool,
    /// Directories scanned for skill subdirectories. Empty means the
    /// loader defaults apply.
    pub search_paths: Vec<PathBuf>,
    /// Seconds a discovered skill set stays fresh.
    pub cache_ttl_secs: u64,
    /// Seconds one skill invocation may run.
    pub exec_timeout_secs: u64,
    /// Optional per-skill action allow-lists. A skill with no entry
    /// permits all actions.
    pub allowed_actions: HashMap<String, Vec<String>>,
    /// Maximum simultaneous tool executions in a batch.
    pub max_parallel: usize,
    /// Maximum tool-calling rounds per conversation turn.
    pub max_depth: u32,
}

impl Default for SkillsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            search_paths: Vec::new(),
            cache_ttl_secs: DEFAULT_CACHE_TTL_SECS,
            exec_timeout_secs: DEFAULT_EXEC_TIMEOUT_SECS,
            allowed_actions: HashMap::new(),
            max_parallel: DEFAULT_MAX_PARALLEL,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl SkillsConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn exec_timeout(&self) -> Duration {
        Duration::from_secs(self.exec_timeout_secs)
    }

    /// Whether `action` is permitted for `skill`. Absence of an
    /// allow-list permits everything.
    pub fn action_allowed(&self, skill: &str, action: &str) -> bool {
        match self.allowed_actions.get(skill) {
            Some(allowed) => allowed.iter().any(|a| a == action),
            None => true,
        }
    }
}

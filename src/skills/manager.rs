//! Skill manager: registry plus TTL cache.
//!
//! Owns the cached, validated skill set and the execution defaults.
//! Discovery and execution may be hit concurrently by multiple in-flight
//! conversation turns, so the cache sits behind a read/write lock:
//! concurrent readers on fresh hits, an exclusive writer only on a cache
//! miss or an explicit reload. The manager is an injected struct — tests
//! construct independent instances; nothing here is a singleton.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tokio::sync::RwLock;

use super::adapter;
use super::discovery::{load_skill_dir, SkillLoader};
use super::error::SkillError;
use super::executor::SkillExecutor;
use super::skill::Skill;
use super::validator::{self, RequirementsReport};
use crate::config::SkillsConfig;
use crate::tools::tool::{Tool, ToolResult};

#[derive(Debug, Default)]
struct CacheState {
    skills: Vec<Skill>,
    refreshed_at: Option<Instant>,
    initialized: bool,
}

/// Owns the validated skill set, its cache window, and execution
/// defaults.
pub struct SkillManager {
    config: SkillsConfig,
    loader: SkillLoader,
    executor: SkillExecutor,
    state: RwLock<CacheState>,
}

impl SkillManager {
    pub fn new(config: SkillsConfig) -> Self {
        let loader = SkillLoader::new(config.search_paths.clone());
        let executor = SkillExecutor::with_timeout(config.exec_timeout());
        Self {
            config,
            loader,
            executor,
            state: RwLock::new(CacheState::default()),
        }
    }

    pub fn config(&self) -> &SkillsConfig {
        &self.config
    }

    /// Eagerly discover and cache. A no-op success when disabled.
    pub async fn init(&self) -> Result<(), SkillError> {
        if !self.config.enabled {
            log::debug!("skills disabled, skipping initialization");
            return Ok(());
        }
        let mut state = self.state.write().await;
        let skills = self.loader.discover();
        log::info!("initialized skill manager with {} skill(s)", skills.len());
        state.skills = skills;
        state.refreshed_at = Some(Instant::now());
        state.initialized = true;
        Ok(())
    }

    /// Read-through cache of the available (validated) skill set.
    pub async fn available_skills(&self) -> Vec<Skill> {
        if !self.config.enabled {
            return Vec::new();
        }

        {
            let state = self.state.read().await;
            if self.is_fresh(&state) {
                return state.skills.clone();
            }
        }

        let mut state = self.state.write().await;
        // Another writer may have refreshed while we waited.
        if self.is_fresh(&state) {
            return state.skills.clone();
        }
        let skills = self.loader.discover();
        log::debug!("skill cache refreshed: {} skill(s)", skills.len());
        state.skills = skills;
        state.refreshed_at = Some(Instant::now());
        state.skills.clone()
    }

    fn is_fresh(&self, state: &CacheState) -> bool {
        state
            .refreshed_at
            .map(|at| at.elapsed() < self.config.cache_ttl())
            .unwrap_or(false)
    }

    /// Look up one skill within the available set.
    pub async fn skill(&self, name: &str) -> Result<Skill, SkillError> {
        self.available_skills()
            .await
            .into_iter()
            .find(|s| s.name == name)
            .ok_or_else(|| SkillError::NotFound(name.to_string()))
    }

    /// Execute an action of a named skill. Dispatch problems (unknown
    /// skill, disallowed action) come back as failed results, never as
    /// process faults.
    pub async fn execute(
        &self,
        name: &str,
        action: &str,
        args: &HashMap<String, Value>,
    ) -> ToolResult {
        let skill = match self.skill(name).await {
            Ok(skill) => skill,
            Err(e) => return ToolResult::fail(e.to_string()),
        };

        if !self.config.action_allowed(name, action) {
            return ToolResult::fail(
                SkillError::ActionNotAllowed {
                    skill: name.to_string(),
                    action: action.to_string(),
                }
                .to_string(),
            );
        }

        self.executor.execute(&skill, action, args).await
    }

    /// Generate the tool set for the available skills. Regenerated on
    /// demand, never persisted.
    pub async fn tools(self: &Arc<Self>) -> Vec<Arc<dyn Tool>> {
        let skills = self.available_skills().await;
        adapter::generate_tools(self, &skills)
    }

    /// Force cache invalidation, bypassing the TTL.
    pub async fn reload(&self) -> usize {
        let mut state = self.state.write().await;
        let skills = self.loader.discover();
        log::info!("skills reloaded: {} skill(s)", skills.len());
        state.skills = skills;
        state.refreshed_at = Some(Instant::now());
        state.skills.len()
    }

    /// Full requirements diagnostics for a skill, including skills that
    /// validation excluded from the available set.
    pub async fn diagnose(&self, name: &str) -> Result<RequirementsReport, SkillError> {
        // The available set already dropped invalid skills, so rescan.
        for search_path in self.loader.search_paths() {
            let Ok(entries) = std::fs::read_dir(search_path) else {
                continue;
            };
            for entry in entries.flatten() {
                let dir = entry.path();
                if !dir.is_dir() {
                    continue;
                }
                if let Ok(Some(skill)) = load_skill_dir(&dir) {
                    if skill.name == name {
                        return Ok(validator::diagnose(&skill.requirements));
                    }
                }
            }
        }
        Err(SkillError::NotFound(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    use super::*;
    use crate::skills::skill::MANIFEST_FILENAME;

    fn write_skill(root: &Path, dir_name: &str, manifest: &str) {
        let dir = root.join(dir_name);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(MANIFEST_FILENAME), manifest).unwrap();
    }

    fn config_for(root: &Path) -> SkillsConfig {
        SkillsConfig {
            search_paths: vec![root.to_path_buf()],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_disabled_manager_is_inert() {
        let mut config = SkillsConfig::default();
        config.enabled = false;
        let manager = SkillManager::new(config);
        manager.init().await.unwrap();
        assert!(manager.available_skills().await.is_empty());
    }

    #[tokio::test]
    async fn test_lookup_and_not_found() {
        let root = tempfile::tempdir().unwrap();
        write_skill(
            root.path(),
            "notes",
            "---\nname: notes\ndescription: take notes\n---\nbody\n",
        );
        let manager = SkillManager::new(config_for(root.path()));
        manager.init().await.unwrap();

        assert_eq!(manager.skill("notes").await.unwrap().name, "notes");
        assert!(matches!(
            manager.skill("missing").await,
            Err(SkillError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_execute_unknown_skill_is_failed_result() {
        let root = tempfile::tempdir().unwrap();
        let manager = SkillManager::new(config_for(root.path()));
        let result = manager.execute("ghost", "status", &HashMap::new()).await;
        assert!(!result.success);
        assert!(result.error.as_deref().unwrap().contains("not found"));
    }

    #[tokio::test]
    async fn test_action_allow_list_enforced() {
        let root = tempfile::tempdir().unwrap();
        write_skill(
            root.path(),
            "mail",
            "---\nname: mail\ndescription: send mail\n---\nbody\n",
        );
        let mut config = config_for(root.path());
        config
            .allowed_actions
            .insert("mail".to_string(), vec!["send".to_string()]);
        let manager = SkillManager::new(config);

        let result = manager.execute("mail", "delete", &HashMap::new()).await;
        assert!(!result.success);
        assert!(result.error.as_deref().unwrap().contains("not allowed"));
    }

    #[tokio::test]
    async fn test_reload_bypasses_ttl() {
        let root = tempfile::tempdir().unwrap();
        write_skill(
            root.path(),
            "first",
            "---\nname: first\ndescription: one\n---\nbody\n",
        );
        let manager = SkillManager::new(config_for(root.path()));
        assert_eq!(manager.available_skills().await.len(), 1);

        // Within the TTL the cache hides the new skill...
        write_skill(
            root.path(),
            "second",
            "---\nname: second\ndescription: two\n---\nbody\n",
        );
        assert_eq!(manager.available_skills().await.len(), 1);

        // ...until an explicit reload.
        assert_eq!(manager.reload().await, 2);
        assert_eq!(manager.available_skills().await.len(), 2);
    }

    #[tokio::test]
    async fn test_diagnose_covers_excluded_skills() {
        let root = tempfile::tempdir().unwrap();
        write_skill(
            root.path(),
            "media",
            "---\nname: media\ndescription: convert\nallBins: [no-such-transcoder-bin]\n---\nbody\n",
        );
        let manager = SkillManager::new(config_for(root.path()));

        // Excluded from the available set...
        assert!(manager.available_skills().await.is_empty());
        // ...but still diagnosable.
        let report = manager.diagnose("media").await.unwrap();
        assert_eq!(report.missing_all_bins, vec!["no-such-transcoder-bin"]);
    }
}

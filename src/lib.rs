//! # Skillhost
//!
//! Execution core for skill-driven agents: skills are discovered on the
//! filesystem as `SKILL.md` manifests, validated against their declared
//! requirements, adapted into model-invocable tools, and executed singly,
//! in bounded-parallel batches, or inside a depth-bounded tool-calling
//! conversation loop.
//!
//! The main entry points are [`skills::SkillManager`] for discovery and
//! execution and [`tools::ToolEngine`] for dispatch and the turn loop.

pub mod config;
pub mod llm;
pub mod skills;
pub mod tools;

/// Initialize logging from `RUST_LOG`, once per process. Safe to call
/// from tests and binaries alike; repeated calls are ignored.
pub fn init_logging() {
    let _ = env_logger::builder().format_timestamp_secs().try_init();
}

pub use config::SkillsConfig;
pub use llm::{ChatMessage, ChatModel, ChatResponse, Role, TokenUsage, ToolDefinition};
pub use skills::{Skill, SkillError, SkillExecutor, SkillLoader, SkillManager};
pub use tools::{
    EngineConfig, Tool, ToolCall, ToolEngine, ToolExecution, ToolRegistry, ToolResult, TurnOutcome,
};

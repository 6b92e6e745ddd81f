//! Skill-to-tool adapter.
//!
//! Converts each available skill into one general-purpose tool (action
//! constrained to the mined vocabulary plus a free-form argument bag)
//! and zero-or-more action-specific tools, one per vocabulary action on
//! the fixed key-action allow-list. The allow-list bounds tool
//! proliferation; everything else stays reachable through the general
//! tool's `action` parameter.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::manager::SkillManager;
use super::skill::Skill;
use crate::tools::tool::{Tool, ToolResult};

/// Actions important enough to earn a dedicated tool.
pub const KEY_ACTIONS: &[&str] = &[
    "search", "read", "send", "list", "current", "forecast", "check", "status",
];

/// Fallback vocabulary when mining found nothing.
pub const FALLBACK_ACTIONS: &[&str] = &["status", "help"];

/// Generate the full tool set for the given skills.
pub fn generate_tools(manager: &Arc<SkillManager>, skills: &[Skill]) -> Vec<Arc<dyn Tool>> {
    let mut tools: Vec<Arc<dyn Tool>> = Vec::new();
    for skill in skills {
        tools.push(Arc::new(SkillTool::general(manager.clone(), skill)));
        // The effective vocabulary, not the raw mined list: a skill with
        // no mined actions still exposes its fallback actions.
        for action in vocabulary(skill) {
            if KEY_ACTIONS.contains(&action.as_str()) {
                tools.push(Arc::new(SkillTool::for_action(
                    manager.clone(),
                    skill,
                    &action,
                )));
            }
        }
    }
    tools
}

fn sanitize_name(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

fn vocabulary(skill: &Skill) -> Vec<String> {
    if skill.actions.is_empty() {
        FALLBACK_ACTIONS.iter().map(|s| s.to_string()).collect()
    } else {
        skill.actions.clone()
    }
}

// ---------------------------------------------------------------------------
// SkillTool
// ---------------------------------------------------------------------------

/// A tool backed by a skill, either general (action chosen per call) or
/// bound to one action.
pub struct SkillTool {
    manager: Arc<SkillManager>,
    skill_name: String,
    tool_name: String,
    description: String,
    parameters: Value,
    /// `None` for the general variant.
    action: Option<String>,
    vocabulary: Vec<String>,
}

impl SkillTool {
    fn general(manager: Arc<SkillManager>, skill: &Skill) -> Self {
        let vocabulary = vocabulary(skill);
        let description = format!(
            "{}: {} Actions: {}.",
            skill.display_label(),
            skill.description,
            vocabulary.join(", ")
        );
        let parameters = json!({
            "type": "object",
            "properties": {
                "action": {
                    "type": "string",
                    "enum": vocabulary,
                    "description": "Which action of the skill to run",
                },
                "args": {
                    "type": "object",
                    "description": "Free-form arguments passed to the action",
                },
            },
            "required": ["action"],
        });
        Self {
            manager,
            skill_name: skill.name.clone(),
            tool_name: format!("skill_{}", sanitize_name(&skill.name)),
            description,
            parameters,
            action: None,
            vocabulary,
        }
    }

    fn for_action(manager: Arc<SkillManager>, skill: &Skill, action: &str) -> Self {
        let description = format!(
            "{}: run the '{}' action. {}",
            skill.display_label(),
            action,
            skill.description
        );
        Self {
            manager,
            skill_name: skill.name.clone(),
            tool_name: format!("skill_{}_{}", sanitize_name(&skill.name), sanitize_name(action)),
            description,
            parameters: action_schema(action),
            action: Some(action.to_string()),
            vocabulary: vocabulary(skill),
        }
    }
}

/// Schema customization per key action.
fn action_schema(action: &str) -> Value {
    match action {
        "search" => json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "Search query" },
            },
            "required": ["query"],
        }),
        "forecast" | "current" => json!({
            "type": "object",
            "properties": {
                "location": { "type": "string", "description": "Location of interest" },
            },
        }),
        "read" => json!({
            "type": "object",
            "properties": {
                "target": { "type": "string", "description": "What to read" },
            },
        }),
        _ => json!({ "type": "object", "properties": {} }),
    }
}

#[async_trait]
impl Tool for SkillTool {
    fn name(&self) -> &str {
        &self.tool_name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> Value {
        self.parameters.clone()
    }

    async fn execute(&self, args: HashMap<String, Value>) -> ToolResult {
        match &self.action {
            Some(action) => self.manager.execute(&self.skill_name, action, &args).await,
            None => {
                let Some(action) = args.get("action").and_then(|v| v.as_str()) else {
                    return ToolResult::fail(format!(
                        "missing 'action' parameter; available actions: {}",
                        self.vocabulary.join(", ")
                    ));
                };
                let action_args: HashMap<String, Value> = args
                    .get("args")
                    .and_then(|v| v.as_object())
                    .map(|m| m.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
                    .unwrap_or_default();
                self.manager
                    .execute(&self.skill_name, action, &action_args)
                    .await
            }
        }
    }
}

//! Core tool abstractions.
//!
//! A `Tool` is one invocable unit exposed to the model — either generated
//! from a skill by the adapter or defined natively by the embedding
//! runtime. `ToolCall`/`ToolResult` are the invocation request/result pair;
//! `ToolExecution` wraps a completed invocation with timing for middleware
//! and accounting.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::llm::ToolDefinition;

// ---------------------------------------------------------------------------
// ToolCall
// ---------------------------------------------------------------------------

/// One request to run a tool with specific arguments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Provider-assigned call id, echoed back in formatted results.
    pub id: String,
    /// Name of the tool to invoke.
    pub name: String,
    /// Free-form argument map.
    #[serde(default)]
    pub arguments: HashMap<String, Value>,
}

impl ToolCall {
    pub fn new(name: impl Into<String>, arguments: HashMap<String, Value>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            arguments,
        }
    }
}

// ---------------------------------------------------------------------------
// ToolResult
// ---------------------------------------------------------------------------

/// Outcome of one tool invocation.
///
/// Invariants: success implies `content` is meaningful; failure implies
/// `error` is meaningful. Both variants may carry partial `data`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub success: bool,
    pub content: String,
    /// Structured payload, when the tool's output parsed as JSON.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolResult {
    pub fn ok(content: impl Into<String>) -> Self {
        Self {
            success: true,
            content: content.into(),
            data: None,
            error: None,
        }
    }

    pub fn ok_with_data(content: impl Into<String>, data: Value) -> Self {
        Self {
            success: true,
            content: content.into(),
            data: Some(data),
            error: None,
        }
    }

    pub fn fail(error: impl Into<String>) -> Self {
        let error = error.into();
        Self {
            success: false,
            content: String::new(),
            data: None,
            error: Some(error),
        }
    }

    /// Attach partial structured data to a result.
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

// ---------------------------------------------------------------------------
// ToolExecution
// ---------------------------------------------------------------------------

/// A completed invocation: the original call, its result, and timing.
/// This is what post-middleware observes and what metrics accumulate over.
#[derive(Debug, Clone)]
pub struct ToolExecution {
    pub call: ToolCall,
    pub result: ToolResult,
    pub duration: Duration,
    pub completed_at: DateTime<Utc>,
    /// True when the failure originated in dispatch (middleware veto,
    /// unknown tool, aborted task) rather than in the tool itself.
    pub dispatch_failed: bool,
}

impl ToolExecution {
    pub fn new(call: ToolCall, result: ToolResult, duration: Duration) -> Self {
        Self {
            call,
            result,
            duration,
            completed_at: Utc::now(),
            dispatch_failed: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Tool trait
// ---------------------------------------------------------------------------

/// An invocable unit exposed to the model.
///
/// Implementors must be cheap to share (`Arc<dyn Tool>`); execution takes
/// `&self` and owns its arguments. A tool reports its own failures through
/// `ToolResult::fail` — returning `Err` is reserved for faults the caller
/// cannot interpret, and the engine folds those into failed results anyway.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique tool name the model calls it by.
    fn name(&self) -> &str;

    /// Description used to tell the model how/when/why to use the tool.
    fn description(&self) -> &str;

    /// JSON schema for the arguments the tool accepts.
    fn parameters(&self) -> Value {
        serde_json::json!({ "type": "object", "properties": {} })
    }

    /// Execute the tool with the given argument map.
    async fn execute(&self, args: HashMap<String, Value>) -> ToolResult;

    /// The definition shown to the model.
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ok_result_holds_content() {
        let r = ToolResult::ok("done");
        assert!(r.success);
        assert_eq!(r.content, "done");
        assert!(r.error.is_none());
    }

    #[test]
    fn test_fail_result_holds_error() {
        let r = ToolResult::fail("boom");
        assert!(!r.success);
        assert_eq!(r.error.as_deref(), Some("boom"));
    }

    #[test]
    fn test_with_data_attaches_payload() {
        let r = ToolResult::ok("x").with_data(serde_json::json!({"n": 1}));
        assert_eq!(r.data.unwrap()["n"], 1);
    }

    #[test]
    fn test_tool_call_ids_are_unique() {
        let a = ToolCall::new("t", HashMap::new());
        let b = ToolCall::new("t", HashMap::new());
        assert_ne!(a.id, b.id);
    }
}

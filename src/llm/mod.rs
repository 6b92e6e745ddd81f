//! Conversation-model collaborator interface.
//!
//! The execution engine treats the language model as an opaque round-trip:
//! it hands over message history plus the available tool definitions and
//! gets back assistant content, zero-or-more requested tool calls, and
//! token usage. Providers live outside this crate; tests use a scripted
//! mock.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::tools::tool::ToolCall;

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// Role of a conversation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A single message in the conversation history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    pub fn tool(content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: content.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tool definitions exposed to the model
// ---------------------------------------------------------------------------

/// Declarative description of an invocable tool, as shown to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Unique tool name the model calls it by.
    pub name: String,
    /// Description telling the model how/when/why to use the tool.
    pub description: String,
    /// JSON schema for the tool's arguments.
    pub parameters: Value,
}

// ---------------------------------------------------------------------------
// Token usage
// ---------------------------------------------------------------------------

/// Token accounting for a single model round-trip, summed field-wise
/// across a conversation turn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

impl TokenUsage {
    pub fn new(prompt_tokens: u64, completion_tokens: u64) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }

    /// Add another usage record into this one, field-wise.
    pub fn add(&mut self, other: &TokenUsage) {
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
        self.total_tokens += other.total_tokens;
    }

    /// Combine two optional usage records. An absent side is identity;
    /// both absent stays absent.
    pub fn combine(a: Option<TokenUsage>, b: Option<TokenUsage>) -> Option<TokenUsage> {
        match (a, b) {
            (Some(mut a), Some(b)) => {
                a.add(&b);
                Some(a)
            }
            (Some(a), None) => Some(a),
            (None, Some(b)) => Some(b),
            (None, None) => None,
        }
    }
}

// ---------------------------------------------------------------------------
// ChatModel trait
// ---------------------------------------------------------------------------

/// One model response: assistant content, requested tool calls, usage.
#[derive(Debug, Clone, Default)]
pub struct ChatResponse {
    /// Assistant text content, if any.
    pub content: Option<String>,
    /// Tool calls the model wants executed before it can continue.
    pub tool_calls: Vec<ToolCall>,
    /// Token usage for this round-trip, when the provider reports it.
    pub usage: Option<TokenUsage>,
}

impl ChatResponse {
    /// Whether this response requests further tool execution.
    pub fn wants_tools(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// The opaque conversation-model round-trip.
///
/// Transport-level failures are the only hard errors the engine
/// propagates; everything else is returned as data.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn chat(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
    ) -> anyhow::Result<ChatResponse>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_usage_add() {
        let mut a = TokenUsage::new(10, 5);
        a.add(&TokenUsage::new(3, 2));
        assert_eq!(a.prompt_tokens, 13);
        assert_eq!(a.completion_tokens, 7);
        assert_eq!(a.total_tokens, 20);
    }

    #[test]
    fn test_combine_absent_is_identity() {
        let a = TokenUsage::new(10, 5);
        assert_eq!(TokenUsage::combine(Some(a), None), Some(a));
        assert_eq!(TokenUsage::combine(None, Some(a)), Some(a));
        assert_eq!(TokenUsage::combine(None, None), None);
    }

    #[test]
    fn test_combine_sums_fields() {
        let combined =
            TokenUsage::combine(Some(TokenUsage::new(10, 5)), Some(TokenUsage::new(1, 1)));
        assert_eq!(combined, Some(TokenUsage::new(11, 6)));
    }

    #[test]
    fn test_message_constructors() {
        assert_eq!(ChatMessage::system("s").role, Role::System);
        assert_eq!(ChatMessage::tool("t").role, Role::Tool);
    }
}

//! Tool execution engine.
//!
//! The conversation-facing layer: dispatches a model's requested tool
//! calls — inline for a single call, under a bounded worker pool for a
//! batch — through the middleware pipeline, then drives the
//! "invoke → feed results back → repeat" loop until the model stops
//! requesting tools or the configured depth bound is reached.
//!
//! The loop is an explicit iteration with an accumulating depth counter,
//! not recursion; stack usage stays constant and termination is auditable.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use tokio::sync::Semaphore;

use crate::llm::{ChatMessage, ChatModel, ChatResponse, TokenUsage};
use crate::tools::middleware::ToolMiddleware;
use crate::tools::registry::ToolRegistry;
use crate::tools::tool::{ToolCall, ToolExecution, ToolResult};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Default number of tool calls allowed to run simultaneously in a batch.
pub const DEFAULT_MAX_PARALLEL: usize = 4;

/// Default maximum tool-calling rounds within one conversation turn.
pub const DEFAULT_MAX_DEPTH: u32 = 8;

/// Default wall-clock bound on each tool invocation and model round-trip.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(60);

/// Engine limits, supplied by the embedding runtime at construction time.
#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    /// Maximum simultaneous executions within a batch.
    pub max_parallel: usize,
    /// Maximum tool-calling rounds before the turn is cut off.
    pub max_depth: u32,
    /// Deadline applied to every tool invocation and every model
    /// round-trip within a turn, so no single collaborator can stall
    /// the conversation indefinitely.
    pub call_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_parallel: DEFAULT_MAX_PARALLEL,
            max_depth: DEFAULT_MAX_DEPTH,
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }
}

// ---------------------------------------------------------------------------
// TurnOutcome
// ---------------------------------------------------------------------------

/// Final state of one conversation turn.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    /// Combined assistant content (or the synthesized cut-off message).
    pub content: String,
    /// Field-wise summed token usage across every model call this turn.
    pub usage: Option<TokenUsage>,
    /// Total tool calls executed this turn.
    pub steps: u32,
    /// Tool-calling rounds completed when the turn ended.
    pub depth: u32,
    /// Whether the turn ended by hitting the depth bound.
    pub depth_exceeded: bool,
}

// ---------------------------------------------------------------------------
// ToolEngine
// ---------------------------------------------------------------------------

/// Dispatches tool calls and drives the tool-calling conversation loop.
///
/// Cloning is cheap: the registry and middleware are shared behind `Arc`s,
/// which is what lets batch members run on spawned tasks.
#[derive(Clone)]
pub struct ToolEngine {
    registry: Arc<ToolRegistry>,
    middleware: Vec<Arc<dyn ToolMiddleware>>,
    config: EngineConfig,
}

impl ToolEngine {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self {
            registry,
            middleware: Vec::new(),
            config: EngineConfig::default(),
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Append a middleware to the end of the pipeline. Order matters:
    /// `before` hooks run front-to-back and the first veto wins.
    pub fn with_middleware(mut self, middleware: Arc<dyn ToolMiddleware>) -> Self {
        self.middleware.push(middleware);
        self
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    // -----------------------------------------------------------------------
    // Dispatch
    // -----------------------------------------------------------------------

    /// Execute a single tool call inline through the middleware pipeline.
    ///
    /// Never returns an error: vetoes, unknown tools, tool failures, and
    /// deadline hits all come back as failed results so a batch sibling is
    /// never aborted. A timeout is reported distinctly from other failures.
    pub async fn execute(&self, call: ToolCall) -> ToolExecution {
        let started = Instant::now();

        for mw in &self.middleware {
            if let Err(reason) = mw.before(&call) {
                log::warn!(
                    "tool '{}' vetoed by {} middleware: {}",
                    call.name,
                    mw.name(),
                    reason
                );
                return ToolExecution::dispatch_failure(
                    call,
                    format!("middleware '{}' rejected the call: {}", mw.name(), reason),
                    started.elapsed(),
                );
            }
        }

        let Some(tool) = self.registry.get(&call.name) else {
            return ToolExecution::dispatch_failure(
                call.clone(),
                format!("unknown tool '{}'", call.name),
                started.elapsed(),
            );
        };

        let result = match tokio::time::timeout(
            self.config.call_timeout,
            tool.execute(call.arguments.clone()),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => {
                let message = format!(
                    "tool '{}' timed out after {:?}",
                    call.name, self.config.call_timeout
                );
                log::warn!("{}", message);
                return ToolExecution::dispatch_failure(call, message, started.elapsed());
            }
        };
        let execution = ToolExecution::new(call, result, started.elapsed());

        for mw in &self.middleware {
            mw.after(&execution);
        }

        execution
    }

    /// Execute a batch of tool calls.
    ///
    /// A batch of one runs inline; larger batches run concurrently, gated
    /// by a semaphore sized to `max_parallel`. Results are index-stable:
    /// `results[i]` always answers `calls[i]` regardless of completion
    /// order, and one member's failure (or panic) never aborts siblings.
    pub async fn execute_batch(&self, calls: Vec<ToolCall>) -> Vec<ToolExecution> {
        if calls.len() <= 1 {
            let mut results = Vec::with_capacity(calls.len());
            for call in calls {
                results.push(self.execute(call).await);
            }
            return results;
        }

        let semaphore = Arc::new(Semaphore::new(self.config.max_parallel.max(1)));
        let handles: Vec<_> = calls
            .into_iter()
            .map(|call| {
                let engine = self.clone();
                let semaphore = Arc::clone(&semaphore);
                let fallback = call.clone();
                let handle = tokio::spawn(async move {
                    // A closed semaphore is impossible here; treat acquire
                    // failure as an ordinary dispatch failure anyway.
                    let _permit = semaphore.acquire().await;
                    engine.execute(call).await
                });
                (handle, fallback)
            })
            .collect();

        join_all(handles.into_iter().map(|(handle, fallback)| async move {
            match handle.await {
                Ok(execution) => execution,
                Err(join_error) => ToolExecution::dispatch_failure(
                    fallback,
                    format!("tool task aborted: {}", join_error),
                    std::time::Duration::ZERO,
                ),
            }
        }))
        .await
    }

    // -----------------------------------------------------------------------
    // Conversation loop
    // -----------------------------------------------------------------------

    /// Drive one conversation turn to completion, starting from the model
    /// response the caller already has in hand.
    ///
    /// Appends executed-tool messages to `history` in deterministic
    /// per-step order and re-asks the model until it stops requesting
    /// tools or `max_depth` rounds have run. Hitting the bound is a
    /// deterministic, user-facing termination — not an error. Only model
    /// transport failures propagate as `Err`.
    pub async fn run_turn(
        &self,
        model: &dyn ChatModel,
        history: &mut Vec<ChatMessage>,
        first_response: ChatResponse,
    ) -> anyhow::Result<TurnOutcome> {
        let definitions = self.registry.definitions();
        let mut response = first_response;
        let mut usage = response.usage;
        let mut depth: u32 = 0;
        let mut steps: u32 = 0;

        loop {
            if !response.wants_tools() {
                return Ok(TurnOutcome {
                    content: response.content.unwrap_or_default(),
                    usage,
                    steps,
                    depth,
                    depth_exceeded: false,
                });
            }

            if depth >= self.config.max_depth {
                log::warn!(
                    "turn cut off at depth {} after {} tool calls",
                    depth,
                    steps
                );
                return Ok(TurnOutcome {
                    content: format!(
                        "Stopped after {} rounds of tool calls ({} completed). \
                         The conversation reached its tool-calling limit; \
                         ask again to continue from here.",
                        depth, steps
                    ),
                    usage,
                    steps,
                    depth,
                    depth_exceeded: true,
                });
            }

            if let Some(content) = response.content.as_deref() {
                if !content.is_empty() {
                    history.push(ChatMessage::assistant(content));
                }
            }

            let executions = self.execute_batch(response.tool_calls.clone()).await;
            steps += executions.len() as u32;
            for execution in &executions {
                history.push(ChatMessage::tool(format_execution(execution)));
            }

            depth += 1;
            let next = match tokio::time::timeout(
                self.config.call_timeout,
                model.chat(history, &definitions),
            )
            .await
            {
                Ok(response) => response?,
                Err(_) => anyhow::bail!(
                    "model call timed out after {:?}",
                    self.config.call_timeout
                ),
            };
            usage = TokenUsage::combine(usage, next.usage);
            response = next;
        }
    }
}

// ---------------------------------------------------------------------------
// Result formatting
// ---------------------------------------------------------------------------

/// Render a completed execution as conversation text.
///
/// Dispatch-level failures surface their raw error text; tool-reported
/// failures get a readable failure line; successes contribute their
/// content plus a serialized-data suffix when structured data is present.
pub fn format_execution(execution: &ToolExecution) -> String {
    let result = &execution.result;
    if execution.dispatch_failed {
        return result.error.clone().unwrap_or_else(|| "dispatch failed".to_string());
    }
    if !result.success {
        return format!(
            "Tool '{}' failed: {}",
            execution.call.name,
            result.error.as_deref().unwrap_or("unknown error")
        );
    }
    match &result.data {
        Some(data) => format!("{}\n{}", result.content, data),
        None => result.content.clone(),
    }
}

// Dispatch-failure constructor lives with ToolExecution but the flag is
// only ever set here in the engine.
impl ToolExecution {
    fn dispatch_failure(
        call: ToolCall,
        error: String,
        duration: std::time::Duration,
    ) -> Self {
        let mut execution = ToolExecution::new(call, ToolResult::fail(error), duration);
        execution.dispatch_failed = true;
        execution
    }
}

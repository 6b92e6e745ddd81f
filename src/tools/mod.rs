//! Tool layer: invocable units, registry, middleware, and the execution
//! engine that drives tool-calling conversation turns.

pub mod engine;
pub mod middleware;
pub mod registry;
pub mod tool;

pub use engine::{EngineConfig, ToolEngine, TurnOutcome};
pub use middleware::{
    LoggingMiddleware, MetricsMiddleware, SecurityMiddleware, ToolMetrics, ToolMiddleware,
};
pub use registry::ToolRegistry;
pub use tool::{Tool, ToolCall, ToolExecution, ToolResult};

//! Middleware pipeline for tool execution.
//!
//! Every invocation passes the ordered pipeline: `before` may veto the
//! call (short-circuiting with a middleware-error result, the tool never
//! runs), `after` observes the completed execution but cannot alter it.
//! Built-ins cover logging, an operation allow-list, and per-tool metrics.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use parking_lot::Mutex;

use crate::tools::tool::{ToolCall, ToolExecution};

// ---------------------------------------------------------------------------
// ToolMiddleware trait
// ---------------------------------------------------------------------------

/// A pre/post hook around tool execution.
pub trait ToolMiddleware: Send + Sync {
    /// Name used in logs and veto messages.
    fn name(&self) -> &str;

    /// Called before the tool runs. Returning `Err` vetoes the call.
    fn before(&self, _call: &ToolCall) -> Result<(), String> {
        Ok(())
    }

    /// Called after the tool has run. Vetoed calls skip `after` entirely.
    /// Observers must not mutate the result; they only get a reference.
    fn after(&self, _execution: &ToolExecution) {}
}

// ---------------------------------------------------------------------------
// LoggingMiddleware
// ---------------------------------------------------------------------------

/// Records invocation start and outcome through `log`.
#[derive(Debug, Default)]
pub struct LoggingMiddleware;

impl ToolMiddleware for LoggingMiddleware {
    fn name(&self) -> &str {
        "logging"
    }

    fn before(&self, call: &ToolCall) -> Result<(), String> {
        log::info!("tool '{}' starting (call id {})", call.name, call.id);
        Ok(())
    }

    fn after(&self, execution: &ToolExecution) {
        if execution.result.success {
            log::info!(
                "tool '{}' finished in {:.2}ms",
                execution.call.name,
                execution.duration.as_secs_f64() * 1000.0
            );
        } else {
            log::warn!(
                "tool '{}' failed in {:.2}ms: {}",
                execution.call.name,
                execution.duration.as_secs_f64() * 1000.0,
                execution.result.error.as_deref().unwrap_or("unknown error")
            );
        }
    }
}

// ---------------------------------------------------------------------------
// SecurityMiddleware
// ---------------------------------------------------------------------------

/// Rejects tools that are not on the configured allow-list.
#[derive(Debug)]
pub struct SecurityMiddleware {
    allowed: HashSet<String>,
}

impl SecurityMiddleware {
    pub fn new(allowed: impl IntoIterator<Item = String>) -> Self {
        Self {
            allowed: allowed.into_iter().collect(),
        }
    }
}

impl ToolMiddleware for SecurityMiddleware {
    fn name(&self) -> &str {
        "security"
    }

    fn before(&self, call: &ToolCall) -> Result<(), String> {
        if self.allowed.contains(&call.name) {
            Ok(())
        } else {
            Err(format!("tool '{}' is not on the allow-list", call.name))
        }
    }
}

// ---------------------------------------------------------------------------
// MetricsMiddleware
// ---------------------------------------------------------------------------

/// Accumulated counters for one tool.
#[derive(Debug, Clone, Default)]
pub struct ToolMetrics {
    pub invocations: u64,
    pub failures: u64,
    pub total_duration: Duration,
}

impl ToolMetrics {
    /// Mean wall-clock duration across all invocations.
    pub fn average_duration(&self) -> Duration {
        if self.invocations == 0 {
            Duration::ZERO
        } else {
            self.total_duration / self.invocations as u32
        }
    }
}

/// Accumulates per-tool invocation counts and durations.
#[derive(Debug, Default)]
pub struct MetricsMiddleware {
    metrics: Mutex<HashMap<String, ToolMetrics>>,
}

impl MetricsMiddleware {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the metrics for a single tool.
    pub fn metrics_for(&self, tool_name: &str) -> Option<ToolMetrics> {
        self.metrics.lock().get(tool_name).cloned()
    }

    /// Snapshot of every tool's metrics.
    pub fn snapshot(&self) -> HashMap<String, ToolMetrics> {
        self.metrics.lock().clone()
    }
}

impl ToolMiddleware for MetricsMiddleware {
    fn name(&self) -> &str {
        "metrics"
    }

    fn after(&self, execution: &ToolExecution) {
        let mut metrics = self.metrics.lock();
        let entry = metrics.entry(execution.call.name.clone()).or_default();
        entry.invocations += 1;
        if !execution.result.success {
            entry.failures += 1;
        }
        entry.total_duration += execution.duration;
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::tools::tool::ToolResult;

    fn execution(name: &str, success: bool, millis: u64) -> ToolExecution {
        let call = ToolCall::new(name, HashMap::new());
        let result = if success {
            ToolResult::ok("ok")
        } else {
            ToolResult::fail("bad")
        };
        ToolExecution::new(call, result, Duration::from_millis(millis))
    }

    #[test]
    fn test_security_allows_listed() {
        let mw = SecurityMiddleware::new(["echo".to_string()]);
        let call = ToolCall::new("echo", HashMap::new());
        assert!(mw.before(&call).is_ok());
    }

    #[test]
    fn test_security_vetoes_unlisted() {
        let mw = SecurityMiddleware::new(["echo".to_string()]);
        let call = ToolCall::new("rm_rf", HashMap::new());
        let err = mw.before(&call).unwrap_err();
        assert!(err.contains("allow-list"));
    }

    #[test]
    fn test_metrics_accumulate() {
        let mw = MetricsMiddleware::new();
        mw.after(&execution("echo", true, 10));
        mw.after(&execution("echo", false, 30));

        let m = mw.metrics_for("echo").unwrap();
        assert_eq!(m.invocations, 2);
        assert_eq!(m.failures, 1);
        assert_eq!(m.total_duration, Duration::from_millis(40));
        assert_eq!(m.average_duration(), Duration::from_millis(20));
    }

    #[test]
    fn test_metrics_empty_average() {
        assert_eq!(ToolMetrics::default().average_duration(), Duration::ZERO);
    }
}

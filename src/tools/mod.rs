//! Concurrent dispatch of external tool calls.
//!
//! Nodes never await external services directly: they hand a batch of calls
//! to the [`ToolOrchestrator`], which runs independent calls concurrently,
//! applies a per-call timeout, and returns one tagged entry per call so a
//! single failed source never aborts the batch.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::future::join_all;
use miette::Diagnostic;
use rustc_hash::FxHashMap;
use serde_json::Value;
use thiserror::Error;
use tracing::instrument;

/// External capability boundary: `(name, args) -> result | error`.
///
/// No assumption is made about a tool's internal retries; the orchestrator
/// only bounds each call with a timeout.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Name the orchestrator registers and dispatches by.
    fn name(&self) -> &str;

    /// Invoke the tool with JSON arguments.
    async fn call(&self, args: Value) -> Result<Value, ToolError>;
}

/// One requested invocation in a dispatch batch.
#[derive(Clone, Debug)]
pub struct ToolCall {
    pub name: String,
    pub args: Value,
}

impl ToolCall {
    pub fn new(name: impl Into<String>, args: Value) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }
}

/// Outcome of one call in a batch, tagged with the tool name.
#[derive(Debug)]
pub struct ToolOutcome {
    pub name: String,
    pub result: Result<Value, ToolError>,
}

impl ToolOutcome {
    /// The successful payload, if any.
    pub fn ok(&self) -> Option<&Value> {
        self.result.as_ref().ok()
    }
}

/// Errors for individual tool calls.
#[derive(Debug, Error, Diagnostic)]
pub enum ToolError {
    #[error("unknown tool: {name}")]
    #[diagnostic(
        code(mealgraph::tools::unknown),
        help("Register the tool with the orchestrator before dispatching to it.")
    )]
    Unknown { name: String },

    #[error("tool {name} timed out after {timeout_ms}ms")]
    #[diagnostic(code(mealgraph::tools::timeout))]
    Timeout { name: String, timeout_ms: u64 },

    #[error("tool {name} failed: {message}")]
    #[diagnostic(code(mealgraph::tools::call))]
    Call { name: String, message: String },
}

impl ToolError {
    pub fn call(name: impl Into<String>, message: impl Into<String>) -> Self {
        ToolError::Call {
            name: name.into(),
            message: message.into(),
        }
    }
}

/// Registry plus dispatch policy for external calls.
///
/// ```rust,no_run
/// use mealgraph::tools::{ToolCall, ToolOrchestrator};
/// use serde_json::json;
///
/// # async fn example(orchestrator: ToolOrchestrator) {
/// let outcomes = orchestrator
///     .dispatch(vec![
///         ToolCall::new("yelp_search", json!({"location": "SoMa", "term": "thai"})),
///         ToolCall::new("places_search", json!({"query": "thai restaurant near SoMa"})),
///     ])
///     .await;
/// let survivors: Vec<_> = outcomes.iter().filter_map(|o| o.ok()).collect();
/// # let _ = survivors;
/// # }
/// ```
#[derive(Clone)]
pub struct ToolOrchestrator {
    tools: FxHashMap<String, Arc<dyn Tool>>,
    call_timeout: Duration,
}

impl ToolOrchestrator {
    pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(15);

    pub fn new() -> Self {
        Self {
            tools: FxHashMap::default(),
            call_timeout: Self::DEFAULT_CALL_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Register a tool under its own name.
    #[must_use]
    pub fn register(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.insert(tool.name().to_string(), tool);
        self
    }

    /// Whether a tool with this name is registered.
    pub fn has_tool(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Run all calls concurrently, each under its own timeout.
    ///
    /// The result preserves input order. A failed or timed-out call yields a
    /// tagged error entry; the other calls are unaffected.
    #[instrument(skip(self, calls), fields(batch = calls.len()))]
    pub async fn dispatch(&self, calls: Vec<ToolCall>) -> Vec<ToolOutcome> {
        let futures = calls.into_iter().map(|call| self.run_one(call));
        join_all(futures).await
    }

    /// Try sources in priority order until one yields a non-empty result,
    /// short-circuiting the remaining sources.
    ///
    /// Emptiness: JSON null, an empty array, an empty object, or an object
    /// whose array members are all empty.
    #[instrument(skip(self, calls), fields(chain = calls.len()))]
    pub async fn dispatch_first_non_empty(&self, calls: Vec<ToolCall>) -> Option<ToolOutcome> {
        let mut last_err = None;
        for call in calls {
            let outcome = self.run_one(call).await;
            match &outcome.result {
                Ok(value) if !is_empty_result(value) => return Some(outcome),
                Ok(_) => {
                    tracing::debug!(tool = %outcome.name, "fallback source returned empty result");
                }
                Err(e) => {
                    tracing::debug!(tool = %outcome.name, error = %e, "fallback source failed");
                    last_err = Some(outcome);
                }
            }
        }
        last_err
    }

    async fn run_one(&self, call: ToolCall) -> ToolOutcome {
        let Some(tool) = self.tools.get(&call.name) else {
            return ToolOutcome {
                name: call.name.clone(),
                result: Err(ToolError::Unknown { name: call.name }),
            };
        };
        let timeout_ms = self.call_timeout.as_millis() as u64;
        let result = match tokio::time::timeout(self.call_timeout, tool.call(call.args)).await {
            Ok(result) => result,
            Err(_) => Err(ToolError::Timeout {
                name: call.name.clone(),
                timeout_ms,
            }),
        };
        ToolOutcome {
            name: call.name,
            result,
        }
    }
}

impl Default for ToolOrchestrator {
    fn default() -> Self {
        Self::new()
    }
}

fn is_empty_result(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => {
            map.is_empty()
                || map.values().all(|v| match v {
                    Value::Array(items) => items.is_empty(),
                    Value::Null => true,
                    _ => false,
                })
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }

        async fn call(&self, args: Value) -> Result<Value, ToolError> {
            Ok(args)
        }
    }

    struct SlowTool;

    #[async_trait]
    impl Tool for SlowTool {
        fn name(&self) -> &str {
            "slow"
        }

        async fn call(&self, _args: Value) -> Result<Value, ToolError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(json!({"never": "returned"}))
        }
    }

    #[tokio::test]
    async fn dispatch_preserves_order_and_tags_failures() {
        let orchestrator = ToolOrchestrator::new()
            .with_call_timeout(Duration::from_millis(50))
            .register(Arc::new(EchoTool))
            .register(Arc::new(SlowTool));

        let outcomes = orchestrator
            .dispatch(vec![
                ToolCall::new("echo", json!({"a": 1})),
                ToolCall::new("slow", json!({})),
                ToolCall::new("missing", json!({})),
            ])
            .await;

        assert_eq!(outcomes.len(), 3);
        assert_eq!(outcomes[0].ok(), Some(&json!({"a": 1})));
        assert!(matches!(
            outcomes[1].result,
            Err(ToolError::Timeout { .. })
        ));
        assert!(matches!(
            outcomes[2].result,
            Err(ToolError::Unknown { .. })
        ));
    }

    struct EmptyTool;

    #[async_trait]
    impl Tool for EmptyTool {
        fn name(&self) -> &str {
            "empty"
        }

        async fn call(&self, _args: Value) -> Result<Value, ToolError> {
            Ok(json!({"items": []}))
        }
    }

    struct FullTool;

    #[async_trait]
    impl Tool for FullTool {
        fn name(&self) -> &str {
            "full"
        }

        async fn call(&self, _args: Value) -> Result<Value, ToolError> {
            Ok(json!({"items": [1, 2, 3]}))
        }
    }

    #[tokio::test]
    async fn fallback_chain_short_circuits_on_first_non_empty() {
        let orchestrator = ToolOrchestrator::new()
            .register(Arc::new(EmptyTool))
            .register(Arc::new(FullTool));

        let outcome = orchestrator
            .dispatch_first_non_empty(vec![
                ToolCall::new("empty", json!({})),
                ToolCall::new("full", json!({})),
                ToolCall::new("missing-would-error", json!({})),
            ])
            .await
            .expect("one source should win");

        assert_eq!(outcome.name, "full");
        assert_eq!(outcome.ok(), Some(&json!({"items": [1, 2, 3]})));
    }

    #[tokio::test]
    async fn fallback_chain_reports_last_error_when_all_fail() {
        let orchestrator = ToolOrchestrator::new();
        let outcome = orchestrator
            .dispatch_first_non_empty(vec![ToolCall::new("ghost", json!({}))])
            .await
            .expect("error outcome is surfaced");
        assert!(matches!(outcome.result, Err(ToolError::Unknown { .. })));
    }
}

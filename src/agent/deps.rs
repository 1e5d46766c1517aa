//! Explicit dependency wiring for the agent graph.

use async_trait::async_trait;
use miette::Diagnostic;
use thiserror::Error;

use crate::orders::PendingAction;
use crate::tools::ToolOrchestrator;

/// Everything the agent's nodes need from the outside world.
///
/// Constructed once by the embedding application and handed to
/// [`build_agent_graph`](crate::agent::build_agent_graph); nodes keep only
/// the pieces they use.
#[derive(Clone)]
pub struct AgentDeps {
    pub tools: ToolOrchestrator,
    pub notifier: std::sync::Arc<dyn ApprovalNotifier>,
}

impl AgentDeps {
    pub fn new(tools: ToolOrchestrator) -> Self {
        Self {
            tools,
            notifier: std::sync::Arc::new(LogNotifier),
        }
    }

    #[must_use]
    pub fn with_notifier(mut self, notifier: std::sync::Arc<dyn ApprovalNotifier>) -> Self {
        self.notifier = notifier;
        self
    }
}

/// Collaborator boundary for human approval.
///
/// The approval node hands a fully formed action description over and
/// forgets about it; the resolution arrives in a later turn's input. The
/// engine never inspects approval outcomes.
#[async_trait]
pub trait ApprovalNotifier: Send + Sync {
    async fn notify(&self, action: &PendingAction) -> Result<(), NotifierError>;
}

/// Errors delivering an approval request.
#[derive(Debug, Error, Diagnostic)]
pub enum NotifierError {
    #[error("approval delivery failed: {message}")]
    #[diagnostic(code(mealgraph::agent::notifier))]
    Delivery { message: String },
}

/// Default notifier: records the request in the log and nothing else.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl ApprovalNotifier for LogNotifier {
    async fn notify(&self, action: &PendingAction) -> Result<(), NotifierError> {
        tracing::info!(
            action_id = %action.action_id,
            action_type = %action.action_type,
            "pending action awaiting approval"
        );
        Ok(())
    }
}

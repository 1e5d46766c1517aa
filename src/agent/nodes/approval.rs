use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;

use crate::agent::deps::ApprovalNotifier;
use crate::channels::errors::{CauseChain, ErrorEvent};
use crate::message::Message;
use crate::node::{Node, NodeContext, NodeError, NodePartial};
use crate::orders::ActionStatus;
use crate::state::StateSnapshot;

/// Formats the approval request and hands each pending action to the
/// notification collaborator. Delivery failures are recorded on the errors
/// channel rather than failing the turn — the action stays pending either
/// way, and the caller can re-notify.
pub struct ApprovalNode {
    notifier: Arc<dyn ApprovalNotifier>,
}

impl ApprovalNode {
    pub fn new(notifier: Arc<dyn ApprovalNotifier>) -> Self {
        Self { notifier }
    }
}

#[async_trait]
impl Node for ApprovalNode {
    async fn run(
        &self,
        snapshot: StateSnapshot,
        ctx: NodeContext,
    ) -> Result<NodePartial, NodeError> {
        let pending: Vec<_> = snapshot
            .pending_actions()
            .into_iter()
            .filter(|a| a.status == ActionStatus::Pending)
            .collect();

        if pending.is_empty() {
            // Reached via the validator's pass route before anything was
            // submitted: the review summary already asked the user to
            // confirm, so there is nothing to add.
            return Ok(NodePartial::default());
        }

        let mut delivery_errors = Vec::new();
        for action in &pending {
            ctx.emit("approval", format!("requesting approval for {}", action.action_id))?;
            if let Err(e) = self.notifier.notify(action).await {
                delivery_errors.push(
                    ErrorEvent::node(ctx.node_id.clone(), ctx.step, CauseChain::msg(e.to_string()))
                        .with_tag("notifier")
                        .with_context(json!({"action_id": action.action_id})),
                );
            }
        }

        let descriptions: Vec<String> = pending
            .iter()
            .map(|a| format!("- {}", a.description))
            .collect();
        let message = format!(
            "Waiting on your approval for:\n{}\n\nReply 'approve' or 'reject'.",
            descriptions.join("\n")
        );

        let mut partial =
            NodePartial::new().with_messages(vec![Message::assistant(&message)]);
        if !delivery_errors.is_empty() {
            partial = partial.with_errors(delivery_errors);
        }
        Ok(partial)
    }
}

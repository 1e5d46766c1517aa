use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;

use crate::message::Message;
use crate::node::{Node, NodeContext, NodeError, NodePartial};
use crate::orders::{OrderStatus, PendingAction, WorkflowStep};
use crate::schema::slots;
use crate::state::StateSnapshot;

/// Freezes a confirmed order into a pending action awaiting approval.
///
/// Submission here means "handed to the approval collaborator": the engine's
/// responsibility ends once the pending action exists, and a later turn's
/// input carries the human's decision. Actual placement with the vendor is
/// the approval collaborator's problem.
pub struct OrderSubmitNode;

#[async_trait]
impl Node for OrderSubmitNode {
    async fn run(
        &self,
        snapshot: StateSnapshot,
        ctx: NodeContext,
    ) -> Result<NodePartial, NodeError> {
        let Some(mut order) = snapshot.food_order() else {
            return Ok(NodePartial::new().with_messages(vec![Message::assistant(
                "No food order in progress.",
            )]));
        };

        if !order.validation_errors.is_empty() {
            order.current_step = WorkflowStep::BuildOrder;
            return Ok(NodePartial::new()
                .with_messages(vec![Message::assistant(
                    "The order still has unresolved issues — let's fix those before submitting.",
                )])
                .with_slot(slots::FOOD_ORDER, json!(order)));
        }

        let vendor_name = order
            .selected_vendor
            .as_ref()
            .map(|v| v.name.clone())
            .unwrap_or_else(|| "the selected restaurant".to_string());

        order.status = OrderStatus::PendingApproval;
        order.submitted_at = Some(Utc::now());
        order.complete_step(WorkflowStep::ConfirmOrder, WorkflowStep::SubmitOrder);

        let action = PendingAction::new(
            "food_order",
            format!(
                "Place a ${:.2} order with {vendor_name} for {} people",
                order.total.unwrap_or(0.0),
                order.headcount.unwrap_or(0)
            ),
            json!(order),
        );
        ctx.emit("order_submit", format!("pending action {}", action.action_id))?;

        // The full list is resubmitted each turn (overwrite channel).
        let mut actions = snapshot.pending_actions();
        actions.push(action);

        Ok(NodePartial::new()
            .with_messages(vec![Message::assistant(&format!(
                "Order sent for approval — I'll place it with {vendor_name} once it's approved."
            ))])
            .with_slot(slots::FOOD_ORDER, json!(order))
            .with_slot(slots::PENDING_ACTIONS, json!(actions))
            .with_slot(slots::NEEDS_APPROVAL, json!(true)))
    }
}

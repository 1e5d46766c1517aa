use async_trait::async_trait;
use serde_json::json;

use crate::agent::routing::FOOD_ORDER_INTENT;
use crate::node::{Node, NodeContext, NodeError, NodePartial};
use crate::orders::FoodOrderContext;
use crate::schema::slots;
use crate::state::StateSnapshot;

/// Classifies the turn's intent from the latest user message and lazily
/// creates the workflow context on the first food-related turn.
pub struct RouterNode;

const FOOD_KEYWORDS: [&str; 10] = [
    "order", "lunch", "dinner", "food", "catering", "cater", "hungry", "restaurant", "pizza",
    "eat",
];
const RESERVATION_KEYWORDS: [&str; 3] = ["reservation", "reserve", "table for"];
const BUDGET_KEYWORDS: [&str; 3] = ["budget", "expense", "spend report"];

/// Keyword classification; the prompt-driven variant lives behind the same
/// intent labels, so swapping it in changes no routing.
pub fn classify_intent(text: &str) -> &'static str {
    let lowered = text.to_lowercase();
    if RESERVATION_KEYWORDS.iter().any(|kw| lowered.contains(kw)) {
        return "reservation";
    }
    if FOOD_KEYWORDS.iter().any(|kw| lowered.contains(kw)) {
        return FOOD_ORDER_INTENT;
    }
    if BUDGET_KEYWORDS.iter().any(|kw| lowered.contains(kw)) {
        return "budget";
    }
    "general"
}

#[async_trait]
impl Node for RouterNode {
    async fn run(
        &self,
        snapshot: StateSnapshot,
        ctx: NodeContext,
    ) -> Result<NodePartial, NodeError> {
        let intent = snapshot
            .last_user_message()
            .map(|m| classify_intent(&m.content))
            .unwrap_or("general");
        ctx.emit("routing", format!("intent={intent}"))?;

        let mut partial = NodePartial::new().with_slot(slots::INTENT, json!(intent));

        // First food-related turn: create the workflow context lazily so
        // downstream nodes always find one.
        if intent == FOOD_ORDER_INTENT && snapshot.food_order().is_none() {
            let order = FoodOrderContext::default();
            ctx.emit("routing", format!("opened food order {}", order.order_id))?;
            partial = partial.with_slot(slots::FOOD_ORDER, json!(order));
        }

        Ok(partial)
    }
}

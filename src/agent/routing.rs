//! Routing predicates for the agent graph.
//!
//! Both predicates are pure functions of the snapshot and are wrapped as
//! conditional edges with declared target sets by
//! [`build_agent_graph`](crate::agent::build_agent_graph). The step machine
//! they consult lives in [`crate::orders`] as data tables.

use crate::agent::names;
use crate::orders::{jump_node_for_step, node_for_step};
use crate::state::StateSnapshot;
use crate::types::NodeKind;

/// Intent label the router assigns to food-ordering turns.
pub const FOOD_ORDER_INTENT: &str = "food_order";

/// Route out of the router node.
///
/// Precedence: an explicit requested step wins (side entry), then the
/// workflow context's current step, then intent. Without a food order in
/// play, everything lands on the executor.
pub fn route_food_order(snapshot: &StateSnapshot) -> NodeKind {
    if let Some(step) = snapshot.requested_step() {
        if let Some(node) = jump_node_for_step(step) {
            return NodeKind::Custom(node.to_string());
        }
    }

    match snapshot.food_order() {
        Some(order) => NodeKind::Custom(node_for_step(order.current_step).to_string()),
        None => {
            if snapshot.intent().as_deref() == Some(FOOD_ORDER_INTENT) {
                NodeKind::Custom(names::VENDOR_SEARCH.to_string())
            } else {
                NodeKind::Custom(names::EXECUTOR.to_string())
            }
        }
    }
}

/// All targets [`route_food_order`] can return; declared on the conditional
/// edge so compilation can verify them.
pub fn route_food_order_targets() -> Vec<NodeKind> {
    [
        names::EXECUTOR,
        names::VENDOR_SEARCH,
        names::ORDER_BUILDER,
        names::ORDER_VALIDATOR,
        names::ORDER_SUBMIT,
    ]
    .into_iter()
    .map(|n| NodeKind::Custom(n.to_string()))
    .collect()
}

/// Route out of the validator: errors loop back to the builder, a clean
/// validation proceeds to approval. Warnings do not block.
///
/// The backward route fires at most once per turn: after the builder has
/// already re-fit the order (`rebuild_attempted`), remaining errors need
/// user input, so the turn ends and the errors stay in the context for the
/// next message.
pub fn after_validation(snapshot: &StateSnapshot) -> NodeKind {
    match snapshot.food_order() {
        Some(order) if order.validation_errors.is_empty() => {
            NodeKind::Custom(names::APPROVAL.to_string())
        }
        Some(order) if !order.rebuild_attempted => {
            NodeKind::Custom(names::ORDER_BUILDER.to_string())
        }
        _ => NodeKind::End,
    }
}

/// Declared targets of [`after_validation`].
pub fn after_validation_targets() -> Vec<NodeKind> {
    vec![
        NodeKind::Custom(names::ORDER_BUILDER.to_string()),
        NodeKind::Custom(names::APPROVAL.to_string()),
        NodeKind::End,
    ]
}

/// Route out of the builder: a built order goes to review; a builder that
/// had to stop and ask the user (no vendor, no items) ends the turn.
pub fn after_build(snapshot: &StateSnapshot) -> NodeKind {
    match snapshot.food_order() {
        Some(order) if order.selected_vendor.is_some() && !order.line_items.is_empty() => {
            NodeKind::Custom(names::ORDER_VALIDATOR.to_string())
        }
        _ => NodeKind::End,
    }
}

/// Declared targets of [`after_build`].
pub fn after_build_targets() -> Vec<NodeKind> {
    vec![
        NodeKind::Custom(names::ORDER_VALIDATOR.to_string()),
        NodeKind::End,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orders::{FoodOrderContext, WorkflowStep};
    use crate::schema::slots;
    use crate::state::VersionedState;
    use serde_json::json;

    fn snapshot_with(order: Option<FoodOrderContext>, extra: &[(&str, serde_json::Value)]) -> StateSnapshot {
        let mut builder = VersionedState::builder().with_user_message("hi");
        if let Some(order) = order {
            builder = builder.with_slot(slots::FOOD_ORDER, serde_json::to_value(order).unwrap());
        }
        for (name, value) in extra {
            builder = builder.with_slot(name, value.clone());
        }
        builder.build().snapshot()
    }

    #[test]
    fn no_order_no_food_intent_goes_to_executor() {
        let snap = snapshot_with(None, &[(slots::INTENT, json!("general"))]);
        assert_eq!(
            route_food_order(&snap),
            NodeKind::Custom(names::EXECUTOR.into())
        );
    }

    #[test]
    fn food_intent_without_order_starts_vendor_search() {
        let snap = snapshot_with(None, &[(slots::INTENT, json!(FOOD_ORDER_INTENT))]);
        assert_eq!(
            route_food_order(&snap),
            NodeKind::Custom(names::VENDOR_SEARCH.into())
        );
    }

    #[test]
    fn current_step_drives_normal_sequencing() {
        let order = FoodOrderContext {
            current_step: WorkflowStep::ReviewOrder,
            ..Default::default()
        };
        let snap = snapshot_with(Some(order), &[]);
        assert_eq!(
            route_food_order(&snap),
            NodeKind::Custom(names::ORDER_VALIDATOR.into())
        );
    }

    #[test]
    fn requested_step_bypasses_sequencing() {
        let order = FoodOrderContext {
            current_step: WorkflowStep::GatherRequirements,
            ..Default::default()
        };
        let snap = snapshot_with(
            Some(order),
            &[(slots::REQUESTED_STEP, json!("review_order"))],
        );
        assert_eq!(
            route_food_order(&snap),
            NodeKind::Custom(names::ORDER_VALIDATOR.into())
        );
    }

    #[test]
    fn validation_errors_route_back_to_builder() {
        let order = FoodOrderContext {
            validation_errors: vec!["over budget".into()],
            ..Default::default()
        };
        let snap = snapshot_with(Some(order), &[]);
        assert_eq!(
            after_validation(&snap),
            NodeKind::Custom(names::ORDER_BUILDER.into())
        );
    }

    #[test]
    fn exhausted_rebuild_ends_the_turn_with_errors_kept() {
        let order = FoodOrderContext {
            validation_errors: vec!["missing address".into()],
            rebuild_attempted: true,
            ..Default::default()
        };
        let snap = snapshot_with(Some(order), &[]);
        assert_eq!(after_validation(&snap), NodeKind::End);
    }

    #[test]
    fn builder_without_vendor_ends_the_turn() {
        let snap = snapshot_with(Some(FoodOrderContext::default()), &[]);
        assert_eq!(after_build(&snap), NodeKind::End);
    }

    #[test]
    fn clean_validation_routes_to_approval() {
        let order = FoodOrderContext {
            validation_warnings: vec!["at 96% of budget".into()],
            ..Default::default()
        };
        let snap = snapshot_with(Some(order), &[]);
        assert_eq!(
            after_validation(&snap),
            NodeKind::Custom(names::APPROVAL.into())
        );
    }
}

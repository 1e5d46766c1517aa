use async_trait::async_trait;
use serde_json::json;

use crate::message::Message;
use crate::node::{Node, NodeContext, NodeError, NodePartial};
use crate::orders::{FoodOrderContext, WorkflowStep};
use crate::schema::slots;
use crate::state::StateSnapshot;

/// Warn when the total crosses this share of the budget.
const BUDGET_WARN_RATIO: f64 = 0.9;

/// Reviews the built order against requirements and budget.
///
/// The evaluator half of the build/review loop: errors send the workflow
/// back to the builder, a clean pass moves it to confirmation. Validation
/// failure is ordinary state, not an error path.
pub struct OrderValidatorNode;

/// Required-field check: headcount, address, date, vendor.
pub fn check_required_fields(order: &FoodOrderContext) -> Vec<String> {
    let mut errors = Vec::new();
    if order.headcount.unwrap_or(0) < 1 {
        errors.push("Headcount must be specified (how many people?)".to_string());
    }
    if order.delivery_address.is_none() {
        errors.push("Delivery address must be specified".to_string());
    }
    if order.event_date.is_none() {
        errors.push("Delivery date must be specified".to_string());
    }
    if order.selected_vendor.is_none() {
        errors.push("No restaurant selected".to_string());
    }
    errors
}

/// Budget check: over-budget is an error, within 10% of the ceiling is a
/// warning, and a blown per-person budget is an error.
pub fn check_budget(order: &FoodOrderContext) -> (Vec<String>, Vec<String>) {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    let total = order.total.unwrap_or(0.0);
    if let Some(budget_total) = order.budget_total {
        if total > budget_total {
            errors.push(format!(
                "Order exceeds budget by ${:.2} (${total:.2} vs ${budget_total:.2} budget)",
                total - budget_total
            ));
        } else if total > budget_total * BUDGET_WARN_RATIO {
            warnings.push(format!(
                "Order is at {:.0}% of budget (${total:.2} of ${budget_total:.2})",
                total / budget_total * 100.0
            ));
        }
    }

    if let (Some(budget_pp), Some(per_person)) = (order.budget_per_person, order.per_person_cost())
    {
        if per_person > budget_pp {
            errors.push(format!(
                "Per-person cost ${per_person:.2} exceeds budget of ${budget_pp:.2}/person"
            ));
        }
    }

    (errors, warnings)
}

/// Dietary restrictions can't be verified item-level; surface a reminder.
pub fn check_dietary(order: &FoodOrderContext) -> Vec<String> {
    if order.dietary_restrictions.is_empty() || order.line_items.is_empty() {
        return Vec::new();
    }
    vec![format!(
        "Dietary restrictions noted: {}. Please verify with the restaurant that the order accommodates them.",
        order.dietary_restrictions.join(", ")
    )]
}

fn format_summary(order: &FoodOrderContext) -> String {
    let vendor = order
        .selected_vendor
        .as_ref()
        .map(|v| v.name.clone())
        .unwrap_or_else(|| "Not selected".to_string());
    let mut lines = vec![
        "Order summary:".to_string(),
        format!("Restaurant: {vendor}"),
        format!(
            "Headcount: {} people",
            order
                .headcount
                .map(|h| h.to_string())
                .unwrap_or_else(|| "not specified".into())
        ),
        format!(
            "Delivery: {} at {}",
            order.event_date.as_deref().unwrap_or("TBD"),
            order.event_time.as_deref().unwrap_or("TBD")
        ),
        format!("Total: ${:.2}", order.total.unwrap_or(0.0)),
    ];
    if let Some(per_person) = order.per_person_cost() {
        lines.push(format!("(${per_person:.2}/person)"));
    }
    lines.join("\n")
}

#[async_trait]
impl Node for OrderValidatorNode {
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

        let mut errors = check_required_fields(&order);
        if order.total.is_some() {
            let (budget_errors, budget_warnings) = check_budget(&order);
            errors.extend(budget_errors);
            order.validation_warnings = budget_warnings;
        } else {
            order.validation_warnings.clear();
        }
        order.validation_warnings.extend(check_dietary(&order));
        order.validation_errors = errors;

        ctx.emit(
            "validation",
            format!(
                "{} errors, {} warnings",
                order.validation_errors.len(),
                order.validation_warnings.len()
            ),
        )?;

        let message = if order.validation_errors.is_empty() {
            // Pass: forward to confirmation regardless of warnings.
            order.complete_step(WorkflowStep::ReviewOrder, WorkflowStep::ConfirmOrder);
            let mut message = format_summary(&order);
            if !order.validation_warnings.is_empty() {
                message.push_str(&format!(
                    "\n\nWarnings:\n- {}",
                    order.validation_warnings.join("\n- ")
                ));
            }
            message.push_str("\n\nDoes this look right? Say 'confirm' to place the order.");
            message
        } else {
            // Fail: the backward edge of the step machine.
            order.current_step = WorkflowStep::BuildOrder;
            format!(
                "Issues to fix before ordering:\n- {}",
                order.validation_errors.join("\n- ")
            )
        };

        Ok(NodePartial::new()
            .with_messages(vec![Message::assistant(&message)])
            .with_slot(slots::FOOD_ORDER, json!(order)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orders::VendorOption;

    fn valid_order(total: f64, budget: f64) -> FoodOrderContext {
        FoodOrderContext {
            headcount: Some(10),
            delivery_address: Some("500 Howard St".into()),
            event_date: Some("2026-09-01".into()),
            selected_vendor: Some(VendorOption {
                vendor_id: "v1".into(),
                name: "Thai Basil".into(),
                rating: Some(4.5),
                price_level: None,
                address: None,
                phone: None,
                categories: vec![],
                source: "yelp".into(),
                distance_miles: None,
            }),
            total: Some(total),
            budget_total: Some(budget),
            ..Default::default()
        }
    }

    #[test]
    fn over_budget_is_an_error() {
        let (errors, warnings) = check_budget(&valid_order(600.0, 500.0));
        assert_eq!(errors.len(), 1);
        assert!(warnings.is_empty());
    }

    #[test]
    fn near_budget_is_a_warning_only() {
        let (errors, warnings) = check_budget(&valid_order(480.0, 500.0));
        assert!(errors.is_empty());
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn comfortably_under_budget_is_clean() {
        let (errors, warnings) = check_budget(&valid_order(400.0, 500.0));
        assert!(errors.is_empty());
        assert!(warnings.is_empty());
    }

    #[test]
    fn per_person_budget_is_enforced() {
        let mut order = valid_order(300.0, 500.0);
        order.budget_per_person = Some(25.0);
        // 300 / 10 = 30 per person > 25
        let (errors, _) = check_budget(&order);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("Per-person"));
    }

    #[test]
    fn missing_fields_are_all_reported() {
        let errors = check_required_fields(&FoodOrderContext::default());
        assert_eq!(errors.len(), 4);
    }
}

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::agent::tool_names;
use crate::message::Message;
use crate::node::{Node, NodeContext, NodeError, NodePartial};
use crate::orders::{FoodOrderContext, OrderItem, WorkflowStep};
use crate::schema::slots;
use crate::state::StateSnapshot;
use crate::tools::{ToolCall, ToolOrchestrator};

/// Sales-tax estimate applied to the subtotal.
const TAX_RATE: f64 = 0.08;
/// Marketplace service fee on the subtotal.
const SERVICE_FEE_RATE: f64 = 0.15;
/// Flat delivery fee, waived above the free-delivery floor.
const DELIVERY_FEE: f64 = 5.99;
const FREE_DELIVERY_FLOOR: f64 = 50.0;
/// Per-person price assumed when no menu is available.
const DEFAULT_PLATE_PRICE: f64 = 14.0;

/// Builds the order against the selected vendor: menu via fallback chain,
/// line items sized to the group, then the priced totals.
pub struct OrderBuilderNode {
    tools: ToolOrchestrator,
}

impl OrderBuilderNode {
    pub fn new(tools: ToolOrchestrator) -> Self {
        Self { tools }
    }
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Choose line items from a menu shape of
/// `{"packages": [{name, price_per_person, items}], "individual_items":
/// [{name, price}]}`. Prefers the best package fitting the per-person
/// budget; falls back to a per-person plate when the menu is unusable.
fn build_line_items(menu: Option<&Value>, headcount: u32, budget_pp: Option<f64>) -> Vec<OrderItem> {
    if let Some(menu) = menu {
        if let Some(packages) = menu.get("packages").and_then(Value::as_array) {
            let mut candidates: Vec<(&str, f64)> = packages
                .iter()
                .filter_map(|pkg| {
                    let name = pkg.get("name")?.as_str()?;
                    let price = pkg
                        .get("price_per_person")
                        .or_else(|| pkg.get("price"))?
                        .as_f64()?;
                    Some((name, price))
                })
                .collect();
            candidates.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
            let pick = match budget_pp {
                Some(budget) => candidates
                    .iter()
                    .find(|(_, price)| *price <= budget)
                    .or_else(|| candidates.last()),
                None => candidates.last(),
            };
            if let Some((name, price)) = pick {
                return vec![OrderItem {
                    item_id: uuid::Uuid::new_v4().to_string(),
                    name: format!("{name} (per person)"),
                    quantity: headcount,
                    price: *price,
                    notes: None,
                }];
            }
        }
        if let Some(items) = menu.get("individual_items").and_then(Value::as_array) {
            let mut picked = Vec::new();
            for item in items.iter().take(3) {
                let (Some(name), Some(price)) = (
                    item.get("name").and_then(Value::as_str),
                    item.get("price").and_then(Value::as_f64),
                ) else {
                    continue;
                };
                picked.push(OrderItem {
                    item_id: uuid::Uuid::new_v4().to_string(),
                    name: name.to_string(),
                    quantity: headcount.div_ceil(picked.len() as u32 + 2),
                    price,
                    notes: None,
                });
            }
            if !picked.is_empty() {
                return picked;
            }
        }
    }
    vec![OrderItem {
        item_id: uuid::Uuid::new_v4().to_string(),
        name: "Group meal (per person)".to_string(),
        quantity: headcount,
        price: budget_pp.map(|b| b.min(DEFAULT_PLATE_PRICE)).unwrap_or(DEFAULT_PLATE_PRICE),
        notes: None,
    }]
}

/// Largest subtotal whose priced total stays at or under `budget`.
fn fit_subtotal(budget: f64) -> f64 {
    let rate = 1.0 + TAX_RATE + SERVICE_FEE_RATE;
    let without_delivery = budget / rate;
    if without_delivery >= FREE_DELIVERY_FLOOR {
        without_delivery
    } else {
        ((budget - DELIVERY_FEE) / rate).max(0.01)
    }
}

/// Replace the line items with a single per-person plate that fits the
/// tightest of the declared budgets. Used on the rebuild pass after a
/// failed review; the cent of slack absorbs rounding in the fee math.
pub fn refit_to_budget(order: &mut FoodOrderContext) {
    let headcount = order.headcount.unwrap_or(10).max(1);
    let mut budget = f64::INFINITY;
    if let Some(total) = order.budget_total {
        budget = budget.min(total);
    }
    if let Some(pp) = order.budget_per_person {
        budget = budget.min(pp * headcount as f64);
    }
    if !budget.is_finite() {
        return;
    }
    let per_plate = fit_subtotal(budget) / headcount as f64;
    let per_plate = ((per_plate * 100.0).floor() - 1.0).max(1.0) / 100.0;
    order.line_items = vec![OrderItem {
        item_id: uuid::Uuid::new_v4().to_string(),
        name: "Budget-fit group meal (per person)".to_string(),
        quantity: headcount,
        price: per_plate,
        notes: None,
    }];
}

/// Fill in the computed pricing fields from the line items.
pub fn price_order(order: &mut FoodOrderContext) {
    let subtotal: f64 = order
        .line_items
        .iter()
        .map(|item| item.price * item.quantity as f64)
        .sum();
    order.subtotal = Some(round2(subtotal));
    order.tax = Some(round2(subtotal * TAX_RATE));
    order.delivery_fee = Some(if subtotal < FREE_DELIVERY_FLOOR {
        DELIVERY_FEE
    } else {
        0.0
    });
    order.service_fee = Some(round2(subtotal * SERVICE_FEE_RATE));
    order.total = Some(round2(
        order.subtotal.unwrap_or(0.0)
            + order.tax.unwrap_or(0.0)
            + order.delivery_fee.unwrap_or(0.0)
            + order.service_fee.unwrap_or(0.0),
    ));
}

fn format_order(order: &FoodOrderContext) -> String {
    let mut lines = vec!["Here's the order I put together:".to_string()];
    for item in &order.line_items {
        lines.push(format!(
            "- {} x{} @ ${:.2}",
            item.name, item.quantity, item.price
        ));
    }
    lines.push(format!("Subtotal: ${:.2}", order.subtotal.unwrap_or(0.0)));
    lines.push(format!(
        "Total with tax and fees: ${:.2}",
        order.total.unwrap_or(0.0)
    ));
    lines.join("\n")
}

#[async_trait]
impl Node for OrderBuilderNode {
    async fn run(
        &self,
        snapshot: StateSnapshot,
        ctx: NodeContext,
    ) -> Result<NodePartial, NodeError> {
        let Some(mut order) = snapshot.food_order() else {
            return Ok(NodePartial::new().with_messages(vec![Message::assistant(
                "No food order in progress. Would you like to start one?",
            )]));
        };

        let Some(vendor) = order.selected_vendor.clone() else {
            let reply = if order.vendor_options.is_empty() {
                order.current_step = WorkflowStep::SearchVendors;
                "Let's find some restaurants first. What type of food are you looking for?"
            } else {
                order.current_step = WorkflowStep::SelectVendor;
                "Please pick a restaurant first — which number from the list?"
            };
            return Ok(NodePartial::new()
                .with_messages(vec![Message::assistant(reply)])
                .with_slot(slots::FOOD_ORDER, json!(order)));
        };

        ctx.emit("order_builder", format!("building order from {}", vendor.name))?;

        let rebuilding = !order.validation_errors.is_empty();
        if rebuilding {
            // Failed review: downgrade to a plate that fits the budget.
            ctx.emit("order_builder", "re-fitting order to budget")?;
            refit_to_budget(&mut order);
            order.rebuild_attempted = true;
        } else {
            // Menu fallback chain: structured menu first, details second.
            let menu = self
                .tools
                .dispatch_first_non_empty(vec![
                    ToolCall::new(
                        tool_names::CATERING_MENU,
                        json!({"caterer_id": vendor.vendor_id}),
                    ),
                    ToolCall::new(
                        tool_names::BUSINESS_DETAILS,
                        json!({"business_id": vendor.vendor_id}),
                    ),
                ])
                .await
                .and_then(|outcome| outcome.result.ok());

            let headcount = order.headcount.unwrap_or(10);
            order.line_items = build_line_items(menu.as_ref(), headcount, order.budget_per_person);
            order.rebuild_attempted = false;
        }
        price_order(&mut order);
        // Clear stale validation results; the review pass recomputes them.
        order.validation_errors.clear();
        order.validation_warnings.clear();
        order.complete_step(WorkflowStep::BuildOrder, WorkflowStep::ReviewOrder);

        ctx.emit(
            "order_builder",
            format!("priced at ${:.2}", order.total.unwrap_or(0.0)),
        )?;

        let message = format_order(&order);
        Ok(NodePartial::new()
            .with_messages(vec![Message::assistant(&message)])
            .with_slot(slots::FOOD_ORDER, json!(order)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pricing_matches_rate_table() {
        let mut order = FoodOrderContext {
            line_items: vec![OrderItem {
                item_id: "i1".into(),
                name: "Plate".into(),
                quantity: 10,
                price: 10.0,
                notes: None,
            }],
            ..Default::default()
        };
        price_order(&mut order);
        assert_eq!(order.subtotal, Some(100.0));
        assert_eq!(order.tax, Some(8.0));
        assert_eq!(order.delivery_fee, Some(0.0)); // above the floor
        assert_eq!(order.service_fee, Some(15.0));
        assert_eq!(order.total, Some(123.0));
    }

    #[test]
    fn small_orders_pay_delivery() {
        let mut order = FoodOrderContext {
            line_items: vec![OrderItem {
                item_id: "i1".into(),
                name: "Solo plate".into(),
                quantity: 1,
                price: 12.0,
                notes: None,
            }],
            ..Default::default()
        };
        price_order(&mut order);
        assert_eq!(order.delivery_fee, Some(DELIVERY_FEE));
    }

    #[test]
    fn package_within_budget_is_preferred() {
        let menu = json!({
            "packages": [
                {"name": "Premium", "price_per_person": 28.0},
                {"name": "Standard", "price_per_person": 18.0},
                {"name": "Value", "price_per_person": 12.0},
            ]
        });
        let items = build_line_items(Some(&menu), 12, Some(20.0));
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].name, "Standard (per person)");
        assert_eq!(items[0].quantity, 12);
        assert_eq!(items[0].price, 18.0);
    }

    #[test]
    fn refit_lands_at_or_under_the_tightest_budget() {
        let mut order = FoodOrderContext {
            headcount: Some(10),
            budget_total: Some(500.0),
            validation_errors: vec!["Order exceeds budget".into()],
            ..Default::default()
        };
        refit_to_budget(&mut order);
        price_order(&mut order);
        assert!(order.total.unwrap() <= 500.0);

        let mut order = FoodOrderContext {
            headcount: Some(4),
            budget_per_person: Some(12.0),
            validation_errors: vec!["Per-person cost exceeds budget".into()],
            ..Default::default()
        };
        refit_to_budget(&mut order);
        price_order(&mut order);
        assert!(order.per_person_cost().unwrap() <= 12.0);
    }

    #[test]
    fn no_menu_falls_back_to_default_plate() {
        let items = build_line_items(None, 8, None);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].price, DEFAULT_PLATE_PRICE);
        assert_eq!(items[0].quantity, 8);
    }
}

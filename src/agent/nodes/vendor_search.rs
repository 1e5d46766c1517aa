use async_trait::async_trait;
use serde_json::{json, Value};

use crate::agent::tool_names;
use crate::channels::errors::{CauseChain, ErrorEvent};
use crate::message::Message;
use crate::node::{Node, NodeContext, NodeError, NodePartial};
use crate::orders::{merge_vendor_options, FoodOrderContext, VendorOption, WorkflowStep};
use crate::schema::slots;
use crate::state::StateSnapshot;
use crate::tools::{ToolCall, ToolOrchestrator};

/// Groups above this size search caterers instead of restaurants.
const CATERING_THRESHOLD: u32 = 15;
/// How many merged options to present.
const MAX_OPTIONS: usize = 5;

/// Concurrent two-source vendor search.
///
/// Both sources run in parallel with independent timeouts; a source that
/// fails or times out is dropped from the merge and recorded on the errors
/// channel, so the surviving source still produces options.
pub struct VendorSearchNode {
    tools: ToolOrchestrator,
}

impl VendorSearchNode {
    pub fn new(tools: ToolOrchestrator) -> Self {
        Self { tools }
    }
}

fn normalize_yelp(biz: &Value) -> Option<VendorOption> {
    Some(VendorOption {
        vendor_id: biz.get("id")?.as_str()?.to_string(),
        name: biz.get("name")?.as_str()?.to_string(),
        rating: biz.get("rating").and_then(Value::as_f64),
        price_level: biz
            .get("price")
            .and_then(Value::as_str)
            .map(str::to_string),
        address: biz
            .get("address")
            .and_then(Value::as_str)
            .map(str::to_string),
        phone: biz
            .get("display_phone")
            .or_else(|| biz.get("phone"))
            .and_then(Value::as_str)
            .map(str::to_string),
        categories: biz
            .get("categories")
            .and_then(Value::as_array)
            .map(|cats| {
                cats.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default(),
        source: "yelp".to_string(),
        distance_miles: biz
            .get("distance_meters")
            .and_then(Value::as_f64)
            .map(|m| m / 1609.34),
    })
}

fn normalize_place(place: &Value) -> Option<VendorOption> {
    Some(VendorOption {
        vendor_id: place.get("place_id")?.as_str()?.to_string(),
        name: place.get("name")?.as_str()?.to_string(),
        rating: place.get("rating").and_then(Value::as_f64),
        price_level: place
            .get("price_level")
            .and_then(Value::as_str)
            .map(str::to_string),
        address: place
            .get("address")
            .and_then(Value::as_str)
            .map(str::to_string),
        phone: None,
        categories: place
            .get("types")
            .and_then(Value::as_array)
            .map(|types| {
                types
                    .iter()
                    .filter_map(Value::as_str)
                    .take(3)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default(),
        source: "places".to_string(),
        distance_miles: None,
    })
}

fn format_options(vendors: &[VendorOption]) -> String {
    let mut lines = Vec::new();
    for (i, v) in vendors.iter().enumerate() {
        let rating = v
            .rating
            .map(|r| format!("{r}/5"))
            .unwrap_or_else(|| "no rating".to_string());
        let price = v.price_level.as_deref().unwrap_or("$$");
        lines.push(format!("{}. {} - {rating}, {price}", i + 1, v.name));
        if let Some(address) = &v.address {
            lines.push(format!("   {address}"));
        }
    }
    lines.join("\n")
}

/// Search term: first cuisine preference with the first dietary restriction
/// folded in for better matches.
fn search_term(order: &FoodOrderContext) -> String {
    let base = order
        .cuisine_preferences
        .first()
        .cloned()
        .unwrap_or_else(|| "restaurant".to_string());
    match order.dietary_restrictions.first() {
        Some(dietary) => format!("{dietary} {base}"),
        None => base,
    }
}

#[async_trait]
impl Node for VendorSearchNode {
    async fn run(
        &self,
        snapshot: StateSnapshot,
        ctx: NodeContext,
    ) -> Result<NodePartial, NodeError> {
        let mut order = snapshot.food_order().unwrap_or_default();
        if let Some(prefs) = snapshot.user_preferences() {
            order.apply_preferences(&prefs);
        }

        let Some(location) = order.delivery_address.clone() else {
            order.current_step = WorkflowStep::GatherRequirements;
            return Ok(NodePartial::new()
                .with_messages(vec![Message::assistant(
                    "I need a delivery address to search for restaurants. Where should the food go?",
                )])
                .with_slot(slots::FOOD_ORDER, json!(order)));
        };

        let headcount = order.headcount.unwrap_or(10);
        let term = search_term(&order);
        let is_catering = headcount > CATERING_THRESHOLD;
        ctx.emit(
            "vendor_search",
            format!("searching '{term}' near {location} (catering={is_catering})"),
        )?;

        let first_source = if is_catering {
            tool_names::YELP_CATERING
        } else {
            tool_names::YELP_SEARCH
        };
        let outcomes = self
            .tools
            .dispatch(vec![
                ToolCall::new(
                    first_source,
                    json!({"location": location, "term": term, "limit": MAX_OPTIONS}),
                ),
                ToolCall::new(
                    tool_names::PLACES_SEARCH,
                    json!({"query": format!("{term} restaurant near {location}")}),
                ),
            ])
            .await;

        let mut batches: Vec<Vec<VendorOption>> = Vec::new();
        let mut source_errors: Vec<ErrorEvent> = Vec::new();
        for outcome in &outcomes {
            match &outcome.result {
                Ok(value) => {
                    let mut batch = Vec::new();
                    if let Some(businesses) = value.get("businesses").and_then(Value::as_array) {
                        batch.extend(businesses.iter().filter_map(normalize_yelp));
                    }
                    if let Some(places) = value.get("places").and_then(Value::as_array) {
                        batch.extend(places.iter().filter_map(normalize_place));
                    }
                    batches.push(batch);
                }
                Err(e) => {
                    // Degrade gracefully: the other source still counts.
                    ctx.emit("vendor_search", format!("source {} failed: {e}", outcome.name))?;
                    source_errors.push(
                        ErrorEvent::node(ctx.node_id.clone(), ctx.step, CauseChain::msg(e.to_string()))
                            .with_tag("tool")
                            .with_context(json!({"source": outcome.name})),
                    );
                }
            }
        }

        let top = merge_vendor_options(batches, MAX_OPTIONS);
        ctx.emit("vendor_search", format!("found {} options", top.len()))?;

        let message = if top.is_empty() {
            order.current_step = WorkflowStep::SearchVendors;
            format!(
                "I couldn't find any restaurants matching '{term}' near {location}. Want me to try a different cuisine?"
            )
        } else {
            order.vendor_options = top.clone();
            order.complete_step(WorkflowStep::SearchVendors, WorkflowStep::SelectVendor);
            let mut note = String::new();
            if !order.dietary_restrictions.is_empty() {
                note = format!("\nFiltered for: {}", order.dietary_restrictions.join(", "));
            }
            format!(
                "I found {} options for your order:\n\n{}{note}\n\nWhich restaurant would you like? Tell me the number or name.",
                top.len(),
                format_options(&top)
            )
        };

        let mut partial = NodePartial::new()
            .with_messages(vec![Message::assistant(&message)])
            .with_slot(slots::FOOD_ORDER, json!(order))
            .with_slot(
                slots::CACHED_VENDOR_SEARCH,
                json!({
                    "vendors": top,
                    "location": location,
                    "search_term": term,
                }),
            );
        if !source_errors.is_empty() {
            partial = partial.with_errors(source_errors);
        }
        Ok(partial)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yelp_and_place_shapes_normalize() {
        let yelp = json!({
            "id": "y1",
            "name": "Thai Basil",
            "rating": 4.4,
            "price": "$$",
            "address": "1 Main St",
            "display_phone": "(555) 010-2000",
            "categories": ["thai", "noodles"],
            "distance_meters": 1609.34,
        });
        let v = normalize_yelp(&yelp).unwrap();
        assert_eq!(v.name, "Thai Basil");
        assert_eq!(v.source, "yelp");
        assert!((v.distance_miles.unwrap() - 1.0).abs() < 1e-9);

        let place = json!({
            "place_id": "p1",
            "name": "Saffron House",
            "rating": 4.7,
            "price_level": "$$$",
            "address": "2 Market St",
            "types": ["restaurant", "food", "establishment", "extra"],
        });
        let v = normalize_place(&place).unwrap();
        assert_eq!(v.source, "places");
        assert_eq!(v.categories.len(), 3);
    }

    #[test]
    fn search_term_folds_in_dietary() {
        let order = FoodOrderContext {
            cuisine_preferences: vec!["thai".into()],
            dietary_restrictions: vec!["vegetarian".into()],
            ..Default::default()
        };
        assert_eq!(search_term(&order), "vegetarian thai");
    }
}

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

use mealgraph::agent::{build_agent_graph, tool_names, AgentDeps};
use mealgraph::app::App;
use mealgraph::orders::{FoodOrderContext, VendorOption, WorkflowStep};
use mealgraph::runtimes::{RuntimeConfig, TurnRunner};
use mealgraph::schema::slots;
use mealgraph::state::VersionedState;
use mealgraph::tools::{Tool, ToolError, ToolOrchestrator};

pub fn state_with_user(text: &str) -> VersionedState {
    VersionedState::new_with_user_message(text)
}

/// Tool that returns a fixed payload.
pub struct StaticTool {
    pub tool_name: String,
    pub payload: Value,
}

impl StaticTool {
    pub fn new(name: &str, payload: Value) -> Self {
        Self {
            tool_name: name.to_string(),
            payload,
        }
    }
}

#[async_trait]
impl Tool for StaticTool {
    fn name(&self) -> &str {
        &self.tool_name
    }

    async fn call(&self, _args: Value) -> Result<Value, ToolError> {
        Ok(self.payload.clone())
    }
}

/// Tool that always fails.
pub struct FailingTool {
    pub tool_name: String,
}

#[async_trait]
impl Tool for FailingTool {
    fn name(&self) -> &str {
        &self.tool_name
    }

    async fn call(&self, _args: Value) -> Result<Value, ToolError> {
        Err(ToolError::call(self.tool_name.clone(), "source unavailable"))
    }
}

/// Tool that never returns within any sane timeout.
pub struct HangingTool {
    pub tool_name: String,
}

#[async_trait]
impl Tool for HangingTool {
    fn name(&self) -> &str {
        &self.tool_name
    }

    async fn call(&self, _args: Value) -> Result<Value, ToolError> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(json!({}))
    }
}

/// Three restaurants in the shape the first vendor source returns.
pub fn yelp_payload() -> Value {
    json!({
        "businesses": [
            {"id": "y1", "name": "Thai Basil", "rating": 4.4, "price": "$$",
             "address": "1 Main St", "categories": ["thai"]},
            {"id": "y2", "name": "Saffron House", "rating": 4.8, "price": "$$$",
             "address": "2 Market St", "categories": ["indian"]},
            {"id": "y3", "name": "Golden Curry", "price": "$",
             "address": "3 Pine St", "categories": ["curry"]},
        ]
    })
}

/// An orchestrator where the first source answers and the second hangs.
pub fn orchestrator_with_flaky_places() -> ToolOrchestrator {
    ToolOrchestrator::new()
        .with_call_timeout(Duration::from_millis(100))
        .register(Arc::new(StaticTool::new(tool_names::YELP_SEARCH, yelp_payload())))
        .register(Arc::new(StaticTool::new(
            tool_names::YELP_CATERING,
            yelp_payload(),
        )))
        .register(Arc::new(HangingTool {
            tool_name: tool_names::PLACES_SEARCH.to_string(),
        }))
}

/// Fully working orchestrator with both vendor sources and a menu.
pub fn full_orchestrator() -> ToolOrchestrator {
    ToolOrchestrator::new()
        .with_call_timeout(Duration::from_millis(200))
        .register(Arc::new(StaticTool::new(tool_names::YELP_SEARCH, yelp_payload())))
        .register(Arc::new(StaticTool::new(
            tool_names::YELP_CATERING,
            yelp_payload(),
        )))
        .register(Arc::new(StaticTool::new(
            tool_names::PLACES_SEARCH,
            json!({
                "places": [
                    {"place_id": "p1", "name": "Lotus Garden", "rating": 4.6,
                     "price_level": "$$", "address": "4 Oak St", "types": ["restaurant"]},
                    {"place_id": "p2", "name": "Thai Basil", "rating": 4.0,
                     "price_level": "$$", "address": "1 Main St", "types": ["restaurant"]},
                ]
            }),
        )))
        .register(Arc::new(StaticTool::new(
            tool_names::CATERING_MENU,
            json!({
                "packages": [
                    {"name": "Standard", "price_per_person": 18.0, "items": ["entree", "side"]},
                    {"name": "Value", "price_per_person": 12.0, "items": ["entree"]},
                ]
            }),
        )))
}

/// Agent app + runner on an in-memory store, no stdout noise.
pub async fn test_runner(tools: ToolOrchestrator) -> TurnRunner {
    mealgraph::telemetry::init_tracing();
    let app = agent_app(tools);
    let config = RuntimeConfig::default()
        .with_event_bus(mealgraph::runtimes::EventBusConfig::default());
    TurnRunner::new(app, config).await.expect("runner builds")
}

pub fn agent_app(tools: ToolOrchestrator) -> App {
    build_agent_graph(AgentDeps::new(tools)).expect("agent graph compiles")
}

/// A vendor option fixture.
pub fn vendor(name: &str, rating: Option<f64>) -> VendorOption {
    VendorOption {
        vendor_id: name.to_lowercase().replace(' ', "-"),
        name: name.to_string(),
        rating,
        price_level: Some("$$".into()),
        address: Some("1 Main St".into()),
        phone: None,
        categories: vec![],
        source: "yelp".into(),
        distance_miles: None,
    }
}

/// An order context ready for review: all requirements and a vendor.
pub fn reviewable_order(total: f64, budget_total: f64) -> FoodOrderContext {
    FoodOrderContext {
        current_step: WorkflowStep::ReviewOrder,
        headcount: Some(10),
        event_date: Some("2026-09-01".into()),
        delivery_address: Some("500 Howard St, San Francisco".into()),
        budget_total: Some(budget_total),
        selected_vendor: Some(vendor("Thai Basil", Some(4.4))),
        total: Some(total),
        subtotal: Some(total),
        ..Default::default()
    }
}

/// Slot override that installs a food order into a turn input.
pub fn food_order_slot(order: &FoodOrderContext) -> (String, Value) {
    (slots::FOOD_ORDER.to_string(), json!(order))
}

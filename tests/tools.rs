use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use mealgraph::agent::tool_names;
use mealgraph::tools::{ToolCall, ToolError, ToolOrchestrator};

mod common;
use common::*;

#[tokio::test]
async fn batch_tags_each_outcome_with_its_source() {
    let orchestrator = ToolOrchestrator::new()
        .with_call_timeout(Duration::from_millis(50))
        .register(Arc::new(StaticTool::new("fast", json!({"ok": true}))))
        .register(Arc::new(FailingTool {
            tool_name: "broken".into(),
        }))
        .register(Arc::new(HangingTool {
            tool_name: "slow".into(),
        }));

    let outcomes = orchestrator
        .dispatch(vec![
            ToolCall::new("fast", json!({})),
            ToolCall::new("broken", json!({})),
            ToolCall::new("slow", json!({})),
        ])
        .await;

    assert_eq!(outcomes.len(), 3);
    assert_eq!(outcomes[0].name, "fast");
    assert!(outcomes[0].ok().is_some());
    assert!(matches!(outcomes[1].result, Err(ToolError::Call { .. })));
    assert!(matches!(outcomes[2].result, Err(ToolError::Timeout { .. })));
}

#[tokio::test]
async fn one_failed_source_does_not_abort_the_batch() {
    let orchestrator = orchestrator_with_flaky_places();

    let outcomes = orchestrator
        .dispatch(vec![
            ToolCall::new(tool_names::YELP_SEARCH, json!({"location": "SoMa"})),
            ToolCall::new(tool_names::PLACES_SEARCH, json!({"query": "thai"})),
        ])
        .await;

    let survivors: Vec<_> = outcomes.iter().filter(|o| o.ok().is_some()).collect();
    assert_eq!(survivors.len(), 1);
    assert_eq!(survivors[0].name, tool_names::YELP_SEARCH);
    let businesses = survivors[0].ok().unwrap()["businesses"].as_array().unwrap();
    assert_eq!(businesses.len(), 3);
}

#[tokio::test]
async fn fallback_chain_skips_empty_sources() {
    let orchestrator = ToolOrchestrator::new()
        .register(Arc::new(StaticTool::new("primary", json!({"items": []}))))
        .register(Arc::new(StaticTool::new(
            "secondary",
            json!({"items": [{"name": "entree", "price": 12.0}]}),
        )))
        .register(Arc::new(StaticTool::new(
            "tertiary",
            json!({"items": [{"name": "should never be reached", "price": 1.0}]}),
        )));

    let outcome = orchestrator
        .dispatch_first_non_empty(vec![
            ToolCall::new("primary", json!({})),
            ToolCall::new("secondary", json!({})),
            ToolCall::new("tertiary", json!({})),
        ])
        .await
        .unwrap();

    assert_eq!(outcome.name, "secondary");
}

#[tokio::test]
async fn fallback_chain_tolerates_failing_head() {
    let orchestrator = ToolOrchestrator::new()
        .register(Arc::new(FailingTool {
            tool_name: "primary".into(),
        }))
        .register(Arc::new(StaticTool::new(
            "secondary",
            json!({"packages": [{"name": "Value", "price_per_person": 11.0}]}),
        )));

    let outcome = orchestrator
        .dispatch_first_non_empty(vec![
            ToolCall::new("primary", json!({})),
            ToolCall::new("secondary", json!({})),
        ])
        .await
        .unwrap();

    assert_eq!(outcome.name, "secondary");
    assert!(outcome.ok().is_some());
}

//! Agent graph wiring.
//!
//! Topology:
//!
//! ```text
//! Start -> preferences -> router
//!                           |
//!             (route_food_order, conditional)
//!               |        |         |          |            |
//!            executor vendor_  order_     order_       order_submit
//!               |     search   builder    validator        |
//!              End      End       |          |          approval -> End
//!                                 +--> order_validator
//!                                            |
//!                                (after_validation, conditional)
//!                                   |                  |
//!                              order_builder        approval
//! ```
//!
//! The build/review loop is not a structural cycle: the validator's backward
//! route is data in the step-machine tables, evaluated per turn.

use std::sync::Arc;

use crate::agent::deps::AgentDeps;
use crate::agent::names;
use crate::agent::nodes::{
    ApprovalNode, ExecutorNode, OrderBuilderNode, OrderSubmitNode, OrderValidatorNode,
    PreferencesNode, RouterNode, VendorSearchNode,
};
use crate::agent::routing::{
    after_build, after_build_targets, after_validation, after_validation_targets,
    route_food_order, route_food_order_targets,
};
use crate::app::App;
use crate::graphs::{EdgePredicate, GraphBuildError, GraphBuilder};
use crate::types::NodeKind;

fn custom(name: &str) -> NodeKind {
    NodeKind::Custom(name.to_string())
}

/// Assemble and compile the agent graph against the given dependencies.
pub fn build_agent_graph(deps: AgentDeps) -> Result<App, GraphBuildError> {
    let route_predicate: EdgePredicate = Arc::new(route_food_order);
    let build_predicate: EdgePredicate = Arc::new(after_build);
    let validation_predicate: EdgePredicate = Arc::new(after_validation);

    GraphBuilder::new()
        .add_node(custom(names::PREFERENCES), PreferencesNode)
        .add_node(custom(names::ROUTER), RouterNode)
        .add_node(custom(names::EXECUTOR), ExecutorNode)
        .add_node(
            custom(names::VENDOR_SEARCH),
            VendorSearchNode::new(deps.tools.clone()),
        )
        .add_node(
            custom(names::ORDER_BUILDER),
            OrderBuilderNode::new(deps.tools.clone()),
        )
        .add_node(custom(names::ORDER_VALIDATOR), OrderValidatorNode)
        .add_node(custom(names::ORDER_SUBMIT), OrderSubmitNode)
        .add_node(
            custom(names::APPROVAL),
            ApprovalNode::new(deps.notifier.clone()),
        )
        .add_edge(NodeKind::Start, custom(names::PREFERENCES))
        .add_edge(custom(names::PREFERENCES), custom(names::ROUTER))
        .add_conditional_edge(
            custom(names::ROUTER),
            route_food_order_targets(),
            route_predicate,
        )
        .add_edge(custom(names::EXECUTOR), NodeKind::End)
        .add_edge(custom(names::VENDOR_SEARCH), NodeKind::End)
        .add_conditional_edge(
            custom(names::ORDER_BUILDER),
            after_build_targets(),
            build_predicate,
        )
        .add_conditional_edge(
            custom(names::ORDER_VALIDATOR),
            after_validation_targets(),
            validation_predicate,
        )
        .add_edge(custom(names::ORDER_SUBMIT), custom(names::APPROVAL))
        .add_edge(custom(names::APPROVAL), NodeKind::End)
        .compile()
}

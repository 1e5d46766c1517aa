use std::sync::Arc;

use async_trait::async_trait;
use mealgraph::graphs::{EdgePredicate, GraphBuildError, GraphBuilder};
use mealgraph::node::{Node, NodeContext, NodeError, NodePartial};
use mealgraph::state::StateSnapshot;
use mealgraph::types::NodeKind;

struct NoopNode;

#[async_trait]
impl Node for NoopNode {
    async fn run(&self, _: StateSnapshot, _: NodeContext) -> Result<NodePartial, NodeError> {
        Ok(NodePartial::default())
    }
}

fn custom(name: &str) -> NodeKind {
    NodeKind::Custom(name.to_string())
}

#[test]
fn linear_graph_compiles() {
    let app = GraphBuilder::new()
        .add_node(custom("a"), NoopNode)
        .add_edge(NodeKind::Start, custom("a"))
        .add_edge(custom("a"), NodeKind::End)
        .compile()
        .unwrap();
    assert_eq!(app.entry_node(), custom("a"));
}

#[test]
fn missing_entry_edge_is_rejected() {
    let err = GraphBuilder::new()
        .add_node(custom("a"), NoopNode)
        .add_edge(custom("a"), NodeKind::End)
        .compile()
        .unwrap_err();
    assert!(matches!(err, GraphBuildError::NoEntryEdge));
}

#[test]
fn edge_to_unregistered_node_is_rejected() {
    let err = GraphBuilder::new()
        .add_node(custom("a"), NoopNode)
        .add_edge(NodeKind::Start, custom("a"))
        .add_edge(custom("a"), custom("ghost"))
        .compile()
        .unwrap_err();
    assert!(matches!(err, GraphBuildError::UnknownNode { .. }));
}

#[test]
fn conditional_edge_with_unknown_declared_target_is_rejected() {
    let predicate: EdgePredicate = Arc::new(|_| NodeKind::End);
    let err = GraphBuilder::new()
        .add_node(custom("a"), NoopNode)
        .add_edge(NodeKind::Start, custom("a"))
        .add_conditional_edge(custom("a"), vec![NodeKind::End, custom("ghost")], predicate)
        .compile()
        .unwrap_err();
    assert!(matches!(
        err,
        GraphBuildError::UnknownConditionalTarget { .. }
    ));
}

#[test]
fn node_with_both_edge_kinds_is_rejected() {
    let predicate: EdgePredicate = Arc::new(|_| NodeKind::End);
    let err = GraphBuilder::new()
        .add_node(custom("a"), NoopNode)
        .add_edge(NodeKind::Start, custom("a"))
        .add_edge(custom("a"), NodeKind::End)
        .add_conditional_edge(custom("a"), vec![NodeKind::End], predicate)
        .compile()
        .unwrap_err();
    assert!(matches!(err, GraphBuildError::AmbiguousSuccessor { .. }));
}

#[test]
fn dead_end_node_is_rejected() {
    let err = GraphBuilder::new()
        .add_node(custom("a"), NoopNode)
        .add_node(custom("b"), NoopNode)
        .add_edge(NodeKind::Start, custom("a"))
        .add_edge(custom("a"), NodeKind::End)
        .compile()
        .unwrap_err();
    assert!(matches!(err, GraphBuildError::DeadEnd { .. }));
}

#[test]
fn predicate_outside_declared_set_is_a_routing_error() {
    let predicate: EdgePredicate = Arc::new(|_| NodeKind::Custom("ghost".into()));
    let app = GraphBuilder::new()
        .add_node(custom("a"), NoopNode)
        .add_node(custom("b"), NoopNode)
        .add_edge(NodeKind::Start, custom("a"))
        .add_edge(custom("b"), NodeKind::End)
        .add_conditional_edge(custom("a"), vec![custom("b"), NodeKind::End], predicate)
        .compile()
        .unwrap();

    let snapshot = mealgraph::state::VersionedState::new_with_user_message("hi").snapshot();
    let err = app.route(&custom("a"), &snapshot).unwrap_err();
    assert!(err.to_string().contains("undeclared target"));
}

//! Graph compilation and validation.
//!
//! All structural checks run here, at construction time, so routing faults
//! surface before the first turn executes rather than mid-conversation.

use miette::Diagnostic;
use thiserror::Error;

use super::builder::GraphBuilder;
use crate::app::App;
use crate::types::NodeKind;

/// Structural problems detected while compiling a graph.
#[derive(Debug, Error, Diagnostic)]
pub enum GraphBuildError {
    #[error("graph has no nodes")]
    #[diagnostic(code(mealgraph::graphs::empty))]
    Empty,

    #[error("no entry edge: add exactly one edge from Start")]
    #[diagnostic(
        code(mealgraph::graphs::no_entry),
        help("The single edge out of the virtual Start node defines the entry node.")
    )]
    NoEntryEdge,

    #[error("edge references unknown node {node} (from {referenced_by})")]
    #[diagnostic(
        code(mealgraph::graphs::unknown_node),
        help("Register the node with add_node before referencing it in an edge.")
    )]
    UnknownNode {
        node: String,
        referenced_by: String,
    },

    #[error("conditional edge from {from} declares unknown target {target}")]
    #[diagnostic(
        code(mealgraph::graphs::unknown_conditional_target),
        help("Every declared target of a conditional edge must be a registered node or End.")
    )]
    UnknownConditionalTarget { from: String, target: String },

    #[error("node {node} has both a static edge and a conditional edge")]
    #[diagnostic(
        code(mealgraph::graphs::ambiguous_successor),
        help("A node routes either statically or conditionally, not both.")
    )]
    AmbiguousSuccessor { node: String },

    #[error("node {node} has no outgoing edge")]
    #[diagnostic(
        code(mealgraph::graphs::dead_end),
        help("Every registered node needs a static or conditional edge (possibly to End).")
    )]
    DeadEnd { node: String },
}

impl GraphBuilder {
    /// Compiles the graph into an executable application.
    ///
    /// Checks, in order: the graph is non-empty; exactly one entry edge
    /// exists; every edge endpoint names a registered node (or a virtual
    /// endpoint); every conditional edge's declared targets are valid; no
    /// node has both a static and a conditional successor; no registered
    /// node dead-ends.
    pub fn compile(self) -> Result<App, GraphBuildError> {
        if self.nodes.is_empty() {
            return Err(GraphBuildError::Empty);
        }

        if !self.edges.contains_key(&NodeKind::Start) {
            return Err(GraphBuildError::NoEntryEdge);
        }

        let node_exists = |kind: &NodeKind| match kind {
            NodeKind::Start | NodeKind::End => true,
            custom => self.nodes.contains_key(custom),
        };

        for (from, to) in &self.edges {
            if !node_exists(from) {
                return Err(GraphBuildError::UnknownNode {
                    node: from.encode(),
                    referenced_by: "edge source".to_string(),
                });
            }
            if !node_exists(to) {
                return Err(GraphBuildError::UnknownNode {
                    node: to.encode(),
                    referenced_by: from.encode(),
                });
            }
        }

        for edge in &self.conditional_edges {
            if !node_exists(edge.from()) {
                return Err(GraphBuildError::UnknownNode {
                    node: edge.from().encode(),
                    referenced_by: "conditional edge source".to_string(),
                });
            }
            for target in edge.targets() {
                if !node_exists(target) {
                    return Err(GraphBuildError::UnknownConditionalTarget {
                        from: edge.from().encode(),
                        target: target.encode(),
                    });
                }
            }
            if self.edges.contains_key(edge.from()) {
                return Err(GraphBuildError::AmbiguousSuccessor {
                    node: edge.from().encode(),
                });
            }
        }

        for kind in self.nodes.keys() {
            let has_static = self.edges.contains_key(kind);
            let has_conditional = self.conditional_edges.iter().any(|e| e.from() == kind);
            if !has_static && !has_conditional {
                return Err(GraphBuildError::DeadEnd {
                    node: kind.encode(),
                });
            }
        }

        Ok(App::from_parts(
            self.nodes,
            self.edges,
            self.conditional_edges,
        ))
    }
}

//! Fluent builder for constructing workflow graphs.

use rustc_hash::FxHashMap;
use std::sync::Arc;

use super::edges::{ConditionalEdge, EdgePredicate};
use crate::node::Node;
use crate::types::NodeKind;

/// Builder for workflow graphs.
///
/// Every graph needs at least one executable node, exactly one edge out of
/// the virtual `NodeKind::Start` (the entry node), and a path to
/// `NodeKind::End`. `Start`/`End` are structural endpoints only and are
/// never registered with [`add_node`](Self::add_node).
///
/// # Examples
///
/// ```
/// use mealgraph::graphs::GraphBuilder;
/// use mealgraph::types::NodeKind;
///
/// # struct MyNode;
/// # #[async_trait::async_trait]
/// # impl mealgraph::node::Node for MyNode {
/// #     async fn run(&self, _: mealgraph::state::StateSnapshot, _: mealgraph::node::NodeContext) -> Result<mealgraph::node::NodePartial, mealgraph::node::NodeError> {
/// #         Ok(mealgraph::node::NodePartial::default())
/// #     }
/// # }
///
/// let app = GraphBuilder::new()
///     .add_node(NodeKind::Custom("worker".into()), MyNode)
///     .add_edge(NodeKind::Start, NodeKind::Custom("worker".into()))
///     .add_edge(NodeKind::Custom("worker".into()), NodeKind::End)
///     .compile()
///     .unwrap();
/// # let _ = app;
/// ```
pub struct GraphBuilder {
    pub(crate) nodes: FxHashMap<NodeKind, Arc<dyn Node>>,
    pub(crate) edges: FxHashMap<NodeKind, NodeKind>,
    pub(crate) conditional_edges: Vec<ConditionalEdge>,
}

impl Default for GraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphBuilder {
    /// Creates a new, empty graph builder.
    #[must_use]
    pub fn new() -> Self {
        Self {
            nodes: FxHashMap::default(),
            edges: FxHashMap::default(),
            conditional_edges: Vec::new(),
        }
    }

    /// Adds a node to the graph.
    ///
    /// `NodeKind::Start` and `NodeKind::End` are virtual; attempts to
    /// register them are ignored with a warning.
    #[must_use]
    pub fn add_node(mut self, id: NodeKind, node: impl Node + 'static) -> Self {
        match id {
            NodeKind::Start | NodeKind::End => {
                tracing::warn!(
                    ?id,
                    "Ignoring registration of virtual node kind (Start/End are virtual)"
                );
            }
            _ => {
                self.nodes.insert(id, Arc::new(node));
            }
        }
        self
    }

    /// Adds an unconditional edge.
    ///
    /// Each source has at most one static edge; the walk is sequential, so a
    /// second edge from the same source replaces the first with a warning.
    #[must_use]
    pub fn add_edge(mut self, from: NodeKind, to: NodeKind) -> Self {
        if let Some(previous) = self.edges.insert(from.clone(), to) {
            tracing::warn!(
                ?from,
                ?previous,
                "replacing existing static edge; each node has one successor"
            );
        }
        self
    }

    /// Adds a conditional edge with its declared target set.
    ///
    /// The predicate is evaluated against the merged snapshot after `from`
    /// completes; all targets it can return must be listed in `targets`
    /// (checked at compile time, enforced again at runtime).
    #[must_use]
    pub fn add_conditional_edge(
        mut self,
        from: NodeKind,
        targets: Vec<NodeKind>,
        predicate: EdgePredicate,
    ) -> Self {
        self.conditional_edges
            .push(ConditionalEdge::new(from, targets, predicate));
        self
    }
}

//! Compiled workflow graph.
//!
//! [`App`] is the immutable product of
//! [`GraphBuilder::compile`](crate::graphs::GraphBuilder::compile): the node
//! registry, the edge tables, and the reducer registry. It knows how to
//! apply one node's update and how to route out of a node; the turn loop
//! that drives it lives in [`crate::runtimes::TurnRunner`].

use rustc_hash::FxHashMap;
use std::sync::Arc;

use crate::graphs::{ConditionalEdge, RoutingError};
use crate::node::{Node, NodePartial};
use crate::reducers::ReducerRegistry;
use crate::schema::SchemaError;
use crate::state::{StateSnapshot, VersionedState};
use crate::types::NodeKind;

/// Compiled, validated workflow graph.
#[derive(Clone)]
pub struct App {
    nodes: FxHashMap<NodeKind, Arc<dyn Node>>,
    edges: FxHashMap<NodeKind, NodeKind>,
    conditional_edges: Vec<ConditionalEdge>,
    reducer_registry: ReducerRegistry,
}

impl App {
    pub(crate) fn from_parts(
        nodes: FxHashMap<NodeKind, Arc<dyn Node>>,
        edges: FxHashMap<NodeKind, NodeKind>,
        conditional_edges: Vec<ConditionalEdge>,
    ) -> Self {
        Self {
            nodes,
            edges,
            conditional_edges,
            reducer_registry: ReducerRegistry::default(),
        }
    }

    /// The node registry.
    pub fn nodes(&self) -> &FxHashMap<NodeKind, Arc<dyn Node>> {
        &self.nodes
    }

    /// Resolve a node implementation by kind.
    pub fn node(&self, kind: &NodeKind) -> Option<Arc<dyn Node>> {
        self.nodes.get(kind).cloned()
    }

    /// The entry node: the single static successor of `Start`.
    ///
    /// Compilation guarantees presence.
    pub fn entry_node(&self) -> NodeKind {
        self.edges
            .get(&NodeKind::Start)
            .cloned()
            .expect("compiled graph always has an entry edge")
    }

    /// The static edge table.
    pub fn edges(&self) -> &FxHashMap<NodeKind, NodeKind> {
        &self.edges
    }

    /// The conditional edges.
    pub fn conditional_edges(&self) -> &[ConditionalEdge] {
        &self.conditional_edges
    }

    /// The registry of channel merge policies.
    pub fn reducer_registry(&self) -> &ReducerRegistry {
        &self.reducer_registry
    }

    /// Validate and merge one node's partial update into the state.
    ///
    /// Returns the channels that changed. On [`SchemaError`] the state is
    /// untouched — the atomicity the checkpoint layer relies on.
    pub fn apply_update(
        &self,
        state: &mut VersionedState,
        update: &NodePartial,
    ) -> Result<Vec<&'static str>, SchemaError> {
        self.reducer_registry.apply(state, update)
    }

    /// Decide the node after `from` given the merged snapshot.
    ///
    /// Static edges win; otherwise the node's conditional edge is evaluated.
    /// A node with neither (only possible for virtual endpoints) terminates
    /// the walk.
    pub fn route(
        &self,
        from: &NodeKind,
        snapshot: &StateSnapshot,
    ) -> Result<NodeKind, RoutingError> {
        if let Some(target) = self.edges.get(from) {
            return Ok(target.clone());
        }
        for edge in &self.conditional_edges {
            if edge.from() == from {
                return edge.route(snapshot);
            }
        }
        Ok(NodeKind::End)
    }
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("nodes", &self.nodes.keys().collect::<Vec<_>>())
            .field("edges", &self.edges)
            .field("conditional_edges", &self.conditional_edges.len())
            .finish()
    }
}

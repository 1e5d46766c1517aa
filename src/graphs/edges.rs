//! Edge types and routing predicates for conditional graph flow.

use miette::Diagnostic;
use std::sync::Arc;
use thiserror::Error;

use crate::state::StateSnapshot;
use crate::types::NodeKind;

/// Predicate for conditional edge routing.
///
/// Evaluated against the snapshot *after* the source node's update has been
/// merged; must be a pure function of the snapshot so that re-evaluating it
/// on resume yields the same target. Returns exactly one target.
///
/// ```
/// use mealgraph::graphs::EdgePredicate;
/// use mealgraph::types::NodeKind;
/// use std::sync::Arc;
///
/// let route: EdgePredicate = Arc::new(|snapshot| {
///     if snapshot.pending_actions().is_empty() {
///         NodeKind::End
///     } else {
///         NodeKind::Custom("approval".into())
///     }
/// });
/// ```
pub type EdgePredicate = Arc<dyn Fn(&StateSnapshot) -> NodeKind + Send + Sync + 'static>;

/// A conditional edge with a declared target set.
///
/// The declared targets are what compilation validates; at runtime a
/// predicate returning a target outside the set is a [`RoutingError`],
/// treated as an unrecoverable engine bug since the construction-time check
/// should have made it impossible.
#[derive(Clone)]
pub struct ConditionalEdge {
    from: NodeKind,
    targets: Vec<NodeKind>,
    predicate: EdgePredicate,
}

impl ConditionalEdge {
    pub fn new(
        from: impl Into<NodeKind>,
        targets: Vec<NodeKind>,
        predicate: EdgePredicate,
    ) -> Self {
        Self {
            from: from.into(),
            targets,
            predicate,
        }
    }

    /// The source node of this conditional edge.
    pub fn from(&self) -> &NodeKind {
        &self.from
    }

    /// The declared possible targets.
    pub fn targets(&self) -> &[NodeKind] {
        &self.targets
    }

    /// Evaluate the predicate and check the result against the declared set.
    pub fn route(&self, snapshot: &StateSnapshot) -> Result<NodeKind, RoutingError> {
        let target = (self.predicate)(snapshot);
        if self.targets.contains(&target) {
            Ok(target)
        } else {
            Err(RoutingError::UndeclaredTarget {
                from: self.from.encode(),
                target: target.encode(),
            })
        }
    }
}

impl std::fmt::Debug for ConditionalEdge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConditionalEdge")
            .field("from", &self.from)
            .field("targets", &self.targets)
            .finish()
    }
}

/// A routing predicate returned a target outside its declared set.
#[derive(Debug, Error, Diagnostic)]
pub enum RoutingError {
    #[error("conditional edge from {from} returned undeclared target {target}")]
    #[diagnostic(
        code(mealgraph::graphs::undeclared_target),
        help("The predicate's possible outputs must all be listed in the edge's declared targets.")
    )]
    UndeclaredTarget { from: String, target: String },
}

//! Node execution framework.
//!
//! A node is a single unit of computation in the workflow graph: it receives
//! an immutable [`StateSnapshot`] plus a [`NodeContext`], may emit streaming
//! events while running, and returns a [`NodePartial`] describing the state
//! it wants changed. The engine merges partials through the reducer registry
//! and checkpoints after every merge.

use async_trait::async_trait;
use miette::Diagnostic;
use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::channels::errors::ErrorEvent;
use crate::event_bus::{EmitterError, Event, EventEmitter};
use crate::message::Message;
use crate::state::StateSnapshot;
use crate::tools::ToolError;

/// Core trait for executable workflow nodes.
///
/// Nodes should be stateless over the snapshot: all inputs come from the
/// snapshot and the dependencies the node was constructed with, all outputs
/// go into the returned partial. Fatal failures return `Err(NodeError)` and
/// abort the turn; recoverable ones are recorded in `NodePartial::errors`
/// and execution continues.
#[async_trait]
pub trait Node: Send + Sync {
    /// Execute this node with the given state snapshot and context.
    async fn run(
        &self,
        snapshot: StateSnapshot,
        ctx: NodeContext,
    ) -> Result<NodePartial, NodeError>;
}

/// Execution context passed to nodes.
///
/// Carries the node's identity, the engine step number, and the event
/// emitter — the explicit output handle for streaming status notices while
/// the node is still running.
#[derive(Clone, Debug)]
pub struct NodeContext {
    /// Name of the executing node.
    pub node_id: String,
    /// Engine step number within the current turn.
    pub step: u64,
    /// Handle for emitting events onto the run's event bus.
    pub emitter: EventEmitter,
}

impl NodeContext {
    /// Emit a node-scoped event enriched with this context's metadata.
    pub fn emit(
        &self,
        scope: impl Into<String>,
        message: impl Into<String>,
    ) -> Result<(), NodeContextError> {
        self.emitter
            .emit(Event::node_message_with_meta(
                self.node_id.clone(),
                self.step,
                scope,
                message,
            ))
            .map_err(NodeContextError::from)
    }
}

/// Partial state update returned by node execution.
///
/// All fields are optional; a node touches only the channels it cares about.
///
/// ```
/// use mealgraph::node::NodePartial;
/// use mealgraph::message::Message;
/// use mealgraph::schema::slots;
/// use mealgraph::utils::collections::new_slot_map;
/// use serde_json::json;
///
/// let mut update = new_slot_map();
/// update.insert(slots::INTENT.to_string(), json!("food_order"));
/// let partial = NodePartial::new()
///     .with_messages(vec![Message::assistant("On it.")])
///     .with_slots(update);
/// ```
#[derive(Clone, Debug, Default)]
pub struct NodePartial {
    /// Messages to append to the conversation.
    pub messages: Option<Vec<Message>>,
    /// Declared slots to overwrite.
    pub slots: Option<FxHashMap<String, serde_json::Value>>,
    /// Error events to append to the diagnostics channel.
    pub errors: Option<Vec<ErrorEvent>>,
}

impl NodePartial {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_messages(mut self, messages: Vec<Message>) -> Self {
        self.messages = Some(messages);
        self
    }

    #[must_use]
    pub fn with_slots(mut self, slots: FxHashMap<String, serde_json::Value>) -> Self {
        self.slots = Some(slots);
        self
    }

    #[must_use]
    pub fn with_errors(mut self, errors: Vec<ErrorEvent>) -> Self {
        self.errors = Some(errors);
        self
    }

    /// Convenience for single-slot updates.
    #[must_use]
    pub fn with_slot(mut self, name: &str, value: serde_json::Value) -> Self {
        self.slots
            .get_or_insert_with(FxHashMap::default)
            .insert(name.to_string(), value);
        self
    }
}

/// Errors from NodeContext methods.
#[derive(Debug, Error, Diagnostic)]
pub enum NodeContextError {
    /// Event could not be sent: the bus is disconnected or closed.
    #[error("failed to emit event: event bus unavailable")]
    #[diagnostic(
        code(mealgraph::node::event_bus_unavailable),
        help("The event bus may be disconnected. Check whether the consumer dropped the stream.")
    )]
    EventBusUnavailable,
}

impl From<EmitterError> for NodeContextError {
    fn from(_: EmitterError) -> Self {
        NodeContextError::EventBusUnavailable
    }
}

/// Fatal errors during node execution.
///
/// These halt the turn. For recoverable failures use `NodePartial::errors`.
#[derive(Debug, Error, Diagnostic)]
pub enum NodeError {
    /// Expected input data is missing from the state snapshot.
    #[error("missing expected input: {what}")]
    #[diagnostic(
        code(mealgraph::node::missing_input),
        help("Check that an earlier node produced the required data.")
    )]
    MissingInput { what: &'static str },

    /// An external tool call failed in a way the node chose not to absorb.
    #[error(transparent)]
    #[diagnostic(code(mealgraph::node::tool))]
    Tool(#[from] ToolError),

    /// JSON serialization/deserialization error.
    #[error(transparent)]
    #[diagnostic(code(mealgraph::node::serde_json))]
    Serde(#[from] serde_json::Error),

    /// Event bus communication error.
    #[error("event bus error: {0}")]
    #[diagnostic(code(mealgraph::node::event_bus))]
    EventBus(#[from] NodeContextError),
}

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Scope label of the diagnostic event the runner emits when a turn's
/// stream is finished (completed or failed). Consumers use it to know no
/// further events will arrive for the turn.
pub const STREAM_END_SCOPE: &str = "__mealgraph_stream_end__";

/// A streaming event emitted during turn execution.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum Event {
    /// Status notice emitted by a node while it is running.
    Node(NodeEvent),
    /// Per-node update summary emitted by the engine after a merge.
    Update(UpdateEvent),
    /// Engine-level diagnostic (turn start/end, stream termination).
    Diagnostic(DiagnosticEvent),
}

impl Event {
    pub fn node_message(scope: impl Into<String>, message: impl Into<String>) -> Self {
        Event::Node(NodeEvent::new(None, None, scope.into(), message.into()))
    }

    pub fn node_message_with_meta(
        node_id: impl Into<String>,
        step: u64,
        scope: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Event::Node(NodeEvent::new(
            Some(node_id.into()),
            Some(step),
            scope.into(),
            message.into(),
        ))
    }

    pub fn update(node_id: impl Into<String>, step: u64, updated_channels: Vec<String>) -> Self {
        Event::Update(UpdateEvent {
            node_id: node_id.into(),
            step,
            updated_channels,
        })
    }

    pub fn diagnostic(scope: impl Into<String>, message: impl Into<String>) -> Self {
        Event::Diagnostic(DiagnosticEvent {
            scope: scope.into(),
            message: message.into(),
        })
    }

    pub fn scope_label(&self) -> Option<&str> {
        match self {
            Event::Node(node) => Some(node.scope()),
            Event::Update(_) => Some("update"),
            Event::Diagnostic(diag) => Some(diag.scope()),
        }
    }

    pub fn message(&self) -> String {
        match self {
            Event::Node(node) => node.message().to_string(),
            Event::Update(update) => update.updated_channels.join(","),
            Event::Diagnostic(diag) => diag.message().to_string(),
        }
    }

    /// Structured JSON form with a normalized schema:
    /// `{type, scope, message, metadata}`.
    pub fn to_json_value(&self) -> Value {
        let (event_type, metadata) = match self {
            Event::Node(node) => {
                let mut meta = serde_json::Map::new();
                if let Some(node_id) = node.node_id() {
                    meta.insert("node_id".to_string(), json!(node_id));
                }
                if let Some(step) = node.step() {
                    meta.insert("step".to_string(), json!(step));
                }
                ("node", Value::Object(meta))
            }
            Event::Update(update) => {
                let mut meta = serde_json::Map::new();
                meta.insert("node_id".to_string(), json!(update.node_id));
                meta.insert("step".to_string(), json!(update.step));
                ("update", Value::Object(meta))
            }
            Event::Diagnostic(_) => ("diagnostic", Value::Object(serde_json::Map::new())),
        };

        json!({
            "type": event_type,
            "scope": self.scope_label(),
            "message": self.message(),
            "metadata": metadata,
        })
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::Node(node) => match (node.node_id(), node.step()) {
                (Some(id), Some(step)) => write!(f, "[{id}@{step}] {}", node.message()),
                (Some(id), None) => write!(f, "[{id}] {}", node.message()),
                (None, Some(step)) => write!(f, "[step {step}] {}", node.message()),
                (None, None) => write!(f, "{}", node.message()),
            },
            Event::Update(update) => write!(
                f,
                "[{}@{}] updated: {}",
                update.node_id,
                update.step,
                update.updated_channels.join(",")
            ),
            Event::Diagnostic(diag) => write!(f, "{}", diag.message()),
        }
    }
}

/// Status notice from a running node.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct NodeEvent {
    node_id: Option<String>,
    step: Option<u64>,
    scope: String,
    message: String,
}

impl NodeEvent {
    pub fn new(node_id: Option<String>, step: Option<u64>, scope: String, message: String) -> Self {
        Self {
            node_id,
            step,
            scope,
            message,
        }
    }

    pub fn node_id(&self) -> Option<&str> {
        self.node_id.as_deref()
    }

    pub fn step(&self) -> Option<u64> {
        self.step
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Engine summary of a merged node update.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct UpdateEvent {
    pub node_id: String,
    pub step: u64,
    pub updated_channels: Vec<String>,
}

/// Engine-level diagnostic message.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DiagnosticEvent {
    scope: String,
    message: String,
}

impl DiagnosticEvent {
    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_shape_is_normalized() {
        let event = Event::node_message_with_meta("router", 5, "routing", "classifying");
        let json = event.to_json_value();
        assert_eq!(json["type"], "node");
        assert_eq!(json["scope"], "routing");
        assert_eq!(json["metadata"]["node_id"], "router");
        assert_eq!(json["metadata"]["step"], 5);
    }

    #[test]
    fn display_includes_node_meta() {
        let event = Event::node_message_with_meta("executor", 2, "status", "working");
        assert_eq!(format!("{event}"), "[executor@2] working");
    }
}

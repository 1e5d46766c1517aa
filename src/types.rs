//! Core identifier types for the mealgraph workflow engine.
//!
//! [`NodeKind`] names nodes in the workflow graph; [`ChannelType`] names the
//! state channels a merge policy can be registered for. Runtime execution
//! types (thread ids, checkpoint ids) live in [`crate::runtimes`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies a node within a workflow graph.
///
/// `Start` and `End` are virtual endpoints: `Start` anchors the single entry
/// edge and `End` is the terminal marker that stops a turn. Neither is ever
/// executed. All business nodes are `Custom` with a unique name.
///
/// # Persistence
///
/// `NodeKind` round-trips through [`encode`](Self::encode) /
/// [`decode`](Self::decode) for checkpoint storage.
///
/// ```
/// use mealgraph::types::NodeKind;
///
/// let router = NodeKind::Custom("router".to_string());
/// assert_eq!(router.encode(), "Custom:router");
/// assert_eq!(NodeKind::decode("Custom:router"), router);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    /// Virtual entry point; the single edge out of `Start` is the entry node.
    Start,
    /// Virtual terminal marker that completes a turn.
    End,
    /// Business node identified by a user-defined name.
    Custom(String),
}

impl NodeKind {
    /// Encode a NodeKind into its persisted string form.
    ///
    /// - `Start` → `"Start"`
    /// - `End` → `"End"`
    /// - `Custom("x")` → `"Custom:x"`
    #[must_use]
    pub fn encode(&self) -> String {
        match self {
            NodeKind::Start => "Start".to_string(),
            NodeKind::End => "End".to_string(),
            NodeKind::Custom(s) => format!("Custom:{s}"),
        }
    }

    /// Decode a persisted string form back into a NodeKind.
    ///
    /// Unknown formats fall back to `Custom(s)` for forward compatibility.
    pub fn decode(s: &str) -> Self {
        if s == "Start" {
            NodeKind::Start
        } else if s == "End" {
            NodeKind::End
        } else if let Some(rest) = s.strip_prefix("Custom:") {
            NodeKind::Custom(rest.to_string())
        } else {
            NodeKind::Custom(s.to_string())
        }
    }

    /// Returns `true` if this is the virtual [`Start`](Self::Start) node.
    #[must_use]
    pub fn is_start(&self) -> bool {
        matches!(self, Self::Start)
    }

    /// Returns `true` if this is the virtual [`End`](Self::End) node.
    #[must_use]
    pub fn is_end(&self) -> bool {
        matches!(self, Self::End)
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start => write!(f, "Start"),
            Self::End => write!(f, "End"),
            Self::Custom(name) => write!(f, "{}", name),
        }
    }
}

// Allow string literals where a NodeKind is expected.
impl From<&str> for NodeKind {
    fn from(s: &str) -> Self {
        match s {
            "Start" => NodeKind::Start,
            "End" => NodeKind::End,
            other => NodeKind::Custom(other.to_string()),
        }
    }
}

/// Identifies the category of a state channel for merge-policy registration.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChannelType {
    /// Conversation messages; append-merge with id dedup.
    Message,
    /// Declared named slots; last-write-wins overwrite.
    Slot,
    /// Diagnostic error events; append-only.
    Error,
}

impl fmt::Display for ChannelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Message => write!(f, "message"),
            Self::Slot => write!(f, "slot"),
            Self::Error => write!(f, "error"),
        }
    }
}

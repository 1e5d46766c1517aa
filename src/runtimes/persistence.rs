/*!
Persistence primitives for serializing/deserializing runtime state and
checkpoints (used by the SQLite checkpointer and any future persistent
backends).

Design goals:
- Explicit serde-friendly structs decoupled from internal in-memory
  representations.
- Conversion logic localized in From / TryFrom impls so checkpointer code
  stays lean and declarative.
- Forward compatibility: unknown NodeKind encodings round-trip as
  `NodeKind::Custom(encoded_string)`.

This module performs no I/O; it is pure data transformation.
*/

use chrono::Utc;
use miette::Diagnostic;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::{
    channels::{errors::ErrorEvent, Channel, ErrorsChannel, MessagesChannel, SlotsChannel},
    message::Message,
    runtimes::checkpointer::Checkpoint,
    state::VersionedState,
    types::NodeKind,
};

/// Channel that stores a vector collection with version metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(bound(serialize = "T: Serialize", deserialize = "T: Deserialize<'de>"))]
pub struct PersistedVecChannel<T> {
    pub version: u32,
    #[serde(default)]
    pub items: Vec<T>,
}

impl<T> Default for PersistedVecChannel<T> {
    fn default() -> Self {
        Self {
            version: 1,
            items: Vec::new(),
        }
    }
}

/// Channel that stores a map collection with version metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(bound(serialize = "V: Serialize", deserialize = "V: Deserialize<'de>"))]
pub struct PersistedMapChannel<V> {
    pub version: u32,
    #[serde(default)]
    pub map: FxHashMap<String, V>,
}

impl<V> Default for PersistedMapChannel<V> {
    fn default() -> Self {
        Self {
            version: 1,
            map: FxHashMap::default(),
        }
    }
}

/// Complete persisted shape of the in-memory VersionedState.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct PersistedState {
    pub messages: PersistedVecChannel<Message>,
    pub slots: PersistedMapChannel<Value>,
    #[serde(default)]
    pub errors: PersistedVecChannel<ErrorEvent>,
}

/// Full persisted checkpoint representation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PersistedCheckpoint {
    pub thread_id: String,
    pub checkpoint_id: String,
    #[serde(default)]
    pub parent_id: Option<String>,
    pub seq: u64,
    pub state: PersistedState,
    /// Pending nodes encoded with NodeKind::encode().
    #[serde(default)]
    pub next_nodes: Vec<String>,
    #[serde(default)]
    pub ran_node: Option<String>,
    /// RFC 3339 creation time (keeps chrono out of the serialized shape).
    pub created_at: String,
}

/// Conversion and serialization errors for persistence models.
#[derive(Debug, Error, Diagnostic)]
pub enum PersistenceError {
    #[error("missing field: {0}")]
    #[diagnostic(
        code(mealgraph::persistence::missing_field),
        help("Populate the field in the persisted JSON before conversion.")
    )]
    MissingField(&'static str),

    #[error("JSON serialization/deserialization failed: {source}")]
    #[diagnostic(
        code(mealgraph::persistence::serde),
        help("Ensure the JSON structure matches the Persisted* types.")
    )]
    Serde {
        #[source]
        source: serde_json::Error,
    },
}

pub type Result<T> = std::result::Result<T, PersistenceError>;

/* ---------- VersionedState <-> PersistedState ---------- */

impl From<&VersionedState> for PersistedState {
    fn from(s: &VersionedState) -> Self {
        PersistedState {
            messages: PersistedVecChannel {
                version: s.messages.version(),
                items: s.messages.snapshot(),
            },
            slots: PersistedMapChannel {
                version: s.slots.version(),
                map: s.slots.snapshot(),
            },
            errors: PersistedVecChannel {
                version: s.errors.version(),
                items: s.errors.snapshot(),
            },
        }
    }
}

impl From<PersistedState> for VersionedState {
    fn from(p: PersistedState) -> Self {
        VersionedState {
            messages: MessagesChannel::new(p.messages.items, p.messages.version),
            slots: SlotsChannel::new(p.slots.map, p.slots.version),
            errors: ErrorsChannel::new(p.errors.items, p.errors.version),
        }
    }
}

/* ---------- Checkpoint <-> PersistedCheckpoint ---------- */

impl From<&Checkpoint> for PersistedCheckpoint {
    fn from(cp: &Checkpoint) -> Self {
        PersistedCheckpoint {
            thread_id: cp.thread_id.clone(),
            checkpoint_id: cp.checkpoint_id.clone(),
            parent_id: cp.parent_id.clone(),
            seq: cp.seq,
            state: PersistedState::from(&cp.state),
            next_nodes: cp.next_nodes.iter().map(|k| k.encode()).collect(),
            ran_node: cp.ran_node.as_ref().map(|k| k.encode()),
            created_at: cp.created_at.to_rfc3339(),
        }
    }
}

impl From<PersistedCheckpoint> for Checkpoint {
    fn from(p: PersistedCheckpoint) -> Self {
        let created_at = chrono::DateTime::parse_from_rfc3339(&p.created_at)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());
        Checkpoint {
            thread_id: p.thread_id,
            checkpoint_id: p.checkpoint_id,
            parent_id: p.parent_id,
            seq: p.seq,
            state: VersionedState::from(p.state),
            next_nodes: p.next_nodes.iter().map(|s| NodeKind::decode(s)).collect(),
            ran_node: p.ran_node.as_deref().map(NodeKind::decode),
            created_at,
        }
    }
}

/* ---------- JSON string helpers ---------- */

/// Serialize a persistence model to a JSON string.
pub fn to_json_string<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|e| PersistenceError::Serde { source: e })
}

/// Deserialize a persistence model from a JSON string.
pub fn from_json_str<T: for<'de> Deserialize<'de>>(s: &str) -> Result<T> {
    serde_json::from_str(s).map_err(|e| PersistenceError::Serde { source: e })
}

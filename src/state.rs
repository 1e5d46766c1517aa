//! Versioned conversation state shared by every node in a turn.
//!
//! State is organized into three channels:
//! - **messages**: ordered conversation messages, append-merged with id dedup
//! - **slots**: the declared named channels of the schema (intent,
//!   food_order, pending_actions, ...), overwrite-merged
//! - **errors**: diagnostic error events, append-only
//!
//! Nodes never touch [`VersionedState`] directly; they receive an immutable
//! [`StateSnapshot`] and return a [`crate::node::NodePartial`] that the
//! reducer registry merges back in.
//!
//! # Examples
//!
//! ```rust
//! use mealgraph::state::VersionedState;
//! use mealgraph::schema::slots;
//! use serde_json::json;
//!
//! let state = VersionedState::builder()
//!     .with_user_message("Order lunch for 12 people")
//!     .with_slot(slots::SESSION_ID, json!("sess-1"))
//!     .build();
//!
//! let snapshot = state.snapshot();
//! assert_eq!(snapshot.messages.len(), 1);
//! assert_eq!(snapshot.slots.get(slots::SESSION_ID), Some(&json!("sess-1")));
//! ```

use rustc_hash::FxHashMap;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::{
    channels::{errors::ErrorEvent, Channel, ErrorsChannel, MessagesChannel, SlotsChannel},
    message::Message,
    orders::FoodOrderContext,
    schema::slots,
};

/// The mutable state container owned by the execution engine.
#[derive(Clone, Debug, PartialEq)]
pub struct VersionedState {
    /// Conversation messages.
    pub messages: MessagesChannel,
    /// Declared named slots.
    pub slots: SlotsChannel,
    /// Diagnostic error events.
    pub errors: ErrorsChannel,
}

/// Immutable point-in-time view passed to nodes and routing predicates.
#[derive(Clone, Debug, Default)]
pub struct StateSnapshot {
    pub messages: Vec<Message>,
    pub messages_version: u32,
    pub slots: FxHashMap<String, Value>,
    pub slots_version: u32,
    pub errors: Vec<ErrorEvent>,
    pub errors_version: u32,
}

impl StateSnapshot {
    /// Deserialize a slot into a typed value. `None` when the slot is absent
    /// or null; `None` as well when the stored shape does not match, so
    /// callers treat a corrupt slot like a missing one.
    pub fn slot<T: DeserializeOwned>(&self, name: &str) -> Option<T> {
        let value = self.slots.get(name)?;
        if value.is_null() {
            return None;
        }
        serde_json::from_value(value.clone()).ok()
    }

    /// The workflow context, if a food order is in progress.
    pub fn food_order(&self) -> Option<FoodOrderContext> {
        self.slot(slots::FOOD_ORDER)
    }

    /// The router's classified intent for this turn.
    pub fn intent(&self) -> Option<String> {
        self.slot(slots::INTENT)
    }

    /// The explicit step the user asked to jump to, if any.
    pub fn requested_step(&self) -> Option<crate::orders::WorkflowStep> {
        self.slot(slots::REQUESTED_STEP)
    }

    /// Actions awaiting external approval.
    pub fn pending_actions(&self) -> Vec<crate::orders::PendingAction> {
        self.slot(slots::PENDING_ACTIONS).unwrap_or_default()
    }

    /// Stored long-term user preferences.
    pub fn user_preferences(&self) -> Option<crate::orders::UserPreferences> {
        self.slot(slots::USER_PREFERENCES)
    }

    /// The most recent user message, if any.
    pub fn last_user_message(&self) -> Option<&Message> {
        self.messages.iter().rev().find(|m| m.has_role(Message::USER))
    }
}

impl VersionedState {
    /// Creates a new state initialized with a single user message.
    pub fn new_with_user_message(user_text: &str) -> Self {
        Self {
            messages: MessagesChannel::new(vec![Message::user(user_text)], 1),
            slots: SlotsChannel::default(),
            errors: ErrorsChannel::default(),
        }
    }

    /// Creates a builder for assembling state with messages and slots.
    pub fn builder() -> VersionedStateBuilder {
        VersionedStateBuilder::default()
    }

    /// Creates an immutable snapshot of the current state.
    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            messages: self.messages.snapshot(),
            messages_version: self.messages.version(),
            slots: self.slots.snapshot(),
            slots_version: self.slots.version(),
            errors: self.errors.snapshot(),
            errors_version: self.errors.version(),
        }
    }
}

impl Default for VersionedState {
    fn default() -> Self {
        Self {
            messages: MessagesChannel::default(),
            slots: SlotsChannel::default(),
            errors: ErrorsChannel::default(),
        }
    }
}

/// Fluent builder for [`VersionedState`].
#[derive(Debug, Default)]
pub struct VersionedStateBuilder {
    messages: Vec<Message>,
    slots: FxHashMap<String, Value>,
}

impl VersionedStateBuilder {
    pub fn with_user_message(mut self, content: &str) -> Self {
        self.messages.push(Message::user(content));
        self
    }

    pub fn with_assistant_message(mut self, content: &str) -> Self {
        self.messages.push(Message::assistant(content));
        self
    }

    pub fn with_message(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }

    pub fn with_slot(mut self, name: &str, value: Value) -> Self {
        self.slots.insert(name.to_string(), value);
        self
    }

    pub fn build(self) -> VersionedState {
        VersionedState {
            messages: MessagesChannel::new(self.messages, 1),
            slots: SlotsChannel::new(self.slots, 1),
            errors: ErrorsChannel::default(),
        }
    }
}

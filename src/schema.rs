//! The declared channel schema.
//!
//! Every named slot a node may write is declared here with exactly one merge
//! policy. The reducer registry consults this table before applying an
//! update; a key outside the table is a node bug and fails the turn with
//! [`SchemaError`] before anything is mutated or checkpointed.

use miette::Diagnostic;
use thiserror::Error;

/// Declared slot names.
///
/// Slots are overwrite-merged: nodes resubmit the full value each time.
pub mod slots {
    /// Router classification for the current turn.
    pub const INTENT: &str = "intent";
    /// Current plan text for multi-step tasks.
    pub const CURRENT_PLAN: &str = "current_plan";
    /// Actions awaiting external approval (full list each turn).
    pub const PENDING_ACTIONS: &str = "pending_actions";
    /// Whether the turn ended waiting on a human.
    pub const NEEDS_APPROVAL: &str = "needs_approval";
    /// The food-order workflow context.
    pub const FOOD_ORDER: &str = "food_order";
    /// Explicit step-jump request carried by the turn input.
    pub const REQUESTED_STEP: &str = "requested_step";
    /// Long-term user food preferences.
    pub const USER_PREFERENCES: &str = "user_preferences";
    /// Raw vendor search results cached for re-presentation.
    pub const CACHED_VENDOR_SEARCH: &str = "cached_vendor_search";
    /// Conversation session identifier.
    pub const SESSION_ID: &str = "session_id";
    /// User identifier for preference lookups.
    pub const USER_ID: &str = "user_id";
    /// Where the conversation originated (web, slack, calendar).
    pub const SOURCE_CHANNEL: &str = "source_channel";
    /// User's IANA timezone.
    pub const TIMEZONE: &str = "timezone";
}

/// All declared slot names, the single source of truth for schema checks.
pub const DECLARED_SLOTS: &[&str] = &[
    slots::INTENT,
    slots::CURRENT_PLAN,
    slots::PENDING_ACTIONS,
    slots::NEEDS_APPROVAL,
    slots::FOOD_ORDER,
    slots::REQUESTED_STEP,
    slots::USER_PREFERENCES,
    slots::CACHED_VENDOR_SEARCH,
    slots::SESSION_ID,
    slots::USER_ID,
    slots::SOURCE_CHANNEL,
    slots::TIMEZONE,
];

/// Returns `true` if `name` is a declared slot.
#[must_use]
pub fn is_declared_slot(name: &str) -> bool {
    DECLARED_SLOTS.contains(&name)
}

/// An update referenced a channel outside the declared schema.
///
/// Fatal for the turn: raised before any part of the update is applied, so
/// no checkpoint is written for the offending node.
#[derive(Debug, Error, Diagnostic)]
pub enum SchemaError {
    #[error("update references undeclared slot: {slot}")]
    #[diagnostic(
        code(mealgraph::schema::undeclared_slot),
        help("Declare the slot in the schema table or fix the node's update keys.")
    )]
    UndeclaredSlot { slot: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declared_slots_are_recognized() {
        for slot in DECLARED_SLOTS {
            assert!(is_declared_slot(slot));
        }
    }

    #[test]
    fn unknown_slot_is_rejected() {
        assert!(!is_declared_slot("poll_results"));
        assert!(!is_declared_slot(""));
    }
}

mod add_errors;
mod add_messages;
mod overwrite_slots;
mod reducer_registry;

pub use add_errors::AddErrors;
pub use add_messages::AddMessages;
pub use overwrite_slots::OverwriteSlots;
pub use reducer_registry::ReducerRegistry;

use crate::node::NodePartial;
use crate::state::VersionedState;

/// Unified reducer trait: every reducer mutates VersionedState using a
/// NodePartial delta. One reducer per channel policy:
/// messages (append with id dedup), slots (overwrite), errors (append).
///
/// Reducers are only invoked after the registry has validated the update
/// against the declared schema, so they can assume well-formed input.
pub trait Reducer: Send + Sync {
    fn apply(&self, state: &mut VersionedState, update: &NodePartial);
}

use super::Reducer;
use crate::{channels::Channel, node::NodePartial, state::VersionedState};

/// Append-only merge for the errors channel.
#[derive(Debug, PartialEq, Clone, Hash, Eq)]
pub struct AddErrors;

impl Reducer for AddErrors {
    fn apply(&self, state: &mut VersionedState, update: &NodePartial) {
        if let Some(incoming) = &update.errors {
            if incoming.is_empty() {
                return;
            }
            state.errors.get_mut().extend(incoming.iter().cloned());
            state.errors.bump_version();
        }
    }
}

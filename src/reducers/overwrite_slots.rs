use super::Reducer;
use crate::{channels::Channel, node::NodePartial, state::VersionedState};

/// Last-write-wins overwrite for declared slots.
///
/// Keys absent from the update are untouched; nodes resubmit the full value
/// for each slot they own rather than issuing partial edits.
#[derive(Debug, PartialEq, Clone, Hash, Eq)]
pub struct OverwriteSlots;

impl Reducer for OverwriteSlots {
    fn apply(&self, state: &mut VersionedState, update: &NodePartial) {
        if let Some(slot_update) = &update.slots {
            if slot_update.is_empty() {
                return;
            }
            let state_map = state.slots.get_mut();
            for (k, v) in slot_update.iter() {
                state_map.insert(k.clone(), v.clone());
            }
            state.slots.bump_version();
        }
    }
}

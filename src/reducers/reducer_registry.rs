use rustc_hash::FxHashMap;
use std::sync::Arc;

use crate::{
    node::NodePartial,
    reducers::{AddErrors, AddMessages, OverwriteSlots, Reducer},
    schema::{self, SchemaError},
    state::VersionedState,
    types::ChannelType,
};
use tracing::instrument;

/// Maps each channel to its merge-policy reducer and validates updates
/// against the declared schema before anything is applied.
#[derive(Clone)]
pub struct ReducerRegistry {
    reducer_map: FxHashMap<ChannelType, Arc<dyn Reducer>>,
}

/// Guard that checks whether a NodePartial actually carries data for the
/// given channel, letting the registry skip reducers with nothing to do.
fn channel_guard(channel: &ChannelType, partial: &NodePartial) -> bool {
    match channel {
        ChannelType::Message => partial
            .messages
            .as_ref()
            .map(|v| !v.is_empty())
            .unwrap_or(false),
        ChannelType::Slot => partial
            .slots
            .as_ref()
            .map(|m| !m.is_empty())
            .unwrap_or(false),
        ChannelType::Error => partial
            .errors
            .as_ref()
            .map(|v| !v.is_empty())
            .unwrap_or(false),
    }
}

impl Default for ReducerRegistry {
    fn default() -> Self {
        let mut reducer_map: FxHashMap<ChannelType, Arc<dyn Reducer>> = FxHashMap::default();
        reducer_map.insert(ChannelType::Message, Arc::new(AddMessages));
        reducer_map.insert(ChannelType::Slot, Arc::new(OverwriteSlots));
        reducer_map.insert(ChannelType::Error, Arc::new(AddErrors));
        Self { reducer_map }
    }
}

impl ReducerRegistry {
    /// Validate an update against the declared schema without applying it.
    ///
    /// Called before any mutation so a bad update aborts the turn with the
    /// state untouched and no checkpoint written.
    pub fn validate(&self, update: &NodePartial) -> Result<(), SchemaError> {
        if let Some(slot_update) = &update.slots {
            for key in slot_update.keys() {
                if !schema::is_declared_slot(key) {
                    return Err(SchemaError::UndeclaredSlot { slot: key.clone() });
                }
            }
        }
        Ok(())
    }

    /// Validate and apply one node's partial update, returning the names of
    /// the channels that changed.
    #[instrument(skip(self, state, update), err)]
    pub fn apply(
        &self,
        state: &mut VersionedState,
        update: &NodePartial,
    ) -> Result<Vec<&'static str>, SchemaError> {
        self.validate(update)?;

        let mut updated = Vec::new();
        for (channel, label) in [
            (ChannelType::Message, "messages"),
            (ChannelType::Slot, "slots"),
            (ChannelType::Error, "errors"),
        ] {
            if !channel_guard(&channel, update) {
                continue;
            }
            if let Some(reducer) = self.reducer_map.get(&channel) {
                reducer.apply(state, update);
                updated.push(label);
            }
        }
        Ok(updated)
    }
}

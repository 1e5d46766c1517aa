use rustc_hash::FxHashSet;

use super::Reducer;
use crate::{channels::Channel, node::NodePartial, state::VersionedState};

/// Append-merge for the messages channel.
///
/// Entries whose id is already present are skipped, so replaying an
/// already-applied update leaves the channel unchanged.
#[derive(Debug, PartialEq, Clone, Hash, Eq)]
pub struct AddMessages;

impl Reducer for AddMessages {
    fn apply(&self, state: &mut VersionedState, update: &NodePartial) {
        if let Some(incoming) = &update.messages {
            if incoming.is_empty() {
                return;
            }
            let existing = state.messages.get_mut();
            let seen: FxHashSet<String> = existing.iter().map(|m| m.id.clone()).collect();
            let mut appended = false;
            for message in incoming {
                if !seen.contains(&message.id) {
                    existing.push(message.clone());
                    appended = true;
                }
            }
            if appended {
                state.messages.bump_version();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Message;
    use crate::node::NodePartial;

    #[test]
    fn appends_new_messages() {
        let mut state = VersionedState::new_with_user_message("hi");
        let update = NodePartial::new().with_messages(vec![Message::assistant("hello")]);
        AddMessages.apply(&mut state, &update);
        assert_eq!(state.messages.snapshot().len(), 2);
        assert_eq!(state.messages.version(), 2);
    }

    #[test]
    fn replay_is_idempotent() {
        let mut state = VersionedState::new_with_user_message("hi");
        let update = NodePartial::new().with_messages(vec![Message::assistant("hello")]);
        AddMessages.apply(&mut state, &update);
        let after_first = state.messages.snapshot();
        let version_after_first = state.messages.version();

        AddMessages.apply(&mut state, &update);
        assert_eq!(state.messages.snapshot(), after_first);
        assert_eq!(state.messages.version(), version_after_first);
    }
}

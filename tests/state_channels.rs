use proptest::prelude::*;

use mealgraph::channels::Channel;
use mealgraph::message::Message;
use mealgraph::node::NodePartial;
use mealgraph::reducers::ReducerRegistry;
use mealgraph::schema::slots;
use mealgraph::state::VersionedState;
use mealgraph::utils::collections::new_slot_map;
use serde_json::json;

mod common;
use common::*;

#[test]
fn messages_dedup_by_id_on_replay() {
    let registry = ReducerRegistry::default();
    let mut state = state_with_user("hi");

    let update =
        NodePartial::new().with_messages(vec![Message::assistant("hello"), Message::assistant("!")]);
    registry.apply(&mut state, &update).unwrap();
    assert_eq!(state.messages.snapshot().len(), 3);

    // Replaying the identical update is a no-op.
    registry.apply(&mut state, &update).unwrap();
    assert_eq!(state.messages.snapshot().len(), 3);
}

#[test]
fn slot_overwrite_is_last_write_wins() {
    let registry = ReducerRegistry::default();
    let mut state = state_with_user("hi");

    let mut first = new_slot_map();
    first.insert(slots::INTENT.into(), json!("general"));
    registry
        .apply(&mut state, &NodePartial::new().with_slots(first))
        .unwrap();

    let mut second = new_slot_map();
    second.insert(slots::INTENT.into(), json!("food_order"));
    registry
        .apply(&mut state, &NodePartial::new().with_slots(second))
        .unwrap();

    assert_eq!(
        state.snapshot().intent().as_deref(),
        Some("food_order")
    );
}

proptest! {
    /// Applying the same partial twice equals applying it once, for every
    /// channel's merge policy.
    #[test]
    fn replay_is_idempotent(
        contents in proptest::collection::vec("[a-z]{1,12}", 0..5),
        slot_value in "[a-z]{0,12}",
    ) {
        let registry = ReducerRegistry::default();
        let messages: Vec<Message> =
            contents.iter().map(|c| Message::assistant(c)).collect();
        let mut slot_update = new_slot_map();
        slot_update.insert(slots::CURRENT_PLAN.to_string(), json!(slot_value));
        let update = NodePartial::new()
            .with_messages(messages)
            .with_slots(slot_update);

        let mut once = state_with_user("seed");
        registry.apply(&mut once, &update).unwrap();
        let after_once = once.snapshot();

        let mut twice = state_with_user("seed");
        registry.apply(&mut twice, &update).unwrap();
        registry.apply(&mut twice, &update).unwrap();
        let after_twice = twice.snapshot();

        // Seed message ids differ between the two states, so compare shape.
        prop_assert_eq!(after_once.messages.len(), after_twice.messages.len());
        prop_assert_eq!(
            after_once.messages.iter().map(|m| m.content.clone()).collect::<Vec<_>>(),
            after_twice.messages.iter().map(|m| m.content.clone()).collect::<Vec<_>>()
        );
        prop_assert_eq!(
            after_once.slots.get(slots::CURRENT_PLAN),
            after_twice.slots.get(slots::CURRENT_PLAN)
        );
    }
}

#[test]
fn snapshot_isolated_from_future_mutation() {
    let mut state = VersionedState::new_with_user_message("hi");
    let snap = state.snapshot();
    state.messages.get_mut().push(Message::assistant("later"));
    assert_eq!(snap.messages.len(), 1);
}

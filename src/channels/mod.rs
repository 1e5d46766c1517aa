//! Versioned channel containers backing [`crate::state::VersionedState`].
//!
//! Each channel owns its payload plus a version counter that is bumped when a
//! reducer changes the payload. Versions make change detection cheap for
//! checkpointing and for the per-turn update summaries on the event bus.

pub mod errors;

use rustc_hash::FxHashMap;
use serde_json::Value;

use crate::message::Message;
use errors::ErrorEvent;

/// Common behavior of a versioned state channel.
pub trait Channel {
    type Payload: Clone;

    /// Mutable access to the payload. Reducers use this; version bumps are
    /// the caller's responsibility via [`bump_version`](Self::bump_version).
    fn get_mut(&mut self) -> &mut Self::Payload;

    /// Cloned point-in-time copy of the payload.
    fn snapshot(&self) -> Self::Payload;

    /// Current version counter.
    fn version(&self) -> u32;

    /// Record that the payload changed.
    fn bump_version(&mut self);
}

macro_rules! versioned_channel {
    ($(#[$doc:meta])* $name:ident, $payload:ty) => {
        $(#[$doc])*
        #[derive(Clone, Debug, PartialEq)]
        pub struct $name {
            payload: $payload,
            version: u32,
        }

        impl $name {
            pub fn new(payload: $payload, version: u32) -> Self {
                Self { payload, version }
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new(<$payload>::default(), 1)
            }
        }

        impl Channel for $name {
            type Payload = $payload;

            fn get_mut(&mut self) -> &mut Self::Payload {
                &mut self.payload
            }

            fn snapshot(&self) -> Self::Payload {
                self.payload.clone()
            }

            fn version(&self) -> u32 {
                self.version
            }

            fn bump_version(&mut self) {
                self.version += 1;
            }
        }
    };
}

versioned_channel!(
    /// Ordered conversation messages; append-merged with id dedup.
    MessagesChannel,
    Vec<Message>
);

versioned_channel!(
    /// Declared named slots (intent, food_order, ...); overwrite-merged.
    SlotsChannel,
    FxHashMap<String, Value>
);

versioned_channel!(
    /// Diagnostic error events; append-only.
    ErrorsChannel,
    Vec<ErrorEvent>
);

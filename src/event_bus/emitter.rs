use std::fmt;
use thiserror::Error;

use super::event::Event;

/// Cloneable handle producers use to push events onto the bus.
///
/// Wraps the bus's flume sender; emission is synchronous and non-blocking.
#[derive(Clone)]
pub struct EventEmitter {
    sender: flume::Sender<Event>,
}

impl EventEmitter {
    pub(crate) fn new(sender: flume::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Emit an event. Fails only when the bus side has been dropped.
    pub fn emit(&self, event: Event) -> Result<(), EmitterError> {
        self.sender.send(event).map_err(|_| EmitterError::Closed)
    }
}

impl fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventEmitter").finish()
    }
}

/// Errors that can occur when emitting an event.
#[derive(Debug, Error)]
pub enum EmitterError {
    #[error("event bus closed")]
    Closed,
    #[error("event emission failed: {0}")]
    Other(String),
}

impl EmitterError {
    pub fn other(error: impl Into<String>) -> Self {
        Self::Other(error.into())
    }
}

//! Streaming event plumbing: events, sinks, and the bus that fans them out.
//!
//! Nodes emit events through an [`EventEmitter`] handle while they are still
//! running; the bus broadcasts each event to its sinks in arrival order.
//! Because node execution within a turn is sequential and the bus channel is
//! FIFO, events from one node appear in emission order and events across
//! nodes appear in node-execution order.

pub mod bus;
pub mod emitter;
pub mod event;
pub mod sink;

pub use bus::{EventBus, EventStream};
pub use emitter::{EmitterError, EventEmitter};
pub use event::{Event, NodeEvent, UpdateEvent, STREAM_END_SCOPE};
pub use sink::{ChannelSink, EventSink, MemorySink, StdOutSink};

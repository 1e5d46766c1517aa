//! # Mealgraph: Graph-driven Conversational Order Planning
//!
//! Mealgraph routes each turn of a conversation through a compiled graph of
//! processing nodes that share one versioned state record. Every state
//! transition is durably checkpointed, so a conversation can be resumed
//! after a crash, replayed from any prior point, or branched into an
//! alternate timeline without disturbing the original.
//!
//! ## Core Concepts
//!
//! - **Nodes**: async units of work that read a state snapshot and return a
//!   partial update
//! - **Channels**: named state fields, each with exactly one declared merge
//!   policy (append-with-dedup for messages, overwrite for slots)
//! - **Graph**: declarative node/edge definition with conditional routing,
//!   validated at compile time
//! - **Checkpoints**: a parent-linked chain per thread, persisted after
//!   every node transition
//! - **Tool orchestrator**: concurrent external calls with per-call
//!   timeouts and partial-failure tolerance
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mealgraph::agent::{build_agent_graph, AgentDeps};
//! use mealgraph::runtimes::{RuntimeConfig, TurnInput, TurnRunner};
//! use mealgraph::tools::ToolOrchestrator;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let app = build_agent_graph(AgentDeps::new(ToolOrchestrator::new()))?;
//! let runner = TurnRunner::new(app, RuntimeConfig::default()).await?;
//!
//! let outcome = runner
//!     .submit_turn("thread-1", TurnInput::message("Order lunch for 12 people"))
//!     .await?;
//! for entry in runner.history("thread-1", 20).await? {
//!     println!("{} -> {:?}", entry.checkpoint_id, entry.workflow_step);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Guide
//!
//! - [`message`] - Conversation messages with stable identity
//! - [`state`] - Versioned state container and snapshots
//! - [`schema`] - Declared channels and their merge policies
//! - [`reducers`] - Merge-policy implementations and the schema-checking registry
//! - [`node`] - Node trait and execution primitives
//! - [`graphs`] - Graph definition, conditional edges, compile-time validation
//! - [`app`] - The compiled graph
//! - [`runtimes`] - Turn engine, checkpoint stores, thread/branch management
//! - [`tools`] - Concurrent tool dispatch
//! - [`event_bus`] - Streaming events and sinks
//! - [`orders`] - Food-order domain model and its step machine
//! - [`agent`] - The concrete node set and graph wiring

pub mod agent;
pub mod app;
pub mod channels;
pub mod event_bus;
pub mod graphs;
pub mod message;
pub mod node;
pub mod orders;
pub mod reducers;
pub mod runtimes;
pub mod schema;
pub mod state;
pub mod telemetry;
pub mod tools;
pub mod types;
pub mod utils;

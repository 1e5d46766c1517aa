//! Runtime infrastructure: turn execution, checkpointing, and thread
//! management.
//!
//! # Architecture
//!
//! - **[`TurnRunner`]** — drives one turn through the graph and owns the
//!   time-travel surface (history, resume, branch, delete)
//! - **[`Checkpointer`]** — pluggable durable store for checkpoint chains
//! - **Persistence models** — serde-friendly shapes decoupled from the
//!   in-memory state
//!
//! # Backends
//!
//! - **[`InMemoryCheckpointer`]** — volatile, for tests and development
//! - **[`SqliteCheckpointer`]** — durable sqlx/SQLite storage (feature
//!   `sqlite`, on by default)
//!
//! # Usage
//!
//! ```rust,no_run
//! use mealgraph::runtimes::{RuntimeConfig, TurnInput, TurnRunner};
//! # use mealgraph::app::App;
//! # async fn example(app: App) -> Result<(), Box<dyn std::error::Error>> {
//! let runner = TurnRunner::new(app, RuntimeConfig::default()).await?;
//! let outcome = runner
//!     .submit_turn("thread-1", TurnInput::message("Order lunch for 12"))
//!     .await?;
//! println!("created {} checkpoints", outcome.checkpoints_created.len());
//! # Ok(())
//! # }
//! ```

pub mod checkpointer;
#[cfg(feature = "sqlite")]
pub mod checkpointer_sqlite;
pub mod persistence;
pub mod runner;
pub mod runtime_config;

pub use checkpointer::{Checkpoint, Checkpointer, CheckpointerError, InMemoryCheckpointer};
#[cfg(feature = "sqlite")]
pub use checkpointer_sqlite::SqliteCheckpointer;
pub use persistence::{PersistedCheckpoint, PersistedState, PersistenceError};
pub use runner::{HistoryEntry, RunnerError, TurnInput, TurnOutcome, TurnRunner};
pub use runtime_config::{CheckpointerType, EventBusConfig, RuntimeConfig, SinkConfig};

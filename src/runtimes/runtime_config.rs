//! Runtime configuration: persistence backend selection and event bus
//! wiring. Configuration is explicit — constructed once and passed into the
//! runner, never read from ambient globals mid-run.

use crate::event_bus::{EventBus, MemorySink, StdOutSink};

/// Which checkpoint store backs the runner.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CheckpointerType {
    /// Volatile in-process store (tests, development).
    InMemory,
    /// Durable SQLite store.
    #[cfg(feature = "sqlite")]
    Sqlite,
}

/// Configuration for a [`TurnRunner`](crate::runtimes::TurnRunner).
#[derive(Clone, Debug)]
pub struct RuntimeConfig {
    pub checkpointer: CheckpointerType,
    /// SQLite database file name; resolved from `MEALGRAPH_SQLITE_URL` /
    /// `SQLITE_DB_NAME` when not set explicitly.
    pub sqlite_db_name: Option<String>,
    pub event_bus: EventBusConfig,
    /// Safety valve: maximum node executions per turn before the engine
    /// aborts a runaway walk.
    pub max_steps_per_turn: u64,
    /// Attempts for a single checkpoint write before the turn fails closed.
    pub checkpoint_write_attempts: u32,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            checkpointer: CheckpointerType::InMemory,
            sqlite_db_name: Self::resolve_sqlite_db_name(None),
            event_bus: EventBusConfig::default(),
            max_steps_per_turn: 32,
            checkpoint_write_attempts: 3,
        }
    }
}

impl RuntimeConfig {
    fn resolve_sqlite_db_name(provided: Option<String>) -> Option<String> {
        if provided.is_some() {
            return provided;
        }
        dotenvy::dotenv().ok();
        Some(std::env::var("SQLITE_DB_NAME").unwrap_or_else(|_| "mealgraph.db".to_string()))
    }

    #[must_use]
    pub fn with_checkpointer(mut self, checkpointer: CheckpointerType) -> Self {
        self.checkpointer = checkpointer;
        self
    }

    #[must_use]
    pub fn with_sqlite_db_name(mut self, name: impl Into<String>) -> Self {
        self.sqlite_db_name = Self::resolve_sqlite_db_name(Some(name.into()));
        self
    }

    #[must_use]
    pub fn with_event_bus(mut self, event_bus: EventBusConfig) -> Self {
        self.event_bus = event_bus;
        self
    }

    #[must_use]
    pub fn with_max_steps_per_turn(mut self, max_steps: u64) -> Self {
        self.max_steps_per_turn = max_steps;
        self
    }
}

/// Which sinks the runner's event bus starts with.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SinkConfig {
    StdOut,
    Memory,
}

/// Event bus construction settings.
#[derive(Clone, Debug, Default)]
pub struct EventBusConfig {
    pub sinks: Vec<SinkConfig>,
}

impl EventBusConfig {
    #[must_use]
    pub fn with_stdout_only() -> Self {
        Self {
            sinks: vec![SinkConfig::StdOut],
        }
    }

    #[must_use]
    pub fn with_memory_sink() -> Self {
        Self {
            sinks: vec![SinkConfig::Memory],
        }
    }

    /// Build the bus described by this configuration.
    pub fn build_event_bus(&self) -> EventBus {
        let sinks: Vec<Box<dyn crate::event_bus::EventSink>> = self
            .sinks
            .iter()
            .map(|sink| match sink {
                SinkConfig::StdOut => {
                    Box::new(StdOutSink::default()) as Box<dyn crate::event_bus::EventSink>
                }
                SinkConfig::Memory => Box::new(MemorySink::new()),
            })
            .collect();
        EventBus::with_sinks(sinks)
    }
}

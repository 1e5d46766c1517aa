//! Turn execution engine and thread/branch management.
//!
//! [`TurnRunner`] drives one conversation turn at a time: load the thread's
//! latest checkpoint (or synthesize a genesis), merge the turn input, then
//! walk the graph node by node — run, merge, checkpoint, route — until the
//! terminal marker. Every transition is durable before the next node runs,
//! so a crash loses at most the node that was mid-flight, never a merged
//! update.
//!
//! The same runner exposes the time-travel surface built on the checkpoint
//! store: `history`, `resume`, `branch`, and `delete_thread`.

use std::sync::Arc;

use miette::Diagnostic;
use rustc_hash::FxHashMap;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::instrument;

use crate::app::App;
use crate::event_bus::{Event, EventBus, EventStream, STREAM_END_SCOPE};
use crate::graphs::RoutingError;
use crate::message::Message;
use crate::node::{NodeContext, NodeError, NodePartial};
use crate::orders::WorkflowStep;
use crate::runtimes::checkpointer::{
    Checkpoint, Checkpointer, CheckpointerError, InMemoryCheckpointer,
};
use crate::runtimes::runtime_config::{CheckpointerType, RuntimeConfig};
use crate::schema::{slots, SchemaError};
use crate::state::{StateSnapshot, VersionedState};
use crate::types::NodeKind;
use crate::utils::collections::new_slot_map;
use crate::utils::id_generator::IdGenerator;

/// Caller-supplied input for one turn.
#[derive(Clone, Debug, Default)]
pub struct TurnInput {
    /// New user message, if any.
    pub message: Option<String>,
    /// Explicit step-jump request.
    pub requested_step: Option<WorkflowStep>,
    /// Additional slot overrides (validated against the schema).
    pub slots: FxHashMap<String, Value>,
}

impl TurnInput {
    pub fn message(text: impl Into<String>) -> Self {
        Self {
            message: Some(text.into()),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_requested_step(mut self, step: WorkflowStep) -> Self {
        self.requested_step = Some(step);
        self
    }

    #[must_use]
    pub fn with_slot(mut self, name: &str, value: Value) -> Self {
        self.slots.insert(name.to_string(), value);
        self
    }

    /// Whether this input would change any state at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.message.is_none() && self.requested_step.is_none() && self.slots.is_empty()
    }

    fn into_partial(self) -> NodePartial {
        let mut partial = NodePartial::new();
        if let Some(text) = self.message {
            partial = partial.with_messages(vec![Message::user(&text)]);
        }
        let mut slot_update = self.slots;
        match self.requested_step {
            Some(step) => {
                slot_update.insert(slots::REQUESTED_STEP.to_string(), json!(step));
            }
            None => {
                // Clear any stale jump request from a previous turn.
                slot_update.insert(slots::REQUESTED_STEP.to_string(), Value::Null);
            }
        }
        partial.with_slots(slot_update)
    }
}

/// Result of a completed turn.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub thread_id: String,
    /// Final state after the terminal marker was reached.
    pub state: StateSnapshot,
    /// Ids of the checkpoints created by this turn, oldest first.
    pub checkpoints_created: Vec<String>,
}

/// One entry of a thread's checkpoint history, most recent first.
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub checkpoint_id: String,
    pub seq: u64,
    pub next_nodes: Vec<NodeKind>,
    pub ran_node: Option<NodeKind>,
    pub workflow_step: Option<WorkflowStep>,
    pub completed_steps: Vec<WorkflowStep>,
    pub vendor_selected: Option<String>,
    pub total: Option<f64>,
    pub intent: Option<String>,
    pub message_count: usize,
    pub has_pending_actions: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl HistoryEntry {
    fn from_checkpoint(cp: &Checkpoint) -> Self {
        let snapshot = cp.state.snapshot();
        let food_order = snapshot.food_order();
        Self {
            checkpoint_id: cp.checkpoint_id.clone(),
            seq: cp.seq,
            next_nodes: cp.next_nodes.clone(),
            ran_node: cp.ran_node.clone(),
            workflow_step: food_order.as_ref().map(|o| o.current_step),
            completed_steps: food_order
                .as_ref()
                .map(|o| o.completed_steps.clone())
                .unwrap_or_default(),
            vendor_selected: food_order
                .as_ref()
                .and_then(|o| o.selected_vendor.as_ref().map(|v| v.name.clone())),
            total: food_order.as_ref().and_then(|o| o.total),
            intent: snapshot.intent(),
            message_count: snapshot.messages.len(),
            has_pending_actions: !snapshot.pending_actions().is_empty(),
            created_at: cp.created_at,
        }
    }
}

/// Errors from turn execution and thread management.
#[derive(Debug, Error, Diagnostic)]
pub enum RunnerError {
    #[error("checkpoint {checkpoint_id} not found on thread {thread_id}")]
    #[diagnostic(code(mealgraph::runner::checkpoint_not_found))]
    CheckpointNotFound {
        thread_id: String,
        checkpoint_id: String,
    },

    #[error("graph routed to unregistered node {node}")]
    #[diagnostic(
        code(mealgraph::runner::missing_node),
        help("Compilation validates edges, so this indicates a corrupted checkpoint or a graph/store mismatch.")
    )]
    MissingNode { node: String },

    #[error("node {node} failed: {source}")]
    #[diagnostic(code(mealgraph::runner::node))]
    Node {
        node: String,
        #[source]
        source: NodeError,
    },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Routing(#[from] RoutingError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Checkpointer(#[from] CheckpointerError),

    #[error("turn exceeded {limit} steps on thread {thread_id}")]
    #[diagnostic(
        code(mealgraph::runner::step_limit),
        help("A routing loop is feeding the walk back into itself; inspect the conditional edges.")
    )]
    StepLimit { thread_id: String, limit: u64 },
}

/// Turn execution engine bound to one compiled graph and one store.
///
/// One logical execution per `(thread, turn)`: callers serialize turns on a
/// thread; different threads run fully in parallel against the same runner
/// because all shared state lives in the append-only checkpoint store.
pub struct TurnRunner {
    app: Arc<App>,
    checkpointer: Arc<dyn Checkpointer>,
    event_bus: EventBus,
    config: RuntimeConfig,
    ids: IdGenerator,
}

impl TurnRunner {
    /// Build a runner, constructing the checkpoint store described by the
    /// configuration.
    pub async fn new(app: App, config: RuntimeConfig) -> Result<Self, RunnerError> {
        let checkpointer = Self::create_checkpointer(&config).await?;
        Ok(Self::with_checkpointer(app, checkpointer, config))
    }

    /// Build a runner around an injected store (tests, custom backends).
    pub fn with_checkpointer(
        app: App,
        checkpointer: Arc<dyn Checkpointer>,
        config: RuntimeConfig,
    ) -> Self {
        let event_bus = config.event_bus.build_event_bus();
        event_bus.listen_for_events();
        Self {
            app: Arc::new(app),
            checkpointer,
            event_bus,
            config,
            ids: IdGenerator::new(),
        }
    }

    async fn create_checkpointer(
        config: &RuntimeConfig,
    ) -> Result<Arc<dyn Checkpointer>, RunnerError> {
        match &config.checkpointer {
            CheckpointerType::InMemory => Ok(Arc::new(InMemoryCheckpointer::new())),
            #[cfg(feature = "sqlite")]
            CheckpointerType::Sqlite => {
                let db_url = std::env::var("MEALGRAPH_SQLITE_URL")
                    .ok()
                    .or_else(|| {
                        config
                            .sqlite_db_name
                            .as_ref()
                            .map(|name| format!("sqlite://{name}"))
                    })
                    .unwrap_or_else(|| "sqlite://mealgraph.db".to_string());
                // Make sure the underlying file exists before sqlx connects.
                if let Some(path) = db_url.strip_prefix("sqlite://") {
                    let path = path.trim();
                    if !path.is_empty() {
                        let p = std::path::Path::new(path);
                        if let Some(parent) = p.parent() {
                            let _ = std::fs::create_dir_all(parent);
                        }
                        if !p.exists() {
                            let _ = std::fs::File::create_new(p);
                        }
                    }
                }
                let cp = crate::runtimes::SqliteCheckpointer::connect(&db_url).await?;
                Ok(Arc::new(cp))
            }
        }
    }

    /// Access the runner's event bus (to add sinks before a turn).
    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// Subscribe to the streaming events of subsequent turns.
    pub fn event_stream(&self) -> EventStream {
        self.event_bus.subscribe()
    }

    /// Execute one turn on `thread_id` as in the §4.3-style walk: load or
    /// synthesize state, merge the input, then run-merge-checkpoint-route
    /// until the terminal marker.
    #[instrument(skip(self, input), err)]
    pub async fn submit_turn(
        &self,
        thread_id: &str,
        input: TurnInput,
    ) -> Result<TurnOutcome, RunnerError> {
        let latest = self.checkpointer.latest(thread_id).await?;
        // A submitted turn always re-enters at the entry node.
        let (state, parent_id, base_seq) = match latest {
            Some(cp) => (cp.state.clone(), Some(cp.checkpoint_id.clone()), cp.seq),
            None => (self.genesis_state(thread_id), None, 0),
        };
        self.run_turn(thread_id, state, parent_id, base_seq, input, None)
            .await
    }

    /// Resume execution from an arbitrary checkpoint, advancing the same
    /// thread. With input, a fresh turn starts from the entry node; without,
    /// the walk continues from the checkpoint's pending nodes.
    #[instrument(skip(self, input), err)]
    pub async fn resume(
        &self,
        thread_id: &str,
        checkpoint_id: &str,
        input: Option<TurnInput>,
    ) -> Result<TurnOutcome, RunnerError> {
        let cp = self
            .checkpointer
            .get(thread_id, checkpoint_id)
            .await?
            .ok_or_else(|| RunnerError::CheckpointNotFound {
                thread_id: thread_id.to_string(),
                checkpoint_id: checkpoint_id.to_string(),
            })?;

        // New checkpoints must outrank the thread's current tip so they
        // become the active chain; the old tail stays stored.
        let tip_seq = self
            .checkpointer
            .latest(thread_id)
            .await?
            .map(|c| c.seq)
            .unwrap_or(cp.seq);

        let start = match &input {
            Some(_) => None,
            None => Some(cp.next_nodes.first().cloned().unwrap_or(NodeKind::End)),
        };
        self.run_turn(
            thread_id,
            cp.state.clone(),
            Some(cp.checkpoint_id.clone()),
            tip_seq,
            input.unwrap_or_default(),
            start,
        )
        .await
    }

    /// Fork a new thread whose genesis is a copy of the chosen checkpoint
    /// with `overrides` applied. The original thread is untouched.
    #[instrument(skip(self, overrides, input), err)]
    pub async fn branch(
        &self,
        thread_id: &str,
        checkpoint_id: &str,
        overrides: Option<FxHashMap<String, Value>>,
        input: Option<TurnInput>,
    ) -> Result<(String, TurnOutcome), RunnerError> {
        let cp = self
            .checkpointer
            .get(thread_id, checkpoint_id)
            .await?
            .ok_or_else(|| RunnerError::CheckpointNotFound {
                thread_id: thread_id.to_string(),
                checkpoint_id: checkpoint_id.to_string(),
            })?;

        let new_thread_id = self.ids.branch_thread_id(thread_id);
        let mut state = cp.state.clone();

        // Overrides travel the same path as node updates so an invalid key
        // fails before the branch thread exists.
        if let Some(overrides) = overrides {
            if !overrides.is_empty() {
                let partial = NodePartial::new().with_slots(overrides);
                self.app.apply_update(&mut state, &partial)?;
            }
        }

        let genesis = Checkpoint {
            thread_id: new_thread_id.clone(),
            checkpoint_id: self.ids.checkpoint_id(),
            parent_id: None,
            seq: 1,
            state: state.clone(),
            next_nodes: vec![self.app.entry_node()],
            ran_node: None,
            created_at: chrono::Utc::now(),
        };
        let genesis_id = genesis.checkpoint_id.clone();
        self.persist_with_retry(genesis).await?;

        let outcome = self
            .run_turn(
                &new_thread_id,
                state,
                Some(genesis_id.clone()),
                1,
                input.unwrap_or_default(),
                None,
            )
            .await?;

        let mut checkpoints = vec![genesis_id];
        checkpoints.extend(outcome.checkpoints_created);
        Ok((
            new_thread_id.clone(),
            TurnOutcome {
                thread_id: new_thread_id,
                state: outcome.state,
                checkpoints_created: checkpoints,
            },
        ))
    }

    /// A page of the thread's checkpoint history, most recent first.
    pub async fn history(
        &self,
        thread_id: &str,
        limit: usize,
    ) -> Result<Vec<HistoryEntry>, RunnerError> {
        let checkpoints = self.checkpointer.history(thread_id, limit, None).await?;
        Ok(checkpoints.iter().map(HistoryEntry::from_checkpoint).collect())
    }

    /// Scan history (paged) for the most recent checkpoint whose workflow
    /// step matches one of `steps` — "the checkpoint just before vendor
    /// search" style lookups.
    pub async fn find_checkpoint_at_step(
        &self,
        thread_id: &str,
        steps: &[WorkflowStep],
    ) -> Result<Option<HistoryEntry>, RunnerError> {
        const PAGE: usize = 50;
        let mut cursor = None;
        loop {
            let page = self.checkpointer.history(thread_id, PAGE, cursor).await?;
            if page.is_empty() {
                return Ok(None);
            }
            for cp in &page {
                let entry = HistoryEntry::from_checkpoint(cp);
                if let Some(step) = entry.workflow_step {
                    if steps.contains(&step) {
                        return Ok(Some(entry));
                    }
                }
            }
            cursor = page.last().map(|cp| cp.seq);
        }
    }

    /// Drop a thread and its whole checkpoint chain.
    pub async fn delete_thread(&self, thread_id: &str) -> Result<(), RunnerError> {
        Ok(self.checkpointer.delete_thread(thread_id).await?)
    }

    /// Ids of all known threads.
    pub async fn list_threads(&self) -> Result<Vec<String>, RunnerError> {
        Ok(self.checkpointer.list_threads().await?)
    }

    fn genesis_state(&self, thread_id: &str) -> VersionedState {
        let mut slots_map = new_slot_map();
        slots_map.insert(slots::SESSION_ID.to_string(), json!(thread_id));
        VersionedState {
            slots: crate::channels::SlotsChannel::new(slots_map, 1),
            ..Default::default()
        }
    }

    /// The walk: merge input (if any), checkpoint the starting point, then
    /// run-merge-checkpoint-route until End. `start_override` skips the
    /// entry node (resume-without-input continues from pending nodes).
    async fn run_turn(
        &self,
        thread_id: &str,
        mut state: VersionedState,
        mut parent_id: Option<String>,
        base_seq: u64,
        input: TurnInput,
        start_override: Option<NodeKind>,
    ) -> Result<TurnOutcome, RunnerError> {
        let emitter = self.event_bus.get_emitter();
        let mut seq = base_seq;
        let mut created: Vec<String> = Vec::new();

        let mut active = start_override.unwrap_or_else(|| self.app.entry_node());

        if !input.is_empty() {
            // Schema violations abort here, before any checkpoint exists.
            let partial = input.into_partial();
            self.app.apply_update(&mut state, &partial)?;

            seq += 1;
            let turn_start = Checkpoint {
                thread_id: thread_id.to_string(),
                checkpoint_id: self.ids.checkpoint_id(),
                parent_id: parent_id.clone(),
                seq,
                state: state.clone(),
                next_nodes: vec![active.clone()],
                ran_node: None,
                created_at: chrono::Utc::now(),
            };
            parent_id = Some(turn_start.checkpoint_id.clone());
            created.push(turn_start.checkpoint_id.clone());
            self.persist_with_retry(turn_start).await?;
        }

        let _ = emitter.emit(Event::diagnostic(
            "turn",
            format!("thread={thread_id} entry={active}"),
        ));

        let mut step: u64 = 0;
        let result = loop {
            if active == NodeKind::End {
                break Ok(());
            }
            step += 1;
            if step > self.config.max_steps_per_turn {
                break Err(RunnerError::StepLimit {
                    thread_id: thread_id.to_string(),
                    limit: self.config.max_steps_per_turn,
                });
            }

            let Some(node) = self.app.node(&active) else {
                break Err(RunnerError::MissingNode {
                    node: active.encode(),
                });
            };

            let ctx = NodeContext {
                node_id: active.to_string(),
                step,
                emitter: emitter.clone(),
            };

            tracing::debug!(thread = %thread_id, node = %active, step, "running node");
            let partial = match node.run(state.snapshot(), ctx).await {
                Ok(partial) => partial,
                Err(source) => {
                    break Err(RunnerError::Node {
                        node: active.encode(),
                        source,
                    });
                }
            };

            // Merge is atomic over an owned state: either the whole update
            // lands and is checkpointed below, or the turn aborts with the
            // previous checkpoint still the durable tip.
            let updated_channels = self.app.apply_update(&mut state, &partial)?;
            let _ = emitter.emit(Event::update(
                active.to_string(),
                step,
                updated_channels.iter().map(|s| s.to_string()).collect(),
            ));

            // Routing is a pure function of the merged snapshot, so
            // evaluating it now and recording the result is equivalent to
            // re-deriving it on resume.
            let next = self.app.route(&active, &state.snapshot())?;

            seq += 1;
            let checkpoint = Checkpoint {
                thread_id: thread_id.to_string(),
                checkpoint_id: self.ids.checkpoint_id(),
                parent_id: parent_id.clone(),
                seq,
                state: state.clone(),
                next_nodes: vec![next.clone()],
                ran_node: Some(active.clone()),
                created_at: chrono::Utc::now(),
            };
            parent_id = Some(checkpoint.checkpoint_id.clone());
            created.push(checkpoint.checkpoint_id.clone());
            self.persist_with_retry(checkpoint).await?;

            active = next;
        };

        match result {
            Ok(()) => {
                let _ = emitter.emit(Event::diagnostic(
                    STREAM_END_SCOPE,
                    format!("thread={thread_id} status=completed steps={step}"),
                ));
                Ok(TurnOutcome {
                    thread_id: thread_id.to_string(),
                    state: state.snapshot(),
                    checkpoints_created: created,
                })
            }
            Err(err) => {
                let _ = emitter.emit(Event::diagnostic(
                    STREAM_END_SCOPE,
                    format!("thread={thread_id} status=error step={step} error={err}"),
                ));
                Err(err)
            }
        }
    }

    /// Retry a checkpoint write with the same checkpoint id. If the store
    /// stays unavailable the turn fails closed — no unpersisted progress is
    /// ever reported as success.
    async fn persist_with_retry(&self, checkpoint: Checkpoint) -> Result<(), RunnerError> {
        let attempts = self.config.checkpoint_write_attempts.max(1);
        let mut last_err = None;
        for attempt in 1..=attempts {
            match self.checkpointer.put(checkpoint.clone()).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    tracing::warn!(
                        checkpoint = %checkpoint.checkpoint_id,
                        attempt,
                        error = %e,
                        "checkpoint write failed"
                    );
                    last_err = Some(e);
                    if attempt < attempts {
                        tokio::time::sleep(std::time::Duration::from_millis(10 * attempt as u64))
                            .await;
                    }
                }
            }
        }
        Err(RunnerError::Checkpointer(last_err.expect("at least one attempt")))
    }
}

impl std::fmt::Debug for TurnRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TurnRunner")
            .field("app", &self.app)
            .field("config", &self.config)
            .finish()
    }
}

//! Checkpoint model and the pluggable persistence boundary.
//!
//! A checkpoint is an immutable snapshot of a thread's state linked to its
//! parent, forming a chain per thread (a tree once resume/branch are used).
//! `seq` is a per-thread monotonic counter giving checkpoints a total order;
//! new ids are never reused, so stores need no locking beyond an atomic put.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use miette::Diagnostic;
use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::state::VersionedState;
use crate::types::NodeKind;

/// One durable state transition.
#[derive(Debug, Clone)]
pub struct Checkpoint {
    /// Owning conversation thread.
    pub thread_id: String,
    /// Unique id of this checkpoint.
    pub checkpoint_id: String,
    /// Parent checkpoint, `None` for a thread's genesis.
    pub parent_id: Option<String>,
    /// Per-thread total order; strictly increasing along the active chain.
    pub seq: u64,
    /// The full state after this transition.
    pub state: VersionedState,
    /// Nodes still pending when this checkpoint was taken (the walk's next
    /// frontier; empty or `[End]` at turn completion).
    pub next_nodes: Vec<NodeKind>,
    /// The node whose update produced this snapshot; `None` for genesis and
    /// turn-input checkpoints.
    pub ran_node: Option<NodeKind>,
    pub created_at: DateTime<Utc>,
}

/// Errors surfaced by checkpoint stores.
#[derive(Debug, Error, Diagnostic)]
pub enum CheckpointerError {
    #[error("checkpoint backend error: {message}")]
    #[diagnostic(code(mealgraph::checkpointer::backend))]
    Backend { message: String },

    #[error("checkpoint serialization error: {message}")]
    #[diagnostic(code(mealgraph::checkpointer::serde))]
    Serde { message: String },

    #[error("checkpointer error: {message}")]
    #[diagnostic(code(mealgraph::checkpointer::other))]
    Other { message: String },
}

pub type Result<T> = std::result::Result<T, CheckpointerError>;

/// Durable, keyed persistence of checkpoints.
///
/// `put` must be idempotent for the same `(thread_id, checkpoint_id)` so the
/// runner can retry a failed write with the same id. `history` must not
/// require materializing the whole chain: callers page through it with
/// `limit` and the `before_seq` cursor.
#[async_trait]
pub trait Checkpointer: Send + Sync {
    /// Persist a checkpoint (idempotent per checkpoint id).
    async fn put(&self, checkpoint: Checkpoint) -> Result<()>;

    /// The checkpoint with the highest seq for a thread, if any.
    async fn latest(&self, thread_id: &str) -> Result<Option<Checkpoint>>;

    /// Fetch one checkpoint by id.
    async fn get(&self, thread_id: &str, checkpoint_id: &str) -> Result<Option<Checkpoint>>;

    /// Page of checkpoints most-recent-first. `before_seq` restarts the
    /// listing strictly below a previous page's last seq.
    async fn history(
        &self,
        thread_id: &str,
        limit: usize,
        before_seq: Option<u64>,
    ) -> Result<Vec<Checkpoint>>;

    /// Remove a thread and its whole chain.
    async fn delete_thread(&self, thread_id: &str) -> Result<()>;

    /// Ids of all known threads.
    async fn list_threads(&self) -> Result<Vec<String>>;
}

/// Volatile store for tests and development.
#[derive(Default)]
pub struct InMemoryCheckpointer {
    threads: Mutex<FxHashMap<String, Vec<Checkpoint>>>,
}

impl InMemoryCheckpointer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl std::fmt::Debug for InMemoryCheckpointer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryCheckpointer").finish()
    }
}

#[async_trait]
impl Checkpointer for InMemoryCheckpointer {
    async fn put(&self, checkpoint: Checkpoint) -> Result<()> {
        let mut threads = self.threads.lock().expect("checkpointer poisoned");
        let chain = threads.entry(checkpoint.thread_id.clone()).or_default();
        if let Some(existing) = chain
            .iter_mut()
            .find(|c| c.checkpoint_id == checkpoint.checkpoint_id)
        {
            *existing = checkpoint;
        } else {
            chain.push(checkpoint);
            chain.sort_by_key(|c| c.seq);
        }
        Ok(())
    }

    async fn latest(&self, thread_id: &str) -> Result<Option<Checkpoint>> {
        let threads = self.threads.lock().expect("checkpointer poisoned");
        Ok(threads
            .get(thread_id)
            .and_then(|chain| chain.last().cloned()))
    }

    async fn get(&self, thread_id: &str, checkpoint_id: &str) -> Result<Option<Checkpoint>> {
        let threads = self.threads.lock().expect("checkpointer poisoned");
        Ok(threads.get(thread_id).and_then(|chain| {
            chain
                .iter()
                .find(|c| c.checkpoint_id == checkpoint_id)
                .cloned()
        }))
    }

    async fn history(
        &self,
        thread_id: &str,
        limit: usize,
        before_seq: Option<u64>,
    ) -> Result<Vec<Checkpoint>> {
        let threads = self.threads.lock().expect("checkpointer poisoned");
        let Some(chain) = threads.get(thread_id) else {
            return Ok(Vec::new());
        };
        Ok(chain
            .iter()
            .rev()
            .filter(|c| before_seq.is_none_or(|cursor| c.seq < cursor))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn delete_thread(&self, thread_id: &str) -> Result<()> {
        let mut threads = self.threads.lock().expect("checkpointer poisoned");
        threads.remove(thread_id);
        Ok(())
    }

    async fn list_threads(&self) -> Result<Vec<String>> {
        let threads = self.threads.lock().expect("checkpointer poisoned");
        Ok(threads.keys().cloned().collect())
    }
}

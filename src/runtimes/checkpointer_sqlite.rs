/*!
SQLite Checkpointer

Durable implementation of the `Checkpointer` trait over sqlx/SQLite.

## Behavior

- Uses serde-based persistence models (see `runtimes::persistence`) for
  encoding state, next nodes, and the ran node.
- `INSERT OR REPLACE` keyed on `(thread_id, checkpoint_id)` makes re-saving
  the same checkpoint id idempotent, which the runner's write-retry relies
  on.
- With the `sqlite-migrations` feature (default), embedded migrations run on
  connect; without it, external migration orchestration is assumed.

## Schema

- `threads(id, created_at)` — one row per conversation thread
- `checkpoints(thread_id, checkpoint_id, parent_id, seq, state_json,
  next_nodes_json, ran_node, created_at)` — one row per transition;
  `(thread_id, checkpoint_id)` is the primary key and `(thread_id, seq)` is
  indexed for latest/history queries
*/

use std::sync::Arc;

use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use tracing::instrument;

use crate::runtimes::checkpointer::{Checkpoint, Checkpointer, CheckpointerError, Result};
use crate::runtimes::persistence::{
    from_json_str, to_json_string, PersistedCheckpoint, PersistedState,
};
use crate::types::NodeKind;

/// SQLite-backed checkpointer.
///
/// Storage grows with `threads × checkpoints_per_thread × state_size`;
/// long-running deployments should delete finished threads
/// (`delete_thread`) or prune old rows by `created_at`.
pub struct SqliteCheckpointer {
    pool: Arc<SqlitePool>,
}

impl std::fmt::Debug for SqliteCheckpointer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteCheckpointer").finish()
    }
}

impl SqliteCheckpointer {
    /// Connect (or create) a SQLite database at `database_url`, e.g.
    /// `"sqlite://mealgraph.db"`.
    #[must_use = "checkpointer must be used to persist state"]
    #[instrument(skip(database_url))]
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = SqlitePool::connect(database_url)
            .await
            .map_err(|e| CheckpointerError::Backend {
                message: format!("connect error: {e}"),
            })?;
        #[cfg(feature = "sqlite-migrations")]
        {
            if let Err(e) = sqlx::migrate!("./migrations").run(&pool).await {
                return Err(CheckpointerError::Backend {
                    message: format!("migration failure: {e}"),
                });
            }
        }
        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    fn row_to_checkpoint(row: &SqliteRow) -> Result<Checkpoint> {
        let thread_id: String = row.get("thread_id");
        let checkpoint_id: String = row.get("checkpoint_id");
        let parent_id: Option<String> = row.get("parent_id");
        let seq: i64 = row.get("seq");
        let state_json: String = row.get("state_json");
        let next_nodes_json: String = row.get("next_nodes_json");
        let ran_node: Option<String> = row.get("ran_node");
        let created_at: String = row.get("created_at");

        let persisted = PersistedCheckpoint {
            thread_id,
            checkpoint_id,
            parent_id,
            seq: seq as u64,
            state: from_json_str::<PersistedState>(&state_json).map_err(|e| {
                CheckpointerError::Serde {
                    message: format!("state decode: {e}"),
                }
            })?,
            next_nodes: from_json_str::<Vec<String>>(&next_nodes_json).map_err(|e| {
                CheckpointerError::Serde {
                    message: format!("next_nodes decode: {e}"),
                }
            })?,
            ran_node,
            created_at,
        };
        Ok(Checkpoint::from(persisted))
    }
}

#[async_trait::async_trait]
impl Checkpointer for SqliteCheckpointer {
    #[instrument(skip(self, checkpoint), err)]
    async fn put(&self, checkpoint: Checkpoint) -> Result<()> {
        let state_json = to_json_string(&PersistedState::from(&checkpoint.state)).map_err(|e| {
            CheckpointerError::Serde {
                message: format!("state encode: {e}"),
            }
        })?;
        let next_nodes_enc: Vec<String> =
            checkpoint.next_nodes.iter().map(NodeKind::encode).collect();
        let next_nodes_json =
            to_json_string(&next_nodes_enc).map_err(|e| CheckpointerError::Serde {
                message: format!("next_nodes encode: {e}"),
            })?;
        let ran_node = checkpoint.ran_node.as_ref().map(NodeKind::encode);

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| CheckpointerError::Backend {
                message: format!("tx begin: {e}"),
            })?;

        sqlx::query("INSERT OR IGNORE INTO threads (id) VALUES (?1)")
            .bind(&checkpoint.thread_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| CheckpointerError::Backend {
                message: format!("insert thread: {e}"),
            })?;

        // OR REPLACE keeps retries with the same checkpoint id idempotent.
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO checkpoints (
                thread_id,
                checkpoint_id,
                parent_id,
                seq,
                state_json,
                next_nodes_json,
                ran_node,
                created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
        )
        .bind(&checkpoint.thread_id)
        .bind(&checkpoint.checkpoint_id)
        .bind(&checkpoint.parent_id)
        .bind(checkpoint.seq as i64)
        .bind(&state_json)
        .bind(&next_nodes_json)
        .bind(&ran_node)
        .bind(checkpoint.created_at.to_rfc3339())
        .execute(&mut *tx)
        .await
        .map_err(|e| CheckpointerError::Backend {
            message: format!("insert checkpoint: {e}"),
        })?;

        tx.commit().await.map_err(|e| CheckpointerError::Backend {
            message: format!("tx commit: {e}"),
        })
    }

    #[instrument(skip(self), err)]
    async fn latest(&self, thread_id: &str) -> Result<Option<Checkpoint>> {
        let row = sqlx::query(
            r#"
            SELECT thread_id, checkpoint_id, parent_id, seq, state_json,
                   next_nodes_json, ran_node, created_at
            FROM checkpoints
            WHERE thread_id = ?1
            ORDER BY seq DESC
            LIMIT 1
            "#,
        )
        .bind(thread_id)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| CheckpointerError::Backend {
            message: format!("select latest: {e}"),
        })?;

        row.as_ref().map(Self::row_to_checkpoint).transpose()
    }

    #[instrument(skip(self), err)]
    async fn get(&self, thread_id: &str, checkpoint_id: &str) -> Result<Option<Checkpoint>> {
        let row = sqlx::query(
            r#"
            SELECT thread_id, checkpoint_id, parent_id, seq, state_json,
                   next_nodes_json, ran_node, created_at
            FROM checkpoints
            WHERE thread_id = ?1 AND checkpoint_id = ?2
            "#,
        )
        .bind(thread_id)
        .bind(checkpoint_id)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| CheckpointerError::Backend {
            message: format!("select checkpoint: {e}"),
        })?;

        row.as_ref().map(Self::row_to_checkpoint).transpose()
    }

    #[instrument(skip(self), err)]
    async fn history(
        &self,
        thread_id: &str,
        limit: usize,
        before_seq: Option<u64>,
    ) -> Result<Vec<Checkpoint>> {
        let limit = limit.min(1000) as i64;
        let rows = match before_seq {
            Some(cursor) => {
                sqlx::query(
                    r#"
                    SELECT thread_id, checkpoint_id, parent_id, seq, state_json,
                           next_nodes_json, ran_node, created_at
                    FROM checkpoints
                    WHERE thread_id = ?1 AND seq < ?2
                    ORDER BY seq DESC
                    LIMIT ?3
                    "#,
                )
                .bind(thread_id)
                .bind(cursor as i64)
                .bind(limit)
                .fetch_all(&*self.pool)
                .await
            }
            None => {
                sqlx::query(
                    r#"
                    SELECT thread_id, checkpoint_id, parent_id, seq, state_json,
                           next_nodes_json, ran_node, created_at
                    FROM checkpoints
                    WHERE thread_id = ?1
                    ORDER BY seq DESC
                    LIMIT ?2
                    "#,
                )
                .bind(thread_id)
                .bind(limit)
                .fetch_all(&*self.pool)
                .await
            }
        }
        .map_err(|e| CheckpointerError::Backend {
            message: format!("select history: {e}"),
        })?;

        rows.iter().map(Self::row_to_checkpoint).collect()
    }

    #[instrument(skip(self), err)]
    async fn delete_thread(&self, thread_id: &str) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| CheckpointerError::Backend {
                message: format!("tx begin: {e}"),
            })?;

        sqlx::query("DELETE FROM checkpoints WHERE thread_id = ?1")
            .bind(thread_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| CheckpointerError::Backend {
                message: format!("delete checkpoints: {e}"),
            })?;
        sqlx::query("DELETE FROM threads WHERE id = ?1")
            .bind(thread_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| CheckpointerError::Backend {
                message: format!("delete thread: {e}"),
            })?;

        tx.commit().await.map_err(|e| CheckpointerError::Backend {
            message: format!("tx commit: {e}"),
        })
    }

    #[instrument(skip(self), err)]
    async fn list_threads(&self) -> Result<Vec<String>> {
        let rows = sqlx::query("SELECT id FROM threads ORDER BY created_at DESC")
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| CheckpointerError::Backend {
                message: format!("list threads: {e}"),
            })?;
        Ok(rows.into_iter().map(|r| r.get::<String, _>("id")).collect())
    }
}

//! Durable checkpoint storage backed by SQLite
//!
//! Each checkpoint is one row in the `checkpoints` table, keyed by
//! `(thread_id, checkpoint_id)` with `UNIQUE (thread_id, step)` backing the
//! "latest by thread" lookup. The schema ships as an embedded migration and is
//! applied by [`SqliteCheckpointSaver::connect`].
//!
//! Appends read the latest row and insert the new one inside a single
//! transaction. If two writers race on the same thread, the loser either
//! observes a different parent or trips the unique step constraint; both are
//! reported as [`CheckpointError::Conflict`].

use crate::{
    checkpoint::{Checkpoint, CheckpointConfig, CheckpointMetadata, CheckpointTuple},
    error::{CheckpointError, Result},
    traits::{CheckpointSaver, CheckpointStream},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_MAX_CONNECTIONS: u32 = 5;

#[derive(Debug, sqlx::FromRow)]
struct CheckpointRow {
    thread_id: String,
    checkpoint_id: String,
    parent_checkpoint_id: Option<String>,
    step: i64,
    state: String,
    metadata: String,
    created_at: String,
}

impl CheckpointRow {
    fn into_tuple(self) -> Result<CheckpointTuple> {
        let ts = DateTime::parse_from_rfc3339(&self.created_at)
            .map_err(|e| CheckpointError::Storage(format!("bad created_at '{}': {}", self.created_at, e)))?
            .with_timezone(&Utc);

        let mut metadata: CheckpointMetadata = serde_json::from_str(&self.metadata)?;
        metadata.step = Some(self.step as u64);

        let checkpoint = Checkpoint {
            v: Checkpoint::CURRENT_VERSION,
            id: self.checkpoint_id.clone(),
            ts,
            state: serde_json::from_str(&self.state)?,
        };

        Ok(CheckpointTuple {
            config: CheckpointConfig::for_thread(&self.thread_id)
                .with_checkpoint_id(self.checkpoint_id),
            checkpoint,
            metadata,
            parent_config: self
                .parent_checkpoint_id
                .map(|id| CheckpointConfig::for_thread(&self.thread_id).with_checkpoint_id(id)),
        })
    }
}

/// [`CheckpointSaver`] persisting to a SQLite database through `sqlx`
#[derive(Debug, Clone)]
pub struct SqliteCheckpointSaver {
    pool: SqlitePool,
}

impl SqliteCheckpointSaver {
    /// Open (creating if missing) the database at `database_url` and apply migrations
    ///
    /// `sqlite::memory:` is accepted for tests; the pool is then pinned to one
    /// long-lived connection so every query sees the same database.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);

        let pool = if database_url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None::<Duration>)
                .max_lifetime(None::<Duration>)
                .connect_with(options)
                .await?
        } else {
            SqlitePoolOptions::new()
                .max_connections(DEFAULT_MAX_CONNECTIONS)
                .connect_with(options)
                .await?
        };

        let saver = Self { pool };
        saver.migrate().await?;
        tracing::info!(url = %database_url, "SQLite checkpoint store ready");
        Ok(saver)
    }

    /// Wrap an existing pool; call [`migrate`](Self::migrate) before use
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Run `SELECT 1` against the pool
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await?;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn step_of(&self, thread_id: &str, checkpoint_id: &str) -> Result<Option<i64>> {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT step FROM checkpoints WHERE thread_id = ? AND checkpoint_id = ?")
                .bind(thread_id)
                .bind(checkpoint_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|r| r.0))
    }
}

#[async_trait]
impl CheckpointSaver for SqliteCheckpointSaver {
    async fn get_tuple(&self, config: &CheckpointConfig) -> Result<Option<CheckpointTuple>> {
        let thread_id = config.require_thread_id()?;

        let row = match &config.checkpoint_id {
            Some(checkpoint_id) => {
                sqlx::query_as::<_, CheckpointRow>(
                    "SELECT * FROM checkpoints WHERE thread_id = ? AND checkpoint_id = ?",
                )
                .bind(thread_id)
                .bind(checkpoint_id)
                .fetch_optional(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, CheckpointRow>(
                    "SELECT * FROM checkpoints WHERE thread_id = ? ORDER BY step DESC LIMIT 1",
                )
                .bind(thread_id)
                .fetch_optional(&self.pool)
                .await?
            }
        };

        row.map(CheckpointRow::into_tuple).transpose()
    }

    async fn list(
        &self,
        config: &CheckpointConfig,
        before: Option<&CheckpointConfig>,
        limit: Option<usize>,
    ) -> Result<CheckpointStream> {
        let thread_id = config.require_thread_id()?;

        let upper = match before.and_then(|b| b.checkpoint_id.as_deref()) {
            Some(before_id) => self.step_of(thread_id, before_id).await?.unwrap_or(i64::MAX),
            None => i64::MAX,
        };
        // SQLite treats a negative LIMIT as unbounded.
        let limit = limit.map(|l| l as i64).unwrap_or(-1);

        let rows = sqlx::query_as::<_, CheckpointRow>(
            "SELECT * FROM checkpoints WHERE thread_id = ? AND step < ? ORDER BY step DESC LIMIT ?",
        )
        .bind(thread_id)
        .bind(upper)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        let results: Vec<Result<CheckpointTuple>> =
            rows.into_iter().map(CheckpointRow::into_tuple).collect();
        Ok(Box::pin(stream::iter(results)))
    }

    async fn put(
        &self,
        config: &CheckpointConfig,
        checkpoint: Checkpoint,
        metadata: CheckpointMetadata,
    ) -> Result<CheckpointConfig> {
        let thread_id = config.require_thread_id()?.to_string();
        let mut tx = self.pool.begin().await?;

        let latest: Option<(String, i64)> = sqlx::query_as(
            "SELECT checkpoint_id, step FROM checkpoints WHERE thread_id = ? ORDER BY step DESC LIMIT 1",
        )
        .bind(&thread_id)
        .fetch_optional(&mut *tx)
        .await?;

        let latest_id = latest.as_ref().map(|(id, _)| id.clone());
        if latest_id != config.checkpoint_id {
            return Err(CheckpointError::Conflict {
                thread_id,
                expected: config.checkpoint_id.clone(),
                actual: latest_id,
            });
        }

        let step = latest.map(|(_, step)| step + 1).unwrap_or(0);
        let metadata = CheckpointMetadata {
            step: Some(step as u64),
            ..metadata
        };

        let inserted = sqlx::query(
            "INSERT INTO checkpoints (thread_id, checkpoint_id, parent_checkpoint_id, step, state, metadata, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&thread_id)
        .bind(&checkpoint.id)
        .bind(&latest_id)
        .bind(step)
        .bind(serde_json::to_string(&checkpoint.state)?)
        .bind(serde_json::to_string(&metadata)?)
        .bind(checkpoint.ts.to_rfc3339())
        .execute(&mut *tx)
        .await;

        match inserted {
            Ok(_) => {}
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                return Err(CheckpointError::Conflict {
                    thread_id,
                    expected: config.checkpoint_id.clone(),
                    actual: None,
                });
            }
            Err(e) => return Err(e.into()),
        }

        tx.commit().await?;

        tracing::trace!(thread_id = %thread_id, checkpoint_id = %checkpoint.id, step, "checkpoint appended");
        Ok(CheckpointConfig {
            thread_id: Some(thread_id),
            checkpoint_id: Some(checkpoint.id),
            extra: config.extra.clone(),
        })
    }

    async fn delete_thread(&self, thread_id: &str) -> Result<()> {
        sqlx::query("DELETE FROM checkpoints WHERE thread_id = ?")
            .bind(thread_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

//! The [`CheckpointSaver`] trait implemented by every persistence backend
//!
//! The execution controller only talks to this trait, so the in-memory saver
//! used in tests and the SQLite saver used in production are interchangeable.
//!
//! # Write ordering
//!
//! Writes are append-only. [`CheckpointSaver::put`] takes the caller's view of
//! the latest checkpoint (`config.checkpoint_id`, `None` for an empty thread)
//! and must fail with [`CheckpointError::Conflict`](crate::CheckpointError::Conflict)
//! if another writer appended in between. The check and the append happen
//! atomically per thread, so the parent of checkpoint N+1 is always
//! checkpoint N.

use crate::{
    checkpoint::{Checkpoint, CheckpointConfig, CheckpointMetadata, CheckpointTuple},
    error::Result,
};
use async_trait::async_trait;
use futures::stream::{Stream, StreamExt};
use std::pin::Pin;

/// Async stream of checkpoint tuples
pub type CheckpointStream = Pin<Box<dyn Stream<Item = Result<CheckpointTuple>> + Send + 'static>>;

#[async_trait]
pub trait CheckpointSaver: Send + Sync {
    /// Fetch just the checkpoint addressed by `config`
    async fn get(&self, config: &CheckpointConfig) -> Result<Option<Checkpoint>> {
        Ok(self.get_tuple(config).await?.map(|tuple| tuple.checkpoint))
    }

    /// Fetch a checkpoint with its metadata
    ///
    /// With `config.checkpoint_id` set, returns that checkpoint; otherwise the
    /// most recently appended checkpoint of `config.thread_id`.
    async fn get_tuple(&self, config: &CheckpointConfig) -> Result<Option<CheckpointTuple>>;

    /// Latest checkpoint of a thread
    async fn get_latest(&self, thread_id: &str) -> Result<Option<CheckpointTuple>> {
        self.get_tuple(&CheckpointConfig::for_thread(thread_id))
            .await
    }

    /// Checkpoints of one thread, newest first
    ///
    /// `before` restricts results to checkpoints appended before the one it
    /// names; `limit` caps the number of results.
    async fn list(
        &self,
        config: &CheckpointConfig,
        before: Option<&CheckpointConfig>,
        limit: Option<usize>,
    ) -> Result<CheckpointStream>;

    /// Full chain of a thread, oldest first
    async fn list_history(&self, thread_id: &str) -> Result<Vec<CheckpointTuple>> {
        let stream = self
            .list(&CheckpointConfig::for_thread(thread_id), None, None)
            .await?;
        let mut history = stream
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .collect::<Result<Vec<_>>>()?;
        history.reverse();
        Ok(history)
    }

    /// Append a checkpoint after `config.checkpoint_id`
    ///
    /// Returns the config addressing the new checkpoint, which is the expected
    /// parent for the next append.
    async fn put(
        &self,
        config: &CheckpointConfig,
        checkpoint: Checkpoint,
        metadata: CheckpointMetadata,
    ) -> Result<CheckpointConfig>;

    /// Remove every checkpoint of a thread
    async fn delete_thread(&self, thread_id: &str) -> Result<()> {
        let _ = thread_id;
        Ok(())
    }
}

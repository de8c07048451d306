//! In-memory checkpoint storage for development and testing
//!
//! [`InMemoryCheckpointSaver`] keeps every thread's chain in a
//! `Arc<RwLock<HashMap<thread_id, Vec<entry>>>>`. Appends take the write lock,
//! so the parent check and the push are atomic for all threads at once.
//!
//! Data is lost when the process exits. Use
//! [`SqliteCheckpointSaver`](crate::SqliteCheckpointSaver) when runs must
//! survive restarts; the controller cannot tell the two apart.
//!
//! ```rust,ignore
//! use gateflow_checkpoint::{CheckpointSaver, InMemoryCheckpointSaver};
//!
//! let saver = InMemoryCheckpointSaver::new();
//! // ... run a workflow ...
//! for tuple in saver.list_history("thread-1").await? {
//!     println!("{:?} -> {:?}", tuple.metadata.node, tuple.metadata.next);
//! }
//! ```

use crate::{
    checkpoint::{Checkpoint, CheckpointConfig, CheckpointMetadata, CheckpointTuple},
    error::{CheckpointError, Result},
    traits::{CheckpointSaver, CheckpointStream},
};
use async_trait::async_trait;
use futures::stream;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
struct CheckpointEntry {
    checkpoint: Checkpoint,
    metadata: CheckpointMetadata,
    config: CheckpointConfig,
    parent_config: Option<CheckpointConfig>,
}

impl CheckpointEntry {
    fn to_tuple(&self) -> CheckpointTuple {
        CheckpointTuple {
            config: self.config.clone(),
            checkpoint: self.checkpoint.clone(),
            metadata: self.metadata.clone(),
            parent_config: self.parent_config.clone(),
        }
    }
}

type CheckpointStorage = Arc<RwLock<HashMap<String, Vec<CheckpointEntry>>>>;

/// Thread-safe, non-durable [`CheckpointSaver`]
///
/// Cloning shares the underlying storage.
#[derive(Debug, Clone)]
pub struct InMemoryCheckpointSaver {
    storage: CheckpointStorage,
}

impl InMemoryCheckpointSaver {
    pub fn new() -> Self {
        Self {
            storage: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Number of distinct threads with at least one checkpoint
    pub async fn thread_count(&self) -> usize {
        self.storage.read().await.len()
    }

    /// Total number of checkpoints across all threads
    pub async fn checkpoint_count(&self) -> usize {
        self.storage
            .read()
            .await
            .values()
            .map(|entries| entries.len())
            .sum()
    }

    pub async fn clear(&self) {
        self.storage.write().await.clear();
    }
}

impl Default for InMemoryCheckpointSaver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CheckpointSaver for InMemoryCheckpointSaver {
    async fn get_tuple(&self, config: &CheckpointConfig) -> Result<Option<CheckpointTuple>> {
        let thread_id = config.require_thread_id()?;
        let storage = self.storage.read().await;

        let Some(entries) = storage.get(thread_id) else {
            return Ok(None);
        };

        let entry = match &config.checkpoint_id {
            Some(checkpoint_id) => entries.iter().find(|e| &e.checkpoint.id == checkpoint_id),
            None => entries.last(),
        };

        Ok(entry.map(CheckpointEntry::to_tuple))
    }

    async fn list(
        &self,
        config: &CheckpointConfig,
        before: Option<&CheckpointConfig>,
        limit: Option<usize>,
    ) -> Result<CheckpointStream> {
        let thread_id = config.require_thread_id()?;
        let storage = self.storage.read().await;
        let entries = storage.get(thread_id).map(Vec::as_slice).unwrap_or_default();

        // Entries are in append order, so "before X" is everything left of X.
        let end = match before.and_then(|b| b.checkpoint_id.as_ref()) {
            Some(before_id) => entries
                .iter()
                .position(|e| &e.checkpoint.id == before_id)
                .unwrap_or(entries.len()),
            None => entries.len(),
        };

        let results: Vec<Result<CheckpointTuple>> = entries[..end]
            .iter()
            .rev()
            .take(limit.unwrap_or(usize::MAX))
            .map(|entry| Ok(entry.to_tuple()))
            .collect();

        Ok(Box::pin(stream::iter(results)))
    }

    async fn put(
        &self,
        config: &CheckpointConfig,
        checkpoint: Checkpoint,
        metadata: CheckpointMetadata,
    ) -> Result<CheckpointConfig> {
        let thread_id = config.require_thread_id()?.to_string();

        let mut storage = self.storage.write().await;
        let entries = storage.get(&thread_id).map(Vec::as_slice).unwrap_or_default();

        let latest = entries.last().map(|e| e.checkpoint.id.clone());
        if latest != config.checkpoint_id {
            return Err(CheckpointError::Conflict {
                thread_id,
                expected: config.checkpoint_id.clone(),
                actual: latest,
            });
        }
        if entries.iter().any(|e| e.checkpoint.id == checkpoint.id) {
            return Err(CheckpointError::Invalid(format!(
                "duplicate checkpoint id {} on thread {}",
                checkpoint.id, thread_id
            )));
        }

        let checkpoint_config = CheckpointConfig {
            thread_id: Some(thread_id.clone()),
            checkpoint_id: Some(checkpoint.id.clone()),
            extra: config.extra.clone(),
        };

        let step = entries.len() as u64;
        let entry = CheckpointEntry {
            checkpoint,
            metadata: CheckpointMetadata {
                step: Some(step),
                ..metadata
            },
            config: checkpoint_config.clone(),
            parent_config: latest.map(|id| CheckpointConfig::for_thread(&thread_id).with_checkpoint_id(id)),
        };

        storage.entry(thread_id).or_default().push(entry);

        Ok(checkpoint_config)
    }

    async fn delete_thread(&self, thread_id: &str) -> Result<()> {
        self.storage.write().await.remove(thread_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::CheckpointSource;
    use futures::StreamExt;
    use serde_json::json;

    async fn append(
        saver: &InMemoryCheckpointSaver,
        parent: &CheckpointConfig,
        n: i64,
    ) -> CheckpointConfig {
        saver
            .put(
                parent,
                Checkpoint::new(json!({ "n": n })),
                CheckpointMetadata::new().with_source(CheckpointSource::Loop),
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_save_and_load_checkpoint() {
        let saver = InMemoryCheckpointSaver::new();
        let checkpoint = Checkpoint::empty();
        let metadata = CheckpointMetadata::new().with_source(CheckpointSource::Input);
        let config = CheckpointConfig::for_thread("thread-1");

        let saved_config = saver
            .put(&config, checkpoint.clone(), metadata)
            .await
            .unwrap();

        assert_eq!(saved_config.checkpoint_id.as_deref(), Some(checkpoint.id.as_str()));

        let tuple = saver.get_tuple(&saved_config).await.unwrap().unwrap();
        assert_eq!(tuple.checkpoint.id, checkpoint.id);
        assert_eq!(tuple.metadata.step, Some(0));
        assert!(tuple.parent_config.is_none());
    }

    #[tokio::test]
    async fn test_latest_and_chain() {
        let saver = InMemoryCheckpointSaver::new();
        let root = CheckpointConfig::for_thread("thread-1");

        let first = append(&saver, &root, 0).await;
        let second = append(&saver, &first, 1).await;

        let latest = saver.get_latest("thread-1").await.unwrap().unwrap();
        assert_eq!(latest.config, second);
        assert_eq!(latest.metadata.step, Some(1));
        assert_eq!(latest.parent_checkpoint_id(), first.checkpoint_id.as_deref());
        assert_eq!(latest.checkpoint.state["n"], 1);
    }

    #[tokio::test]
    async fn test_stale_parent_is_rejected() {
        let saver = InMemoryCheckpointSaver::new();
        let root = CheckpointConfig::for_thread("thread-1");

        let first = append(&saver, &root, 0).await;
        append(&saver, &first, 1).await;

        // A second writer still holding `first` must not fork the chain.
        let err = saver
            .put(&first, Checkpoint::empty(), CheckpointMetadata::new())
            .await
            .unwrap_err();
        assert!(err.is_conflict());

        // Neither may a writer that thinks the thread is empty.
        let err = saver
            .put(&root, Checkpoint::empty(), CheckpointMetadata::new())
            .await
            .unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(saver.checkpoint_count().await, 2);
    }

    #[tokio::test]
    async fn test_rejected_put_leaves_no_thread_behind() {
        let saver = InMemoryCheckpointSaver::new();
        let stale = CheckpointConfig::for_thread("ghost").with_checkpoint_id("missing".to_string());

        let err = saver
            .put(&stale, Checkpoint::empty(), CheckpointMetadata::new())
            .await
            .unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(saver.thread_count().await, 0);
        assert!(saver.get_latest("ghost").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_checkpoints_newest_first() {
        let saver = InMemoryCheckpointSaver::new();
        let mut parent = CheckpointConfig::for_thread("thread-1");
        for i in 0..3 {
            parent = append(&saver, &parent, i).await;
        }

        let stream = saver
            .list(&CheckpointConfig::for_thread("thread-1"), None, None)
            .await
            .unwrap();
        let results: Vec<_> = stream.collect().await;

        assert_eq!(results.len(), 3);
        let steps: Vec<_> = results
            .into_iter()
            .map(|r| r.unwrap().metadata.step.unwrap())
            .collect();
        assert_eq!(steps, vec![2, 1, 0]);
    }

    #[tokio::test]
    async fn test_list_with_before_and_limit() {
        let saver = InMemoryCheckpointSaver::new();
        let mut configs = Vec::new();
        let mut parent = CheckpointConfig::for_thread("thread-1");
        for i in 0..4 {
            parent = append(&saver, &parent, i).await;
            configs.push(parent.clone());
        }

        let stream = saver
            .list(&CheckpointConfig::for_thread("thread-1"), Some(&configs[3]), Some(2))
            .await
            .unwrap();
        let results: Vec<_> = stream.map(|r| r.unwrap()).collect().await;

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].config, configs[2]);
        assert_eq!(results[1].config, configs[1]);
    }

    #[tokio::test]
    async fn test_list_history_oldest_first() {
        let saver = InMemoryCheckpointSaver::new();
        let mut parent = CheckpointConfig::for_thread("thread-1");
        for i in 0..3 {
            parent = append(&saver, &parent, i).await;
        }

        let history = saver.list_history("thread-1").await.unwrap();
        let values: Vec<_> = history.iter().map(|t| t.checkpoint.state["n"].clone()).collect();
        assert_eq!(values, vec![json!(0), json!(1), json!(2)]);

        assert!(saver.list_history("unknown").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_threads_are_isolated() {
        let saver = InMemoryCheckpointSaver::new();
        append(&saver, &CheckpointConfig::for_thread("a"), 1).await;
        append(&saver, &CheckpointConfig::for_thread("b"), 2).await;

        assert_eq!(saver.thread_count().await, 2);
        let a = saver.get_latest("a").await.unwrap().unwrap();
        assert_eq!(a.checkpoint.state["n"], 1);
        assert_eq!(a.metadata.step, Some(0));
    }

    #[tokio::test]
    async fn test_missing_thread_id_is_invalid() {
        let saver = InMemoryCheckpointSaver::new();
        let err = saver
            .put(&CheckpointConfig::new(), Checkpoint::empty(), CheckpointMetadata::new())
            .await
            .unwrap_err();
        assert!(matches!(err, CheckpointError::Invalid(_)));
    }

    #[tokio::test]
    async fn test_delete_thread_and_clear() {
        let saver = InMemoryCheckpointSaver::new();
        append(&saver, &CheckpointConfig::for_thread("thread-1"), 0).await;
        append(&saver, &CheckpointConfig::for_thread("thread-2"), 0).await;

        saver.delete_thread("thread-1").await.unwrap();
        assert_eq!(saver.thread_count().await, 1);
        assert!(saver.get_latest("thread-1").await.unwrap().is_none());

        saver.clear().await;
        assert_eq!(saver.checkpoint_count().await, 0);
    }
}

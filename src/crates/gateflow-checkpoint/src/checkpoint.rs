//! Core checkpoint data structures
//!
//! A [`Checkpoint`] is an immutable snapshot of one workflow thread's state.
//! Checkpoints for a thread form a chain: every checkpoint except the first
//! records the id of the checkpoint it was appended after, exposed through
//! [`CheckpointTuple::parent_config`].
//!
//! The state payload is stored as opaque JSON so the persistence layer does
//! not depend on any particular workflow's state type.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Unique identifier for a checkpoint within a thread
pub type CheckpointId = String;

/// What caused a checkpoint to be written
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CheckpointSource {
    /// Initial state supplied by the caller of `start`
    Input,
    /// A node completed and its update was applied
    Loop,
    /// A node asked to pause for external input
    Interrupt,
    /// A node completed on re-entry after external input was supplied
    Resume,
}

impl std::fmt::Display for CheckpointSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CheckpointSource::Input => write!(f, "input"),
            CheckpointSource::Loop => write!(f, "loop"),
            CheckpointSource::Interrupt => write!(f, "interrupt"),
            CheckpointSource::Resume => write!(f, "resume"),
        }
    }
}

/// Metadata recorded alongside a checkpoint
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct CheckpointMetadata {
    /// Why this checkpoint exists
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<CheckpointSource>,

    /// Position in the thread's chain, assigned by the saver (0 = first)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<u64>,

    /// Node that produced the state in this checkpoint
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node: Option<String>,

    /// Node to run next; `None` once the thread is terminal
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,

    /// Arbitrary extra metadata
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl CheckpointMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source(mut self, source: CheckpointSource) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_step(mut self, step: u64) -> Self {
        self.step = Some(step);
        self
    }

    pub fn with_node(mut self, node: impl Into<String>) -> Self {
        self.node = Some(node.into());
        self
    }

    pub fn with_next(mut self, next: Option<String>) -> Self {
        self.next = next;
        self
    }

    pub fn with_extra(mut self, key: String, value: serde_json::Value) -> Self {
        self.extra.insert(key, value);
        self
    }
}

/// Immutable state snapshot
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Checkpoint {
    /// Format version
    pub v: i32,

    /// Checkpoint id, unique within its thread
    pub id: CheckpointId,

    /// Creation time
    pub ts: DateTime<Utc>,

    /// Full state snapshot
    pub state: serde_json::Value,
}

impl Checkpoint {
    pub const CURRENT_VERSION: i32 = 1;

    /// Snapshot `state` under a freshly generated id
    pub fn new(state: serde_json::Value) -> Self {
        Self {
            v: Self::CURRENT_VERSION,
            id: Uuid::new_v4().to_string(),
            ts: Utc::now(),
            state,
        }
    }

    pub fn with_id(id: CheckpointId, state: serde_json::Value) -> Self {
        Self {
            v: Self::CURRENT_VERSION,
            id,
            ts: Utc::now(),
            state,
        }
    }

    pub fn empty() -> Self {
        Self::new(serde_json::Value::Object(Default::default()))
    }
}

/// Addresses a thread, and optionally one checkpoint in it
///
/// When passed to `put`, `checkpoint_id` names the checkpoint the caller
/// believes is the latest (the expected parent). When passed to `get_tuple`,
/// it selects a specific checkpoint instead of the latest one.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct CheckpointConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub checkpoint_id: Option<CheckpointId>,

    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl CheckpointConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_thread(thread_id: impl Into<String>) -> Self {
        Self::new().with_thread_id(thread_id.into())
    }

    pub fn with_thread_id(mut self, thread_id: String) -> Self {
        self.thread_id = Some(thread_id);
        self
    }

    pub fn with_checkpoint_id(mut self, checkpoint_id: CheckpointId) -> Self {
        self.checkpoint_id = Some(checkpoint_id);
        self
    }

    /// Thread id, or an `Invalid` error when missing or blank
    pub fn require_thread_id(&self) -> crate::Result<&str> {
        match self.thread_id.as_deref() {
            Some(id) if !id.trim().is_empty() => Ok(id),
            _ => Err(crate::CheckpointError::Invalid(
                "thread_id is required".to_string(),
            )),
        }
    }
}

/// A checkpoint together with its addressing and chain information
#[derive(Debug, Clone, PartialEq)]
pub struct CheckpointTuple {
    /// Config addressing exactly this checkpoint
    pub config: CheckpointConfig,

    pub checkpoint: Checkpoint,

    pub metadata: CheckpointMetadata,

    /// Config of the checkpoint this one was appended after
    pub parent_config: Option<CheckpointConfig>,
}

impl CheckpointTuple {
    pub fn new(
        config: CheckpointConfig,
        checkpoint: Checkpoint,
        metadata: CheckpointMetadata,
    ) -> Self {
        Self {
            config,
            checkpoint,
            metadata,
            parent_config: None,
        }
    }

    pub fn with_parent_config(mut self, parent_config: CheckpointConfig) -> Self {
        self.parent_config = Some(parent_config);
        self
    }

    pub fn thread_id(&self) -> &str {
        self.config.thread_id.as_deref().unwrap_or_default()
    }

    pub fn checkpoint_id(&self) -> &str {
        &self.checkpoint.id
    }

    pub fn parent_checkpoint_id(&self) -> Option<&str> {
        self.parent_config
            .as_ref()
            .and_then(|p| p.checkpoint_id.as_deref())
    }
}

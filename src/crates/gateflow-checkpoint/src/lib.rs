//! # gateflow-checkpoint - durable state for resumable workflows
//!
//! Every step of a gateflow workflow run ends by appending a [`Checkpoint`]:
//! an immutable JSON snapshot of the run's state plus [`CheckpointMetadata`]
//! recording which node produced it and which node runs next. A run that
//! pauses for human approval is nothing more than a thread whose latest
//! checkpoint says "interrupted, re-enter node X", which is why a paused run
//! survives a process restart when a durable backend is used.
//!
//! ## Backends
//!
//! | Backend | Durable | Use |
//! |---------|---------|-----|
//! | [`InMemoryCheckpointSaver`] | no | tests, local development |
//! | [`SqliteCheckpointSaver`] | yes | production |
//!
//! Both implement [`CheckpointSaver`]; callers hold an
//! `Arc<dyn CheckpointSaver>` and never know which one they have.
//!
//! ## Chain semantics
//!
//! - Appends are ordered per thread: `put` names the expected parent and fails
//!   with [`CheckpointError::Conflict`] when another writer got there first.
//! - `get_latest` returns the most recent append for a thread.
//! - `list_history` returns the whole chain oldest first; each tuple's
//!   `parent_config` points at its predecessor.

pub mod checkpoint;
pub mod error;
pub mod memory;
pub mod sqlite;
pub mod traits;

pub use checkpoint::{
    Checkpoint, CheckpointConfig, CheckpointId, CheckpointMetadata, CheckpointSource,
    CheckpointTuple,
};
pub use error::{CheckpointError, Result};
pub use memory::InMemoryCheckpointSaver;
pub use sqlite::SqliteCheckpointSaver;
pub use traits::{CheckpointSaver, CheckpointStream};

//! Error types for checkpoint operations

use thiserror::Error;

/// Result type for checkpoint operations
pub type Result<T> = std::result::Result<T, CheckpointError>;

/// Errors that can occur during checkpoint operations
#[derive(Error, Debug)]
pub enum CheckpointError {
    /// Checkpoint not found
    #[error("Checkpoint not found: {0}")]
    NotFound(String),

    /// Append rejected because the thread moved on since the caller last read it
    #[error("Checkpoint conflict on thread '{thread_id}': expected parent {expected:?}, latest is {actual:?}")]
    Conflict {
        thread_id: String,
        expected: Option<String>,
        actual: Option<String>,
    },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Invalid checkpoint or config
    #[error("Invalid checkpoint: {0}")]
    Invalid(String),

    /// Database error from a SQL-backed saver
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Schema migration failure
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl CheckpointError {
    /// Whether the failure is a write-ordering conflict rather than an outage
    pub fn is_conflict(&self) -> bool {
        matches!(self, CheckpointError::Conflict { .. })
    }
}

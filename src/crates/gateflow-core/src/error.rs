//! Error types for workflow construction and execution
//!
//! Every fallible operation in this crate returns [`GraphError`]. Errors fall
//! into two groups, distinguished by [`GraphError::is_validation`]:
//!
//! ```text
//! GraphError
//! ├── validation (caller's fault, nothing was written)
//! │   ├── Validation         - malformed start input
//! │   ├── ThreadNotFound     - no checkpoint for the thread id
//! │   ├── ThreadExists       - start on a thread id already in use
//! │   ├── NotSuspended       - resume on a running or finished thread
//! │   └── InvalidDecision    - resume value is not APPROVED / REJECTED
//! └── engine (the run itself failed)
//!     ├── StepLimitExceeded  - recursion ceiling reached
//!     ├── NodeExecution      - a node returned an error
//!     ├── Execution          - routing / graph lookup failure
//!     ├── Checkpoint         - persistence failure
//!     ├── Serialization      - state could not be (de)serialized
//!     └── Configuration      - graph or controller misconfigured
//! ```
//!
//! Validation errors are reported before the controller touches the
//! checkpoint store. Engine errors end the current run; the thread keeps the
//! last checkpoint that was successfully written.

use gateflow_checkpoint::CheckpointError;
use thiserror::Error;

/// Result type for workflow operations
pub type Result<T> = std::result::Result<T, GraphError>;

#[derive(Error, Debug)]
pub enum GraphError {
    /// Graph structure or start input is invalid
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Thread '{thread_id}' not found")]
    ThreadNotFound { thread_id: String },

    #[error("Thread '{thread_id}' already exists")]
    ThreadExists { thread_id: String },

    /// Resume attempted on a thread that is not waiting for input
    #[error("Thread '{thread_id}' is not suspended (status: {status})")]
    NotSuspended { thread_id: String, status: String },

    /// The resume value does not carry a usable approval decision
    #[error("Invalid decision for thread '{thread_id}': {reason}")]
    InvalidDecision { thread_id: String, reason: String },

    #[error("Thread '{thread_id}' exceeded the step limit of {limit}")]
    StepLimitExceeded { thread_id: String, limit: usize },

    #[error("Node '{node}' execution failed: {error}")]
    NodeExecution { node: String, error: String },

    #[error("Execution failed: {0}")]
    Execution(String),

    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl GraphError {
    pub fn node_execution(node: impl Into<String>, error: impl Into<String>) -> Self {
        GraphError::NodeExecution {
            node: node.into(),
            error: error.into(),
        }
    }

    /// Whether the error was caused by the request rather than the engine
    ///
    /// Validation errors leave the thread untouched and map to 4xx responses.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            GraphError::Validation(_)
                | GraphError::ThreadNotFound { .. }
                | GraphError::ThreadExists { .. }
                | GraphError::NotSuspended { .. }
                | GraphError::InvalidDecision { .. }
        )
    }

    /// Stable machine-readable code for API bodies and progress events
    pub fn code(&self) -> &'static str {
        match self {
            GraphError::Validation(_) => "VALIDATION_ERROR",
            GraphError::ThreadNotFound { .. } => "THREAD_NOT_FOUND",
            GraphError::ThreadExists { .. } => "THREAD_EXISTS",
            GraphError::NotSuspended { .. } => "NOT_SUSPENDED",
            GraphError::InvalidDecision { .. } => "INVALID_DECISION",
            GraphError::StepLimitExceeded { .. } => "STEP_LIMIT_EXCEEDED",
            GraphError::NodeExecution { .. } => "NODE_EXECUTION_FAILED",
            GraphError::Execution(_) => "EXECUTION_FAILED",
            GraphError::Checkpoint(_) => "CHECKPOINT_ERROR",
            GraphError::Serialization(_) => "SERIALIZATION_ERROR",
            GraphError::Configuration(_) => "CONFIGURATION_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_execution_display() {
        let err = GraphError::node_execution("execute", "backend timeout");
        assert_eq!(err.to_string(), "Node 'execute' execution failed: backend timeout");
        assert!(!err.is_validation());
    }

    #[test]
    fn test_validation_classification() {
        let err = GraphError::NotSuspended {
            thread_id: "t-1".to_string(),
            status: "terminal".to_string(),
        };
        assert!(err.is_validation());
        assert_eq!(err.code(), "NOT_SUSPENDED");

        let err = GraphError::StepLimitExceeded {
            thread_id: "t-1".to_string(),
            limit: 25,
        };
        assert!(!err.is_validation());
        assert_eq!(err.to_string(), "Thread 't-1' exceeded the step limit of 25");
    }

    #[test]
    fn test_checkpoint_error_conversion() {
        let err: GraphError = CheckpointError::Storage("disk full".to_string()).into();
        assert!(matches!(err, GraphError::Checkpoint(_)));
        assert_eq!(err.code(), "CHECKPOINT_ERROR");
    }
}

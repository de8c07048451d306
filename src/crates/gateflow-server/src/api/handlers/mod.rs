//! HTTP endpoint handlers

pub mod health;
pub mod workflows;

pub use health::health;
pub use workflows::{resume_workflow, start_workflow, workflow_history, workflow_status};

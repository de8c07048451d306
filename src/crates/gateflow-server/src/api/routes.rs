//! API route definitions

use axum::{
    routing::{get, post},
    Router,
};
use gateflow_core::WorkflowController;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::api::handlers;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub controller: Arc<WorkflowController>,
    /// Instance name reported by `/health`
    pub name: String,
}

impl AppState {
    pub fn new(controller: Arc<WorkflowController>, name: impl Into<String>) -> Self {
        Self {
            controller,
            name: name.into(),
        }
    }
}

/// Build the complete API router
pub fn create_router(app_state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/workflow/start", post(handlers::start_workflow))
        .route("/workflow/resume", post(handlers::resume_workflow))
        .route("/workflow/:thread_id", get(handlers::workflow_status))
        .route("/workflow/:thread_id/history", get(handlers::workflow_history))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state)
}

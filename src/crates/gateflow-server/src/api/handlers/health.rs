use axum::{extract::State, Json};

use crate::api::{models::HealthResponse, routes::AppState};

/// GET /health
pub async fn health(State(app_state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse::ok(app_state.name.as_str()))
}

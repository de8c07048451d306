//! Workflow endpoint handlers
//!
//! `start` and `resume` answer with a `text/event-stream` of progress events.
//! Requests that can be rejected up front (bad body, unknown thread, thread not
//! suspended, malformed decision) get a plain JSON error instead of a stream.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures::{Stream, StreamExt};
use gateflow_core::{ProgressEvent, ProgressStream, StartInput};
use serde_json::Value;
use std::convert::Infallible;
use std::time::Duration;

use crate::api::{
    error::ApiResult,
    models::{
        CheckpointResponse, HistoryResponse, ResumeWorkflowRequest, StartWorkflowRequest,
        StatusResponse,
    },
    routes::AppState,
};

const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

fn sse_event(event: &ProgressEvent) -> Event {
    let json = serde_json::to_string(event).unwrap_or_default();
    Event::default()
        .event(event.kind.as_str())
        .id(event.sequence.to_string())
        .data(json)
}

fn into_sse(stream: ProgressStream) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let events = stream.map(|event| Ok(sse_event(&event)));
    Sse::new(events).keep_alive(KeepAlive::new().interval(KEEP_ALIVE_INTERVAL).text("ping"))
}

/// Start a new thread
///
/// POST /workflow/start
pub async fn start_workflow(
    State(app_state): State<AppState>,
    body: Result<Json<StartWorkflowRequest>, JsonRejection>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let Json(req) = body?;
    let state = StartInput::from(req).into_state()?;
    app_state.controller.validate_start(&state).await?;

    tracing::info!(thread_id = %state.thread_id, user_id = %state.user_id, "Starting workflow");
    Ok(into_sse(app_state.controller.stream_start(state)))
}

/// Resume a suspended thread with a decision
///
/// POST /workflow/resume
pub async fn resume_workflow(
    State(app_state): State<AppState>,
    body: Result<Json<ResumeWorkflowRequest>, JsonRejection>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let Json(req) = body?;
    let decision = app_state
        .controller
        .validate_resume(&req.thread_id, &req.decision)
        .await?;

    tracing::info!(thread_id = %req.thread_id, decision = decision.as_str(), "Resuming workflow");
    let resume = Value::String(decision.as_str().to_string());
    Ok(into_sse(app_state.controller.stream_resume(req.thread_id, resume)))
}

/// Checkpoint chain of a thread, oldest first
///
/// GET /workflow/:thread_id/history
pub async fn workflow_history(
    State(app_state): State<AppState>,
    Path(thread_id): Path<String>,
) -> ApiResult<Json<HistoryResponse>> {
    let history = app_state.controller.history(&thread_id).await?;
    Ok(Json(HistoryResponse {
        thread_id,
        checkpoints: history.into_iter().map(CheckpointResponse::from).collect(),
    }))
}

/// Current status and latest state of a thread
///
/// GET /workflow/:thread_id
pub async fn workflow_status(
    State(app_state): State<AppState>,
    Path(thread_id): Path<String>,
) -> ApiResult<Json<StatusResponse>> {
    let status = app_state.controller.status(&thread_id).await?;
    let state = app_state.controller.state(&thread_id).await?;
    Ok(Json(StatusResponse {
        thread_id,
        status,
        state: serde_json::to_value(state).map_err(gateflow_core::GraphError::from)?,
    }))
}

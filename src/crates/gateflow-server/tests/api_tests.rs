//! HTTP API tests driven through the router without a socket

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use gateflow_core::{ProgressEvent, ProgressKind};
use gateflow_server::{api::create_router, app, ServerConfig};
use serde_json::{json, Value};
use tower::ServiceExt;

async fn router() -> Router {
    let state = app::build_state(&ServerConfig::default()).await.unwrap();
    create_router(state)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, String) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

async fn post(app: &Router, uri: &str, body: Value) -> (StatusCode, String) {
    let request = Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    let (status, body) = send(app, Request::get(uri).body(Body::empty()).unwrap()).await;
    (status, serde_json::from_str(&body).unwrap())
}

/// Decode the `data:` lines of an SSE body
fn events(body: &str) -> Vec<ProgressEvent> {
    body.lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|data| serde_json::from_str(data.trim_start()).unwrap())
        .collect()
}

fn kinds(events: &[ProgressEvent]) -> Vec<ProgressKind> {
    events.iter().map(|e| e.kind).collect()
}

fn error_code(body: &str) -> String {
    let value: Value = serde_json::from_str(body).unwrap();
    value["code"].as_str().unwrap().to_string()
}

async fn start_high_risk(app: &Router, thread_id: &str) {
    let (status, body) = post(
        app,
        "/workflow/start",
        json!({ "threadId": thread_id, "userId": "user-1", "message": "Delete all customer data" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        kinds(&events(&body)),
        vec![ProgressKind::StateUpdate, ProgressKind::Interrupt, ProgressKind::End]
    );
}

#[tokio::test]
async fn test_health() {
    let app = router().await;
    let (status, body) = get(&app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["name"], "gateflow");
    assert_eq!(body["version"], gateflow_server::VERSION);
}

#[tokio::test]
async fn test_low_risk_start_streams_to_completion() {
    let app = router().await;
    let (status, body) = post(
        &app,
        "/workflow/start",
        json!({ "threadId": "t-low", "userId": "user-1", "message": "Show me the customer list" }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("event: state_update"));
    assert!(body.contains("event: complete"));

    let events = events(&body);
    assert_eq!(
        kinds(&events),
        vec![
            ProgressKind::StateUpdate,
            ProgressKind::StateUpdate,
            ProgressKind::StateUpdate,
            ProgressKind::Complete,
            ProgressKind::End,
        ]
    );
    let sequences: Vec<u64> = events.iter().map(|e| e.sequence).collect();
    assert_eq!(sequences, vec![1, 2, 3, 4, 5]);
    assert!(events.iter().all(|e| e.thread_id == "t-low"));
    assert!(events[3].data["response"]
        .as_str()
        .unwrap()
        .starts_with("Completed 1 operation(s)"));
}

#[tokio::test]
async fn test_generated_thread_id() {
    let app = router().await;
    let (status, body) = post(
        &app,
        "/workflow/start",
        json!({ "userId": "user-1", "message": "List open invoices" }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let events = events(&body);
    let thread_id = events[0].thread_id.clone();
    assert!(!thread_id.is_empty());

    let (status, history) = get(&app, &format!("/workflow/{}/history", thread_id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(history["checkpoints"].as_array().unwrap().len(), 4);
}

#[tokio::test]
async fn test_high_risk_approve_flow() {
    let app = router().await;
    start_high_risk(&app, "t-approve").await;

    let (status, body) = get(&app, "/workflow/t-approve").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "suspended");
    assert_eq!(body["node"], "approval");
    assert_eq!(body["request"]["riskLevel"], "high");
    assert_eq!(body["state"]["approvalNeeded"], true);

    let (status, body) = post(
        &app,
        "/workflow/resume",
        json!({ "threadId": "t-approve", "decision": "APPROVED" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let events = events(&body);
    assert_eq!(
        kinds(&events),
        vec![
            ProgressKind::StateUpdate,
            ProgressKind::StateUpdate,
            ProgressKind::Complete,
            ProgressKind::End,
        ]
    );
    assert_eq!(events[0].sequence, 1);
    assert_eq!(events[0].data["approved"], true);

    let (_, body) = get(&app, "/workflow/t-approve").await;
    assert_eq!(body["status"], "terminal");
    assert!(body["response"].as_str().unwrap().starts_with("Completed 1 operation(s)"));

    let (status, history) = get(&app, "/workflow/t-approve/history").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(history["threadId"], "t-approve");
    let checkpoints = history["checkpoints"].as_array().unwrap();
    let sources: Vec<&str> = checkpoints
        .iter()
        .map(|c| c["source"].as_str().unwrap())
        .collect();
    assert_eq!(sources, vec!["input", "loop", "interrupt", "resume", "loop"]);
    assert!(checkpoints[0]["parentCheckpointId"].is_null());
    for pair in checkpoints.windows(2) {
        assert_eq!(pair[1]["parentCheckpointId"], pair[0]["checkpointId"]);
    }
}

#[tokio::test]
async fn test_high_risk_reject_flow() {
    let app = router().await;
    start_high_risk(&app, "t-reject").await;

    let (status, body) = post(
        &app,
        "/workflow/resume",
        json!({ "threadId": "t-reject", "decision": "rejected" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let events = events(&body);
    assert_eq!(events[events.len() - 2].kind, ProgressKind::Complete);
    assert!(events[events.len() - 2].data["response"]
        .as_str()
        .unwrap()
        .starts_with("Operation cancelled"));

    let (status, body) = post(
        &app,
        "/workflow/resume",
        json!({ "threadId": "t-reject", "decision": "APPROVED" }),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error_code(&body), "NOT_SUSPENDED");
}

#[tokio::test]
async fn test_malformed_decision_is_rejected_before_streaming() {
    let app = router().await;
    start_high_risk(&app, "t-bad-decision").await;

    for decision in [json!(true), json!("MAYBE"), Value::Null] {
        let (status, body) = post(
            &app,
            "/workflow/resume",
            json!({ "threadId": "t-bad-decision", "decision": decision }),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(error_code(&body), "INVALID_DECISION");
    }

    let (_, body) = get(&app, "/workflow/t-bad-decision").await;
    assert_eq!(body["status"], "suspended");
    let (_, history) = get(&app, "/workflow/t-bad-decision/history").await;
    assert_eq!(history["checkpoints"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_unknown_thread() {
    let app = router().await;

    let (status, body) = post(
        &app,
        "/workflow/resume",
        json!({ "threadId": "missing", "decision": "APPROVED" }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error_code(&body), "THREAD_NOT_FOUND");

    let (status, body) = get(&app, "/workflow/missing/history").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "NotFound");

    let (status, _) = get(&app, "/workflow/missing").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_duplicate_start_conflicts() {
    let app = router().await;
    start_high_risk(&app, "t-dup").await;

    let (status, body) = post(
        &app,
        "/workflow/start",
        json!({ "threadId": "t-dup", "userId": "user-2", "message": "Show me everything" }),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error_code(&body), "THREAD_EXISTS");
}

#[tokio::test]
async fn test_invalid_start_requests() {
    let app = router().await;

    let (status, body) = post(
        &app,
        "/workflow/start",
        json!({ "userId": "user-1", "message": "   " }),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(error_code(&body), "VALIDATION_ERROR");

    let (status, body) = post(&app, "/workflow/start", json!({ "message": "no user" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "BAD_REQUEST");

    let request = Request::post("/workflow/start")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_explicit_tool_calls() {
    let app = router().await;
    let (status, body) = post(
        &app,
        "/workflow/start",
        json!({
            "threadId": "t-tools",
            "userId": "user-1",
            "message": "Show me the sessions",
            "toolCalls": [
                { "name": "lookup", "args": { "table": "sessions" } },
                { "name": "count", "args": {} }
            ]
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let events = events(&body);
    let complete = events
        .iter()
        .find(|e| e.kind == ProgressKind::Complete)
        .unwrap();
    let response = complete.data["response"].as_str().unwrap();
    assert!(response.starts_with("Completed 2 operation(s)"));
    assert!(response.contains("- lookup:"));
    assert!(response.contains("- count:"));
}

//! Request and response bodies

use chrono::{DateTime, Utc};
use gateflow_checkpoint::{CheckpointSource, CheckpointTuple};
use gateflow_core::{RunStatus, StartInput, ToolCall};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Body of `POST /workflow/start`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartWorkflowRequest {
    /// Generated when omitted
    #[serde(default)]
    pub thread_id: Option<String>,
    pub user_id: String,
    pub message: String,
    /// Explicit operations; derived from the message when empty
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
}

impl From<StartWorkflowRequest> for StartInput {
    fn from(req: StartWorkflowRequest) -> Self {
        let mut input = StartInput::new(req.user_id, req.message).with_tool_calls(req.tool_calls);
        if let Some(thread_id) = req.thread_id {
            input = input.with_thread_id(thread_id);
        }
        input
    }
}

/// Body of `POST /workflow/resume`
///
/// `decision` stays untyped so a wrong shape is reported as an invalid
/// decision rather than a body parse failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeWorkflowRequest {
    pub thread_id: String,
    #[serde(default)]
    pub decision: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CheckpointResponse {
    pub checkpoint_id: String,
    pub parent_checkpoint_id: Option<String>,
    pub thread_id: String,
    pub step: Option<u64>,
    pub source: Option<CheckpointSource>,
    pub node: Option<String>,
    pub next: Option<String>,
    pub state: Value,
    pub created_at: DateTime<Utc>,
}

impl From<CheckpointTuple> for CheckpointResponse {
    fn from(tuple: CheckpointTuple) -> Self {
        Self {
            checkpoint_id: tuple.checkpoint_id().to_string(),
            parent_checkpoint_id: tuple.parent_checkpoint_id().map(str::to_string),
            thread_id: tuple.thread_id().to_string(),
            step: tuple.metadata.step,
            source: tuple.metadata.source,
            node: tuple.metadata.node,
            next: tuple.metadata.next,
            state: tuple.checkpoint.state,
            created_at: tuple.checkpoint.ts,
        }
    }
}

/// Body of `GET /workflow/{threadId}/history`, oldest checkpoint first
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HistoryResponse {
    pub thread_id: String,
    pub checkpoints: Vec<CheckpointResponse>,
}

/// Body of `GET /workflow/{threadId}`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub thread_id: String,
    #[serde(flatten)]
    pub status: RunStatus,
    pub state: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealthResponse {
    pub status: String,
    pub name: String,
    pub version: String,
}

impl HealthResponse {
    pub fn ok(name: impl Into<String>) -> Self {
        Self {
            status: "ok".to_string(),
            name: name.into(),
            version: crate::VERSION.to_string(),
        }
    }
}

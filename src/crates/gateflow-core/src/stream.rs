//! Progress streaming for `start` and `resume` calls
//!
//! The controller reports what it does as [`ExecutionEvent`]s through an
//! [`EventSink`]. The stream adapter turns those into numbered
//! [`ProgressEvent`]s, the unit clients see:
//!
//! | kind           | data                                   |
//! |----------------|----------------------------------------|
//! | `state_update` | state fields the node changed          |
//! | `interrupt`    | the [`ApprovalRequest`]                |
//! | `complete`     | `{ "response": ... }`                  |
//! | `error`        | `{ "message": ..., "code": ... }`      |
//! | `end`          | `null`; always the last event          |
//!
//! Sequence numbers start at 1 and increase by one per event within a call.
//!
//! ```text
//!  controller task ──ExecutionEvent──> mpsc ──> ProgressSequencer ──> ProgressStream
//!                                                                      ... end
//! ```
//!
//! The run executes on its own task. If the consumer goes away mid-run the
//! run still finishes and checkpoints; only the events are lost, and the
//! client can re-read the thread's history.

use crate::controller::{RunOutcome, WorkflowController};
use crate::error::{GraphError, Result};
use crate::interrupt::ApprovalRequest;
use crate::state::WorkflowState;
use futures::Stream;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::mpsc;

const STREAM_BUFFER: usize = 64;

/// Internal step-by-step report from the controller
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionEvent {
    StateUpdated {
        node: String,
        changes: Value,
        checkpoint_id: String,
    },
    Suspended {
        node: String,
        request: ApprovalRequest,
        checkpoint_id: String,
    },
    Completed {
        response: String,
    },
    Failed {
        message: String,
        code: String,
    },
}

impl ExecutionEvent {
    pub fn failed(err: &GraphError) -> Self {
        ExecutionEvent::Failed {
            message: err.to_string(),
            code: err.code().to_string(),
        }
    }
}

/// Where the controller sends [`ExecutionEvent`]s; may be disconnected
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    tx: Option<mpsc::Sender<ExecutionEvent>>,
}

impl EventSink {
    /// Sink that drops every event
    pub fn none() -> Self {
        Self::default()
    }

    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<ExecutionEvent>) {
        let (tx, rx) = mpsc::channel(buffer);
        (Self { tx: Some(tx) }, rx)
    }

    pub async fn emit(&self, event: ExecutionEvent) {
        if let Some(tx) = &self.tx {
            if tx.send(event).await.is_err() {
                tracing::debug!("progress receiver dropped; run continues without events");
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProgressKind {
    StateUpdate,
    Interrupt,
    Complete,
    Error,
    End,
}

impl ProgressKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ProgressKind::StateUpdate => "state_update",
            ProgressKind::Interrupt => "interrupt",
            ProgressKind::Complete => "complete",
            ProgressKind::Error => "error",
            ProgressKind::End => "end",
        }
    }
}

/// Externally streamed unit of progress
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    #[serde(rename = "type")]
    pub kind: ProgressKind,
    pub thread_id: String,
    #[serde(default)]
    pub data: Value,
    pub sequence: u64,
    /// Checkpoint written by the transition this event reports
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checkpoint_id: Option<String>,
}

/// Numbers events for one call
#[derive(Debug)]
pub struct ProgressSequencer {
    thread_id: String,
    sequence: u64,
}

impl ProgressSequencer {
    pub fn new(thread_id: impl Into<String>) -> Self {
        Self {
            thread_id: thread_id.into(),
            sequence: 0,
        }
    }

    fn next(&mut self, kind: ProgressKind, data: Value, checkpoint_id: Option<String>) -> ProgressEvent {
        self.sequence += 1;
        ProgressEvent {
            kind,
            thread_id: self.thread_id.clone(),
            data,
            sequence: self.sequence,
            checkpoint_id,
        }
    }

    pub fn convert(&mut self, event: ExecutionEvent) -> ProgressEvent {
        match event {
            ExecutionEvent::StateUpdated {
                changes,
                checkpoint_id,
                ..
            } => self.next(ProgressKind::StateUpdate, changes, Some(checkpoint_id)),
            ExecutionEvent::Suspended {
                request,
                checkpoint_id,
                ..
            } => {
                let data = serde_json::to_value(&request).unwrap_or(Value::Null);
                self.next(ProgressKind::Interrupt, data, Some(checkpoint_id))
            }
            ExecutionEvent::Completed { response } => {
                self.next(ProgressKind::Complete, json!({ "response": response }), None)
            }
            ExecutionEvent::Failed { message, code } => self.next(
                ProgressKind::Error,
                json!({ "message": message, "code": code }),
                None,
            ),
        }
    }

    pub fn error(&mut self, message: impl Into<String>, code: &str) -> ProgressEvent {
        self.convert(ExecutionEvent::Failed {
            message: message.into(),
            code: code.to_string(),
        })
    }

    pub fn end(&mut self) -> ProgressEvent {
        self.next(ProgressKind::End, Value::Null, None)
    }
}

pub type ProgressStream = Pin<Box<dyn Stream<Item = ProgressEvent> + Send>>;

/// Run `run` on its own task and stream its events, always ending with `end`
pub fn run_streamed<F, Fut>(thread_id: String, run: F) -> ProgressStream
where
    F: FnOnce(EventSink) -> Fut + Send + 'static,
    Fut: Future<Output = Result<RunOutcome>> + Send + 'static,
{
    let (sink, mut rx) = EventSink::channel(STREAM_BUFFER);

    let task = tokio::spawn(async move {
        if let Err(err) = run(sink.clone()).await {
            sink.emit(ExecutionEvent::failed(&err)).await;
        }
    });

    Box::pin(async_stream::stream! {
        let mut sequencer = ProgressSequencer::new(thread_id);
        while let Some(event) = rx.recv().await {
            yield sequencer.convert(event);
        }
        if let Err(join_err) = task.await {
            tracing::error!(error = %join_err, "workflow task aborted");
            yield sequencer.error(format!("workflow task aborted: {}", join_err), "EXECUTION_FAILED");
        }
        yield sequencer.end();
    })
}

impl WorkflowController {
    /// Start a run and stream its progress
    pub fn stream_start(self: &Arc<Self>, state: WorkflowState) -> ProgressStream {
        let controller = Arc::clone(self);
        let thread_id = state.thread_id.clone();
        run_streamed(thread_id, move |sink| async move {
            controller.start(state, &sink).await
        })
    }

    /// Resume a suspended thread and stream its progress
    pub fn stream_resume(self: &Arc<Self>, thread_id: impl Into<String>, resume: Value) -> ProgressStream {
        let controller = Arc::clone(self);
        let thread_id = thread_id.into();
        let id = thread_id.clone();
        run_streamed(thread_id, move |sink| async move {
            controller.resume(&id, resume, &sink).await
        })
    }
}

//! Execution controller: drives threads through a compiled graph
//!
//! Each thread id is an independent state machine:
//!
//! ```text
//!            start                 suspend
//!   (none) ────────> RUNNING ─────────────────> SUSPENDED(node)
//!                     │  ^                          │
//!                     │  └──────── resume ──────────┘
//!                     v
//!                  TERMINAL
//! ```
//!
//! Every step runs one node, applies its patch, and appends a checkpoint
//! before anything is reported to the client. A suspending node instead
//! produces an interrupt checkpoint recording which node to re-enter, and
//! `resume` picks the run up from exactly that checkpoint.
//!
//! Calls for the same thread id are serialized by a per-thread async mutex;
//! calls for different thread ids run fully in parallel. The checkpoint
//! store's parent check backs this up across processes.

use crate::compiled::CompiledGraph;
use crate::error::{GraphError, Result};
use crate::graph::Transition;
use crate::interrupt::{ApprovalRequest, Decision};
use crate::node::{NodeContext, NodeId, NodeOutcome};
use crate::state::WorkflowState;
use crate::stream::{EventSink, ExecutionEvent};
use crate::tool::ToolCall;
use dashmap::DashMap;
use gateflow_checkpoint::{
    Checkpoint, CheckpointConfig, CheckpointMetadata, CheckpointSaver, CheckpointSource,
    CheckpointTuple,
};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

pub const DEFAULT_RECURSION_LIMIT: usize = 25;

#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Maximum node executions per `start` or `resume` call
    pub recursion_limit: usize,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            recursion_limit: DEFAULT_RECURSION_LIMIT,
        }
    }
}

/// Caller-supplied input for a new thread
#[derive(Debug, Clone, Default)]
pub struct StartInput {
    /// Generated when absent
    pub thread_id: Option<String>,
    pub user_id: String,
    pub message: String,
    /// Operations to run once approved; derived from the message when empty
    pub tool_calls: Vec<ToolCall>,
}

impl StartInput {
    pub fn new(user_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            message: message.into(),
            ..Self::default()
        }
    }

    pub fn with_thread_id(mut self, thread_id: impl Into<String>) -> Self {
        self.thread_id = Some(thread_id.into());
        self
    }

    pub fn with_tool_calls(mut self, tool_calls: Vec<ToolCall>) -> Self {
        self.tool_calls = tool_calls;
        self
    }

    /// Validate and turn into the thread's initial state
    pub fn into_state(self) -> Result<WorkflowState> {
        if self.user_id.trim().is_empty() {
            return Err(GraphError::Validation("userId is required".to_string()));
        }
        if self.message.trim().is_empty() {
            return Err(GraphError::Validation("message is required".to_string()));
        }
        let thread_id = match self.thread_id {
            Some(id) if id.trim().is_empty() => {
                return Err(GraphError::Validation("threadId must not be blank".to_string()))
            }
            Some(id) => id,
            None => Uuid::new_v4().to_string(),
        };
        if let Some(call) = self.tool_calls.iter().find(|c| c.name.trim().is_empty()) {
            return Err(GraphError::Validation(format!(
                "tool call {} has no name",
                call.id
            )));
        }

        Ok(WorkflowState::new(thread_id, self.user_id, self.message).with_tool_calls(self.tool_calls))
    }
}

/// How a `start` or `resume` call ended
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Suspended {
        node: NodeId,
        request: ApprovalRequest,
    },
    Completed {
        response: String,
    },
}

/// Where a thread stands, derived from its latest checkpoint
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunStatus {
    /// Between steps; `next` is the node that runs next
    Running { next: Option<NodeId> },
    Suspended {
        node: NodeId,
        request: ApprovalRequest,
    },
    Terminal { response: String },
}

impl RunStatus {
    fn label(&self) -> &'static str {
        match self {
            RunStatus::Running { .. } => "running",
            RunStatus::Suspended { .. } => "suspended",
            RunStatus::Terminal { .. } => "terminal",
        }
    }

    fn from_tuple(tuple: &CheckpointTuple) -> Result<Self> {
        let state: WorkflowState = serde_json::from_value(tuple.checkpoint.state.clone())?;
        let status = match (tuple.metadata.source, tuple.metadata.next.clone()) {
            (Some(CheckpointSource::Interrupt), Some(node)) => RunStatus::Suspended {
                node,
                request: ApprovalRequest::for_state(&state),
            },
            (_, None) => RunStatus::Terminal {
                response: state.response,
            },
            (_, next) => RunStatus::Running { next },
        };
        Ok(status)
    }
}

pub struct WorkflowController {
    graph: Arc<CompiledGraph>,
    saver: Arc<dyn CheckpointSaver>,
    config: ControllerConfig,
    /// One entry per thread with a call in flight or waiting
    locks: DashMap<String, Arc<Mutex<()>>>,
}

/// Exclusive access to one thread; drops its lock entry once nobody else wants it
struct ThreadGuard<'a> {
    locks: &'a DashMap<String, Arc<Mutex<()>>>,
    thread_id: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for ThreadGuard<'_> {
    fn drop(&mut self) {
        self.guard.take();
        // Waiters hold a clone, so a count of one means only the map is left.
        self.locks
            .remove_if(&self.thread_id, |_, lock| Arc::strong_count(lock) == 1);
    }
}

impl WorkflowController {
    pub fn new(graph: CompiledGraph, saver: Arc<dyn CheckpointSaver>) -> Self {
        Self::with_config(graph, saver, ControllerConfig::default())
    }

    pub fn with_config(
        graph: CompiledGraph,
        saver: Arc<dyn CheckpointSaver>,
        config: ControllerConfig,
    ) -> Self {
        Self {
            graph: Arc::new(graph),
            saver,
            config,
            locks: DashMap::new(),
        }
    }

    pub fn graph(&self) -> &CompiledGraph {
        &self.graph
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn saver(&self) -> &Arc<dyn CheckpointSaver> {
        &self.saver
    }

    async fn lock_thread(&self, thread_id: &str) -> ThreadGuard<'_> {
        let lock = self.locks.entry(thread_id.to_string()).or_default().clone();
        ThreadGuard {
            locks: &self.locks,
            thread_id: thread_id.to_string(),
            guard: Some(lock.lock_owned().await),
        }
    }

    /// Threads that currently have a call holding or awaiting their lock
    pub fn active_threads(&self) -> usize {
        self.locks.len()
    }

    /// Begin a new thread and run it until it suspends or terminates
    #[tracing::instrument(skip(self, state, sink), fields(thread_id = %state.thread_id))]
    pub async fn start(&self, state: WorkflowState, sink: &EventSink) -> Result<RunOutcome> {
        let _guard = self.lock_thread(&state.thread_id).await;

        self.check_new_thread(&state).await?;

        let entry = self.graph.entry().to_string();
        tracing::info!(graph = %self.graph.name(), "starting workflow");

        let parent = self
            .persist(
                &CheckpointConfig::for_thread(&state.thread_id),
                &state,
                CheckpointMetadata::new()
                    .with_source(CheckpointSource::Input)
                    .with_next(Some(entry.clone())),
            )
            .await?;

        self.run_from(state, parent, entry, None, sink).await
    }

    /// Feed an external value to the suspended node and continue the run
    #[tracing::instrument(skip(self, resume, sink))]
    pub async fn resume(&self, thread_id: &str, resume: Value, sink: &EventSink) -> Result<RunOutcome> {
        let _guard = self.lock_thread(thread_id).await;

        let (tuple, node) = self.suspended_checkpoint(thread_id).await?;
        let state: WorkflowState = serde_json::from_value(tuple.checkpoint.state.clone())?;
        if state.current_node != node {
            return Err(GraphError::Execution(format!(
                "checkpoint {} suspended at '{}' but state records '{}'",
                tuple.checkpoint_id(),
                node,
                state.current_node
            )));
        }

        tracing::info!(node = %node, "resuming workflow");
        self.run_from(state, tuple.config, node, Some(resume), sink).await
    }

    /// Typed form of [`resume`](Self::resume)
    pub async fn resume_with(
        &self,
        thread_id: &str,
        decision: Decision,
        sink: &EventSink,
    ) -> Result<RunOutcome> {
        self.resume(thread_id, Value::String(decision.as_str().to_string()), sink)
            .await
    }

    /// Read-only pre-flight for `start`
    ///
    /// Lets a transport reject a bad request before opening a stream. The
    /// check is repeated under the thread lock by [`start`](Self::start).
    pub async fn validate_start(&self, state: &WorkflowState) -> Result<()> {
        self.check_new_thread(state).await
    }

    /// Read-only pre-flight for `resume`
    pub async fn validate_resume(&self, thread_id: &str, resume: &Value) -> Result<Decision> {
        self.suspended_checkpoint(thread_id).await?;
        Decision::from_resume_value(resume).map_err(|err| GraphError::InvalidDecision {
            thread_id: thread_id.to_string(),
            reason: err.to_string(),
        })
    }

    pub async fn status(&self, thread_id: &str) -> Result<RunStatus> {
        let tuple = self.latest(thread_id).await?;
        RunStatus::from_tuple(&tuple)
    }

    /// Full checkpoint chain of a thread, oldest first
    pub async fn history(&self, thread_id: &str) -> Result<Vec<CheckpointTuple>> {
        validate_thread_id(thread_id)?;
        let history = self.saver.list_history(thread_id).await?;
        if history.is_empty() {
            return Err(GraphError::ThreadNotFound {
                thread_id: thread_id.to_string(),
            });
        }
        Ok(history)
    }

    /// Latest state snapshot of a thread
    pub async fn state(&self, thread_id: &str) -> Result<WorkflowState> {
        let tuple = self.latest(thread_id).await?;
        Ok(serde_json::from_value(tuple.checkpoint.state)?)
    }

    async fn latest(&self, thread_id: &str) -> Result<CheckpointTuple> {
        validate_thread_id(thread_id)?;
        self.saver
            .get_latest(thread_id)
            .await?
            .ok_or_else(|| GraphError::ThreadNotFound {
                thread_id: thread_id.to_string(),
            })
    }

    async fn check_new_thread(&self, state: &WorkflowState) -> Result<()> {
        validate_thread_id(&state.thread_id)?;
        if state.user_message.trim().is_empty() {
            return Err(GraphError::Validation("message is required".to_string()));
        }
        if self.saver.get_latest(&state.thread_id).await?.is_some() {
            return Err(GraphError::ThreadExists {
                thread_id: state.thread_id.clone(),
            });
        }
        Ok(())
    }

    async fn suspended_checkpoint(&self, thread_id: &str) -> Result<(CheckpointTuple, NodeId)> {
        let tuple = self.latest(thread_id).await?;
        match (tuple.metadata.source, tuple.metadata.next.clone()) {
            (Some(CheckpointSource::Interrupt), Some(node)) => Ok((tuple, node)),
            _ => {
                let status = RunStatus::from_tuple(&tuple)?;
                Err(GraphError::NotSuspended {
                    thread_id: thread_id.to_string(),
                    status: status.label().to_string(),
                })
            }
        }
    }

    async fn persist(
        &self,
        parent: &CheckpointConfig,
        state: &WorkflowState,
        metadata: CheckpointMetadata,
    ) -> Result<CheckpointConfig> {
        let checkpoint = Checkpoint::new(serde_json::to_value(state)?);
        let config = self.saver.put(parent, checkpoint, metadata).await?;
        Ok(config)
    }

    async fn run_from(
        &self,
        mut state: WorkflowState,
        mut parent: CheckpointConfig,
        mut node_id: NodeId,
        mut resume: Option<Value>,
        sink: &EventSink,
    ) -> Result<RunOutcome> {
        let limit = self.config.recursion_limit;
        let mut steps = 0usize;

        loop {
            if steps >= limit {
                tracing::error!(limit, node = %node_id, "step limit exceeded");
                return Err(GraphError::StepLimitExceeded {
                    thread_id: state.thread_id.clone(),
                    limit,
                });
            }
            steps += 1;

            let node = self
                .graph
                .node(&node_id)
                .cloned()
                .ok_or_else(|| GraphError::Execution(format!("node '{}' does not exist", node_id)))?;

            let ctx = NodeContext::new(&state.thread_id, steps).with_resume(resume.take());
            let resuming = ctx.is_resuming();

            tracing::debug!(node = %node_id, step = steps, resuming, "running node");
            let outcome = node.run(&state, &ctx).await.map_err(|err| match err {
                GraphError::NodeExecution { .. } => err,
                other => GraphError::node_execution(&node_id, other.to_string()),
            })?;

            let (patch, finished) = match outcome {
                NodeOutcome::Suspend(request) => {
                    if resuming {
                        // The resume value did not satisfy the node; the
                        // thread stays at its existing interrupt checkpoint.
                        return Err(GraphError::InvalidDecision {
                            thread_id: state.thread_id.clone(),
                            reason: format!("node '{}' is still waiting for a decision", node_id),
                        });
                    }

                    state.current_node = node_id.clone();
                    let config = self
                        .persist(
                            &parent,
                            &state,
                            CheckpointMetadata::new()
                                .with_source(CheckpointSource::Interrupt)
                                .with_node(&node_id)
                                .with_next(Some(node_id.clone())),
                        )
                        .await?;

                    tracing::info!(node = %node_id, risk_level = %request.risk_level, "workflow suspended");
                    sink.emit(ExecutionEvent::Suspended {
                        node: node_id.clone(),
                        request: request.clone(),
                        checkpoint_id: config.checkpoint_id.unwrap_or_default(),
                    })
                    .await;
                    return Ok(RunOutcome::Suspended {
                        node: node_id,
                        request,
                    });
                }
                NodeOutcome::Continue(patch) => (patch, false),
                NodeOutcome::Done(patch) => (patch, true),
            };

            let patch = patch.with_current_node(&node_id);
            state.apply(&patch);

            let transition = if finished || state.is_terminal() {
                Transition::End
            } else {
                self.graph.next(&node_id, &state)?
            };

            let source = if resuming {
                CheckpointSource::Resume
            } else {
                CheckpointSource::Loop
            };
            parent = self
                .persist(
                    &parent,
                    &state,
                    CheckpointMetadata::new()
                        .with_source(source)
                        .with_node(&node_id)
                        .with_next(transition.node().map(str::to_string)),
                )
                .await?;

            sink.emit(ExecutionEvent::StateUpdated {
                node: node_id.clone(),
                changes: serde_json::to_value(&patch)?,
                checkpoint_id: parent.checkpoint_id.clone().unwrap_or_default(),
            })
            .await;

            match transition {
                Transition::Next(next) => node_id = next,
                Transition::End => {
                    tracing::info!(node = %node_id, steps, "workflow completed");
                    sink.emit(ExecutionEvent::Completed {
                        response: state.response.clone(),
                    })
                    .await;
                    return Ok(RunOutcome::Completed {
                        response: state.response,
                    });
                }
            }
        }
    }
}

fn validate_thread_id(thread_id: &str) -> Result<()> {
    if thread_id.trim().is_empty() {
        return Err(GraphError::Validation("threadId is required".to_string()));
    }
    Ok(())
}

//! # gateflow-core - Resumable approval workflows
//!
//! `gateflow-core` runs requests through a small directed graph of nodes,
//! pausing for a human decision whenever a request is risky, and checkpointing
//! after every step so a paused run can be resumed later, even by another
//! process.
//!
//! ## Core Concepts
//!
//! - [`WorkflowState`] - the record carried through a run and snapshotted into
//!   every checkpoint
//! - [`Node`] - a named step returning a [`NodeOutcome`]: continue with a
//!   [`StatePatch`], suspend with an [`ApprovalRequest`], or finish
//! - [`StateGraph`] / [`CompiledGraph`] - nodes plus edges, validated to be
//!   acyclic with one entry point
//! - [`WorkflowController`] - owns state mutation, persists checkpoints through a
//!   [`CheckpointSaver`](gateflow_checkpoint::CheckpointSaver), and enforces the
//!   step limit and per-thread ordering
//! - [`ProgressStream`] - the numbered `state_update` / `interrupt` /
//!   `complete` / `error` / `end` events of one call
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use gateflow_checkpoint::InMemoryCheckpointSaver;
//! use gateflow_core::{
//!     approval_workflow, Decision, EventSink, KeywordClassifier, RunOutcome, StartInput,
//!     ToolRegistry, WorkflowController,
//! };
//! use std::sync::Arc;
//!
//! let graph = approval_workflow(
//!     Arc::new(KeywordClassifier::standard()?),
//!     Arc::new(ToolRegistry::new().with_fallback(my_tool)),
//! )?;
//! let controller = WorkflowController::new(graph, Arc::new(InMemoryCheckpointSaver::new()));
//!
//! let state = StartInput::new("user-1", "Delete all customer data").into_state()?;
//! let thread_id = state.thread_id.clone();
//! match controller.start(state, &EventSink::none()).await? {
//!     RunOutcome::Suspended { request, .. } => println!("{}", request.question),
//!     RunOutcome::Completed { response } => println!("{}", response),
//! }
//!
//! controller
//!     .resume_with(&thread_id, Decision::Approved, &EventSink::none())
//!     .await?;
//! ```

pub mod builder;
pub mod classifier;
pub mod compiled;
pub mod controller;
pub mod error;
pub mod graph;
pub mod interrupt;
pub mod node;
pub mod nodes;
pub mod state;
pub mod stream;
pub mod tool;
pub mod workflow;

pub use builder::StateGraph;
pub use classifier::{KeywordClassifier, RiskAssessment, RiskClassifier};
pub use compiled::CompiledGraph;
pub use controller::{ControllerConfig, RunOutcome, RunStatus, StartInput, WorkflowController};
pub use error::{GraphError, Result};
pub use graph::{Edge, Graph, Transition, END};
pub use interrupt::{ApprovalRequest, Decision, DecisionError};
pub use node::{FnNode, Node, NodeContext, NodeId, NodeOutcome};
pub use state::{RiskLevel, StatePatch, WorkflowState};
pub use stream::{EventSink, ExecutionEvent, ProgressEvent, ProgressKind, ProgressSequencer, ProgressStream};
pub use tool::{Tool, ToolCall, ToolCallResult, ToolError, ToolExecutor, ToolRegistry, ToolResult};
pub use workflow::{approval_workflow, route_after_approval};

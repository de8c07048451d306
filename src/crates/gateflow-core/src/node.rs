//! The [`Node`] trait and the directives nodes return to the controller

use crate::error::Result;
use crate::interrupt::ApprovalRequest;
use crate::state::{StatePatch, WorkflowState};
use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Name of a node within a graph
pub type NodeId = String;

/// What a node asks the controller to do next
#[derive(Debug, Clone, PartialEq)]
pub enum NodeOutcome {
    /// Apply the patch and follow the graph's edges
    Continue(StatePatch),
    /// Persist an interrupt checkpoint and pause until resumed
    Suspend(ApprovalRequest),
    /// Apply the patch and end the run regardless of outgoing edges
    Done(StatePatch),
}

/// Per-invocation context handed to a node
#[derive(Debug, Clone, Default)]
pub struct NodeContext {
    pub thread_id: String,
    /// 1-based count of node executions in the current start/resume call
    pub step: usize,
    /// Value supplied by `resume`; only set for the node that suspended
    pub resume: Option<Value>,
}

impl NodeContext {
    pub fn new(thread_id: impl Into<String>, step: usize) -> Self {
        Self {
            thread_id: thread_id.into(),
            step,
            resume: None,
        }
    }

    pub fn with_resume(mut self, resume: Option<Value>) -> Self {
        self.resume = resume;
        self
    }

    pub fn is_resuming(&self) -> bool {
        self.resume.is_some()
    }
}

/// A named step of a workflow graph
///
/// Nodes read the current state and return a [`NodeOutcome`]; they never
/// mutate state or persist anything themselves. Returning `Err` is an engine
/// failure that ends the run, so business-level failures should be folded
/// into the returned patch instead.
#[async_trait]
pub trait Node: Send + Sync {
    fn name(&self) -> &str;

    async fn run(&self, state: &WorkflowState, ctx: &NodeContext) -> Result<NodeOutcome>;
}

type NodeFn = dyn Fn(&WorkflowState, &NodeContext) -> Result<NodeOutcome> + Send + Sync;

/// Node backed by a synchronous closure
#[derive(Clone)]
pub struct FnNode {
    name: NodeId,
    func: Arc<NodeFn>,
}

impl FnNode {
    pub fn new<F>(name: impl Into<NodeId>, func: F) -> Self
    where
        F: Fn(&WorkflowState, &NodeContext) -> Result<NodeOutcome> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(func),
        }
    }

    /// Node that always continues with the given patch
    pub fn patch(name: impl Into<NodeId>, patch: StatePatch) -> Self {
        Self::new(name, move |_, _| Ok(NodeOutcome::Continue(patch.clone())))
    }
}

impl fmt::Debug for FnNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnNode").field("name", &self.name).finish()
    }
}

#[async_trait]
impl Node for FnNode {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, state: &WorkflowState, ctx: &NodeContext) -> Result<NodeOutcome> {
        (self.func)(state, ctx)
    }
}

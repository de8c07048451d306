//! The approval workflow's node library: classify, approval, execute, cancelled

use crate::classifier::RiskClassifier;
use crate::error::{GraphError, Result};
use crate::interrupt::{ApprovalRequest, Decision};
use crate::node::{Node, NodeContext, NodeOutcome};
use crate::state::{StatePatch, WorkflowState};
use crate::tool::{ToolCall, ToolCallResult, ToolExecutor};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;

pub const CLASSIFY: &str = "classify";
pub const APPROVAL: &str = "approval";
pub const EXECUTE: &str = "execute";
pub const CANCELLED: &str = "cancelled";

pub const CANCELLATION_MESSAGE: &str = "Operation cancelled: the request was rejected by the approver. No changes were made.";

/// Tool name used when no risk keyword identifies the operation
pub const DEFAULT_TOOL: &str = "query";

/// Sets the risk level and derives tool calls when the caller supplied none
pub struct ClassifyNode {
    classifier: Arc<dyn RiskClassifier>,
}

impl ClassifyNode {
    pub fn new(classifier: Arc<dyn RiskClassifier>) -> Self {
        Self { classifier }
    }
}

#[async_trait]
impl Node for ClassifyNode {
    fn name(&self) -> &str {
        CLASSIFY
    }

    async fn run(&self, state: &WorkflowState, _ctx: &NodeContext) -> Result<NodeOutcome> {
        let assessment = self.classifier.classify(&state.user_message);
        tracing::debug!(
            risk_level = %assessment.level,
            keyword = ?assessment.keyword,
            "classified request"
        );

        let mut patch = StatePatch::new()
            .with_risk_level(assessment.level)
            .with_approval_needed(assessment.level.requires_approval());

        if state.tool_calls.is_empty() {
            let name = assessment.keyword.as_deref().unwrap_or(DEFAULT_TOOL);
            patch = patch.with_tool_calls(vec![ToolCall::new(
                name,
                json!({ "request": state.user_message }),
            )]);
        }

        Ok(NodeOutcome::Continue(patch))
    }
}

/// Gate that pauses for a human decision when approval is needed
#[derive(Debug, Default)]
pub struct ApprovalNode;

#[async_trait]
impl Node for ApprovalNode {
    fn name(&self) -> &str {
        APPROVAL
    }

    async fn run(&self, state: &WorkflowState, ctx: &NodeContext) -> Result<NodeOutcome> {
        if !state.approval_needed {
            return Ok(NodeOutcome::Continue(StatePatch::new().with_approved(true)));
        }

        let Some(value) = &ctx.resume else {
            return Ok(NodeOutcome::Suspend(ApprovalRequest::for_state(state)));
        };

        match Decision::from_resume_value(value) {
            Ok(decision) => {
                tracing::info!(decision = %decision, "approval decision recorded");
                Ok(NodeOutcome::Continue(
                    StatePatch::new().with_approved(decision.is_approved()),
                ))
            }
            Err(err) => {
                tracing::warn!(error = %err, "ignoring unusable decision, suspending again");
                Ok(NodeOutcome::Suspend(ApprovalRequest::for_state(state)))
            }
        }
    }
}

/// Runs approved tool calls through the executor and summarizes the results
pub struct ExecuteNode {
    executor: Arc<dyn ToolExecutor>,
}

impl ExecuteNode {
    pub fn new(executor: Arc<dyn ToolExecutor>) -> Self {
        Self { executor }
    }
}

#[async_trait]
impl Node for ExecuteNode {
    fn name(&self) -> &str {
        EXECUTE
    }

    async fn run(&self, state: &WorkflowState, _ctx: &NodeContext) -> Result<NodeOutcome> {
        if state.approved != Some(true) {
            return Err(GraphError::node_execution(
                EXECUTE,
                format!("reached without approval (approved = {:?})", state.approved),
            ));
        }

        let total = state.tool_calls.len();
        let mut results = Vec::with_capacity(total);
        let mut failure = None;

        // Stop at the first failure; later calls may depend on earlier ones.
        for call in &state.tool_calls {
            match self.executor.execute(call).await {
                Ok(output) => results.push(ToolCallResult::success(call, output)),
                Err(err) => {
                    tracing::warn!(tool = %call.name, error = %err, "tool call failed");
                    results.push(ToolCallResult::failure(call, &err));
                    failure = Some(err);
                    break;
                }
            }
        }

        let response = match failure {
            Some(err) => format!(
                "Operation failed: {}. Completed {} of {} operation(s) before the failure.",
                err,
                results.len() - 1,
                total
            ),
            None => summarize(&results),
        };

        Ok(NodeOutcome::Done(
            StatePatch::new()
                .with_tool_results(results)
                .with_response(response),
        ))
    }
}

fn summarize(results: &[ToolCallResult]) -> String {
    if results.is_empty() {
        return "Request approved. There were no operations to run.".to_string();
    }
    let lines: Vec<String> = results
        .iter()
        .map(|r| format!("- {}: {}", r.name, r.output))
        .collect();
    format!(
        "Completed {} operation(s):\n{}",
        results.len(),
        lines.join("\n")
    )
}

/// Terminal node for rejected requests
#[derive(Debug, Default)]
pub struct CancelledNode;

#[async_trait]
impl Node for CancelledNode {
    fn name(&self) -> &str {
        CANCELLED
    }

    async fn run(&self, _state: &WorkflowState, _ctx: &NodeContext) -> Result<NodeOutcome> {
        Ok(NodeOutcome::Done(
            StatePatch::new().with_response(CANCELLATION_MESSAGE),
        ))
    }
}

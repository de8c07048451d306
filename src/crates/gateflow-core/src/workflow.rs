//! The approval workflow: classify, then gate on risk, then execute or cancel

use crate::builder::StateGraph;
use crate::classifier::RiskClassifier;
use crate::compiled::CompiledGraph;
use crate::error::Result;
use crate::nodes::{
    ApprovalNode, CancelledNode, ClassifyNode, ExecuteNode, APPROVAL, CANCELLED, CLASSIFY, EXECUTE,
};
use crate::state::WorkflowState;
use crate::tool::ToolExecutor;
use std::sync::Arc;

pub const APPROVAL_WORKFLOW: &str = "approval";

/// Branch taken out of the approval gate
///
/// Execution requires an explicit approval, or no approval being needed at
/// all. Everything else, including a missing decision, goes to `cancelled`.
pub fn route_after_approval(state: &WorkflowState) -> String {
    let proceed = match state.approved {
        Some(approved) => approved,
        None => !state.approval_needed,
    };
    let branch = if proceed { EXECUTE } else { CANCELLED };
    branch.to_string()
}

/// Build and compile the four-node approval workflow
pub fn approval_workflow(
    classifier: Arc<dyn RiskClassifier>,
    executor: Arc<dyn ToolExecutor>,
) -> Result<CompiledGraph> {
    let mut graph = StateGraph::new(APPROVAL_WORKFLOW);
    graph
        .add_node(ClassifyNode::new(classifier))
        .add_node(ApprovalNode)
        .add_node(ExecuteNode::new(executor))
        .add_node(CancelledNode)
        .set_entry(CLASSIFY)
        .add_edge(CLASSIFY, APPROVAL)
        .add_conditional_edge(
            APPROVAL,
            route_after_approval,
            [(EXECUTE, EXECUTE), (CANCELLED, CANCELLED)],
        )
        .add_finish(EXECUTE)
        .add_finish(CANCELLED);
    graph.compile()
}

//! Workflow state and the partial updates nodes produce
//!
//! [`WorkflowState`] is the record carried through a run and snapshotted into
//! every checkpoint. Nodes never mutate it directly: they return a
//! [`StatePatch`] naming only the fields they change, and the controller
//! applies the patch before persisting. The serialized patch is also what
//! `state_update` progress events carry.

use crate::tool::{ToolCall, ToolCallResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse risk category of a request
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    /// Medium and high risk requests wait for a human decision
    pub fn requires_approval(self) -> bool {
        self != RiskLevel::Low
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Full state of one workflow thread
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowState {
    pub thread_id: String,

    #[serde(default)]
    pub user_id: String,

    pub user_message: String,

    /// Unset until the classify node has run
    #[serde(default)]
    pub risk_level: Option<RiskLevel>,

    #[serde(default)]
    pub approval_needed: bool,

    /// `None` until a decision is recorded
    #[serde(default)]
    pub approved: Option<bool>,

    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,

    #[serde(default)]
    pub tool_results: Vec<ToolCallResult>,

    /// Final user-facing message; non-empty only once the run is terminal
    #[serde(default)]
    pub response: String,

    /// Last node that produced a checkpoint
    #[serde(default)]
    pub current_node: String,
}

impl WorkflowState {
    pub fn new(
        thread_id: impl Into<String>,
        user_id: impl Into<String>,
        user_message: impl Into<String>,
    ) -> Self {
        Self {
            thread_id: thread_id.into(),
            user_id: user_id.into(),
            user_message: user_message.into(),
            ..Self::default()
        }
    }

    pub fn with_tool_calls(mut self, tool_calls: Vec<ToolCall>) -> Self {
        self.tool_calls = tool_calls;
        self
    }

    pub fn is_terminal(&self) -> bool {
        !self.response.is_empty()
    }

    pub fn apply(&mut self, patch: &StatePatch) {
        if let Some(level) = patch.risk_level {
            self.risk_level = Some(level);
        }
        if let Some(needed) = patch.approval_needed {
            self.approval_needed = needed;
        }
        if let Some(approved) = patch.approved {
            self.approved = Some(approved);
        }
        if let Some(calls) = &patch.tool_calls {
            self.tool_calls = calls.clone();
        }
        if let Some(results) = &patch.tool_results {
            self.tool_results = results.clone();
        }
        if let Some(response) = &patch.response {
            self.response = response.clone();
        }
        if let Some(node) = &patch.current_node {
            self.current_node = node.clone();
        }
    }
}

/// Fields a node changed; `None` means untouched
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StatePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk_level: Option<RiskLevel>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub approval_needed: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub approved: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_results: Option<Vec<ToolCallResult>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_node: Option<String>,
}

impl StatePatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_risk_level(mut self, level: RiskLevel) -> Self {
        self.risk_level = Some(level);
        self
    }

    pub fn with_approval_needed(mut self, needed: bool) -> Self {
        self.approval_needed = Some(needed);
        self
    }

    pub fn with_approved(mut self, approved: bool) -> Self {
        self.approved = Some(approved);
        self
    }

    pub fn with_tool_calls(mut self, calls: Vec<ToolCall>) -> Self {
        self.tool_calls = Some(calls);
        self
    }

    pub fn with_tool_results(mut self, results: Vec<ToolCallResult>) -> Self {
        self.tool_results = Some(results);
        self
    }

    pub fn with_response(mut self, response: impl Into<String>) -> Self {
        self.response = Some(response.into());
        self
    }

    pub fn with_current_node(mut self, node: impl Into<String>) -> Self {
        self.current_node = Some(node.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

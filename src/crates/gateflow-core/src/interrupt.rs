//! Human-in-the-loop pause payloads and resume decisions
//!
//! When the `approval` node needs a human, it returns an [`ApprovalRequest`]
//! instead of a state patch. The controller persists an interrupt checkpoint
//! and stops; the request itself is never stored separately because
//! [`ApprovalRequest::for_state`] rebuilds it from the checkpointed state.
//!
//! Resuming supplies a JSON value that must be a tagged [`Decision`]:
//!
//! ```text
//! "APPROVED"  -> approved = true
//! "REJECTED"  -> approved = false
//! true / false / null / ""  -> rejected, the node suspends again
//! ```
//!
//! Bare booleans are refused so that "no decision yet" can never be confused
//! with "decision is false".

use crate::state::{RiskLevel, WorkflowState};
use crate::tool::ToolCall;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Payload surfaced to the client while a thread is suspended
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalRequest {
    pub question: String,
    pub risk_level: RiskLevel,
    pub operation_summary: String,
    pub tool_calls: Vec<ToolCall>,
}

impl ApprovalRequest {
    pub fn for_state(state: &WorkflowState) -> Self {
        let risk_level = state.risk_level.unwrap_or(RiskLevel::High);
        let operations = if state.tool_calls.is_empty() {
            "no operations".to_string()
        } else {
            state
                .tool_calls
                .iter()
                .map(|call| call.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        };

        Self {
            question: format!(
                "This request is classified as {} risk. Do you approve running it?",
                risk_level
            ),
            risk_level,
            operation_summary: format!(
                "{} operation(s) requested ({}) for: \"{}\"",
                state.tool_calls.len(),
                operations,
                state.user_message
            ),
            tool_calls: state.tool_calls.clone(),
        }
    }
}

/// Explicit approval decision supplied on resume
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    Approved,
    Rejected,
}

impl Decision {
    pub fn is_approved(self) -> bool {
        self == Decision::Approved
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Decision::Approved => "APPROVED",
            Decision::Rejected => "REJECTED",
        }
    }

    /// Interpret a raw resume value
    pub fn from_resume_value(value: &Value) -> Result<Self, DecisionError> {
        match value {
            Value::Null => Err(DecisionError::Missing),
            Value::String(s) => s.parse(),
            other => Err(DecisionError::Malformed(format!(
                "expected \"APPROVED\" or \"REJECTED\", got {}",
                other
            ))),
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Decision {
    type Err = DecisionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tag = s.trim();
        if tag.is_empty() {
            return Err(DecisionError::Missing);
        }
        if tag.eq_ignore_ascii_case("APPROVED") {
            Ok(Decision::Approved)
        } else if tag.eq_ignore_ascii_case("REJECTED") {
            Ok(Decision::Rejected)
        } else {
            Err(DecisionError::Malformed(format!(
                "expected \"APPROVED\" or \"REJECTED\", got \"{}\"",
                tag
            )))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecisionError {
    #[error("no decision supplied")]
    Missing,

    #[error("malformed decision: {0}")]
    Malformed(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decision_parsing() {
        assert_eq!(Decision::from_resume_value(&json!("APPROVED")), Ok(Decision::Approved));
        assert_eq!(Decision::from_resume_value(&json!(" rejected ")), Ok(Decision::Rejected));
        assert_eq!(Decision::from_resume_value(&json!(null)), Err(DecisionError::Missing));
        assert_eq!(Decision::from_resume_value(&json!("")), Err(DecisionError::Missing));
    }

    #[test]
    fn test_bare_booleans_are_refused() {
        assert!(matches!(
            Decision::from_resume_value(&json!(false)),
            Err(DecisionError::Malformed(_))
        ));
        assert!(matches!(
            Decision::from_resume_value(&json!(true)),
            Err(DecisionError::Malformed(_))
        ));
        assert!(matches!(
            Decision::from_resume_value(&json!("yes")),
            Err(DecisionError::Malformed(_))
        ));
    }

    #[test]
    fn test_decision_wire_format() {
        assert_eq!(serde_json::to_value(Decision::Approved).unwrap(), json!("APPROVED"));
        assert_eq!(Decision::Rejected.to_string(), "REJECTED");
        assert!(Decision::Approved.is_approved());
    }

    #[test]
    fn test_request_for_state() {
        let mut state = WorkflowState::new("t-1", "u-1", "Delete all customer data")
            .with_tool_calls(vec![ToolCall::new("delete", json!({}))]);
        state.risk_level = Some(RiskLevel::High);

        let request = ApprovalRequest::for_state(&state);
        assert_eq!(request.risk_level, RiskLevel::High);
        assert!(request.question.contains("high risk"));
        assert!(request.operation_summary.contains("delete"));
        assert!(request.operation_summary.contains("Delete all customer data"));
        assert_eq!(request.tool_calls, state.tool_calls);

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["riskLevel"], "high");
        assert!(value.get("operationSummary").is_some());
    }
}

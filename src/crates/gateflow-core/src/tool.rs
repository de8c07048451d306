//! Tool calls and the executor seam used by the `execute` node
//!
//! A [`ToolCall`] is a named operation with JSON arguments. The workflow never
//! performs side effects itself: the `execute` node hands each approved call
//! to a [`ToolExecutor`]. Two executors ship with the engine:
//!
//! - [`ToolRegistry`] - in-process tools built from async closures, with an
//!   optional fallback for names nobody registered
//! - an HTTP executor in the server crate that forwards calls to a backend
//!
//! ```rust,ignore
//! use gateflow_core::tool::{Tool, ToolRegistry};
//! use serde_json::json;
//!
//! let registry = ToolRegistry::new()
//!     .with_tool(Tool::new("delete", "Delete a record", |args| async move {
//!         Ok(json!({ "deleted": args["request"] }))
//!     }));
//! ```

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use uuid::Uuid;

/// Request to run one named operation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    /// Correlates the call with its result
    #[serde(default = "generate_call_id")]
    pub id: String,

    pub name: String,

    #[serde(default)]
    pub args: Value,
}

fn generate_call_id() -> String {
    format!("call_{}", Uuid::new_v4().simple())
}

impl ToolCall {
    pub fn new(name: impl Into<String>, args: Value) -> Self {
        Self {
            id: generate_call_id(),
            name: name.into(),
            args,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }
}

/// Outcome of one executed call, kept in workflow state for auditing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallResult {
    pub call_id: String,
    pub name: String,
    pub success: bool,
    /// Tool output on success, `{"error": ...}` on failure
    pub output: Value,
}

impl ToolCallResult {
    pub fn success(call: &ToolCall, output: Value) -> Self {
        Self {
            call_id: call.id.clone(),
            name: call.name.clone(),
            success: true,
            output,
        }
    }

    pub fn failure(call: &ToolCall, error: &ToolError) -> Self {
        Self {
            call_id: call.id.clone(),
            name: call.name.clone(),
            success: false,
            output: serde_json::json!({ "error": error.to_string() }),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Tool '{0}' not found. Available tools: {1}")]
    ToolNotFound(String, String),

    #[error("Invalid arguments for tool '{tool}': {error}")]
    InvalidArguments { tool: String, error: String },

    #[error("Tool '{tool}' execution failed: {error}")]
    ExecutionFailed { tool: String, error: String },

    /// The executor could not reach whatever performs the operation
    #[error("Tool '{tool}' unavailable: {error}")]
    Unavailable { tool: String, error: String },
}

pub type ToolResult = std::result::Result<Value, ToolError>;

/// Performs approved tool calls
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    async fn execute(&self, call: &ToolCall) -> ToolResult;
}

type ToolHandler = Arc<dyn Fn(Value) -> BoxFuture<'static, ToolResult> + Send + Sync>;

/// An in-process tool backed by an async closure
#[derive(Clone)]
pub struct Tool {
    pub name: String,
    pub description: String,
    handler: ToolHandler,
}

impl Tool {
    pub fn new<F, Fut>(name: impl Into<String>, description: impl Into<String>, handler: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ToolResult> + Send + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            handler: Arc::new(move |args| Box::pin(handler(args))),
        }
    }

    pub async fn invoke(&self, args: Value) -> ToolResult {
        (self.handler)(args).await
    }
}

impl fmt::Debug for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tool")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish()
    }
}

/// Name-indexed set of in-process tools
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Tool>,
    fallback: Option<Tool>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: Tool) {
        self.tools.insert(tool.name.clone(), tool);
    }

    pub fn with_tool(mut self, tool: Tool) -> Self {
        self.register(tool);
        self
    }

    /// Tool invoked for calls whose name is not registered
    pub fn with_fallback(mut self, tool: Tool) -> Self {
        self.fallback = Some(tool);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Tool> {
        self.tools.get(name)
    }

    pub fn tool_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    fn validate_args(call: &ToolCall) -> Result<(), ToolError> {
        match &call.args {
            Value::Object(_) | Value::Null => Ok(()),
            other => Err(ToolError::InvalidArguments {
                tool: call.name.clone(),
                error: format!("expected a JSON object, got {}", other),
            }),
        }
    }
}

#[async_trait]
impl ToolExecutor for ToolRegistry {
    async fn execute(&self, call: &ToolCall) -> ToolResult {
        Self::validate_args(call)?;

        let tool = self
            .tools
            .get(&call.name)
            .or(self.fallback.as_ref())
            .ok_or_else(|| {
                ToolError::ToolNotFound(call.name.clone(), self.tool_names().join(", "))
            })?;

        tracing::debug!(tool = %call.name, call_id = %call.id, "invoking tool");
        tool.invoke(call.args.clone()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn echo(name: &str) -> Tool {
        let tool_name = name.to_string();
        Tool::new(name, "echo arguments", move |args| {
            let tool_name = tool_name.clone();
            async move { Ok(json!({ "tool": tool_name, "args": args })) }
        })
    }

    #[test]
    fn test_tool_call_deserialize_generates_id() {
        let call: ToolCall = serde_json::from_value(json!({ "name": "delete" })).unwrap();
        assert!(call.id.starts_with("call_"));
        assert_eq!(call.args, Value::Null);
    }

    #[tokio::test]
    async fn test_registry_dispatches_by_name() {
        let registry = ToolRegistry::new().with_tool(echo("delete")).with_tool(echo("query"));

        let output = registry
            .execute(&ToolCall::new("delete", json!({ "id": 7 })))
            .await
            .unwrap();
        assert_eq!(output["tool"], "delete");
        assert_eq!(output["args"]["id"], 7);
        assert_eq!(registry.tool_names(), vec!["delete", "query"]);
    }

    #[tokio::test]
    async fn test_registry_unknown_tool() {
        let registry = ToolRegistry::new().with_tool(echo("query"));
        let err = registry
            .execute(&ToolCall::new("drop", json!({})))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::ToolNotFound(ref name, _) if name == "drop"));
    }

    #[tokio::test]
    async fn test_registry_fallback() {
        let registry = ToolRegistry::new().with_fallback(echo("fallback"));
        let output = registry
            .execute(&ToolCall::new("anything", json!({})))
            .await
            .unwrap();
        assert_eq!(output["tool"], "fallback");
    }

    #[tokio::test]
    async fn test_registry_rejects_non_object_args() {
        let registry = ToolRegistry::new().with_tool(echo("query"));
        let err = registry
            .execute(&ToolCall::new("query", json!([1, 2])))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments { .. }));
    }

    #[test]
    fn test_call_result_failure_output() {
        let call = ToolCall::new("delete", json!({})).with_id("call_1");
        let err = ToolError::ExecutionFailed {
            tool: "delete".to_string(),
            error: "locked".to_string(),
        };
        let result = ToolCallResult::failure(&call, &err);
        assert!(!result.success);
        assert_eq!(result.call_id, "call_1");
        assert_eq!(result.output["error"], "Tool 'delete' execution failed: locked");
    }
}

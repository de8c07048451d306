//! HTTP tool backend
//!
//! Approved tool calls are forwarded as `POST {base_url}/tools/{name}` with
//! the call as JSON body. A 2xx JSON response is the tool's output; anything
//! else is reported as a tool failure, which the workflow records in its
//! response rather than treating as an engine error. No retries happen here.

use async_trait::async_trait;
use gateflow_core::tool::{ToolCall, ToolError, ToolExecutor, ToolResult};
use reqwest::Url;
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ToolClientError {
    #[error("Invalid tool backend URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error(transparent)]
    Client(#[from] reqwest::Error),
}

#[derive(Debug, Clone)]
pub struct HttpToolExecutor {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpToolExecutor {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ToolClientError> {
        let invalid = |reason: String| ToolClientError::InvalidUrl {
            url: base_url.to_string(),
            reason,
        };
        let parsed = Url::parse(base_url).map_err(|e| invalid(e.to_string()))?;
        if parsed.cannot_be_a_base() {
            return Err(invalid("not a hierarchical URL".to_string()));
        }

        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: parsed,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// `{base_url}/tools/{name}` with the name as a single encoded path segment
    fn endpoint(&self, call: &ToolCall) -> Result<Url, ToolError> {
        if matches!(call.name.as_str(), "." | "..") {
            return Err(ToolError::InvalidArguments {
                tool: call.name.clone(),
                error: "tool name is not a valid path segment".to_string(),
            });
        }

        let mut url = self.base_url.clone();
        url.set_query(None);
        url.set_fragment(None);
        url.path_segments_mut()
            .map_err(|_| ToolError::Unavailable {
                tool: call.name.clone(),
                error: format!("backend URL {} cannot take a path", self.base_url),
            })?
            .pop_if_empty()
            .push("tools")
            .push(&call.name);
        Ok(url)
    }
}

#[async_trait]
impl ToolExecutor for HttpToolExecutor {
    async fn execute(&self, call: &ToolCall) -> ToolResult {
        let url = self.endpoint(call)?;
        tracing::debug!(tool = %call.name, call_id = %call.id, url = %url, "calling tool backend");

        let response = self
            .client
            .post(url)
            .json(&json!({ "id": call.id, "name": call.name, "args": call.args }))
            .send()
            .await
            .map_err(|e| ToolError::Unavailable {
                tool: call.name.clone(),
                error: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ToolError::ExecutionFailed {
                tool: call.name.clone(),
                error: format!("backend returned {}: {}", status, body.trim()),
            });
        }

        response.json::<Value>().await.map_err(|e| ToolError::ExecutionFailed {
            tool: call.name.clone(),
            error: format!("invalid response body: {}", e),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::Path, http::StatusCode, routing::post, Json, Router};

    async fn spawn_backend() -> String {
        async fn handle(Path(name): Path<String>, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
            if name == "explode" {
                return (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": "boom" })));
            }
            (StatusCode::OK, Json(json!({ "tool": name, "received": body })))
        }

        let app = Router::new().route("/tools/:name", post(handle));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/", addr)
    }

    #[tokio::test]
    async fn test_successful_call() {
        let base = spawn_backend().await;
        let executor = HttpToolExecutor::new(&base, Duration::from_secs(5)).unwrap();

        let call = ToolCall::new("delete", json!({ "request": "Delete all customer data" }));
        let output = executor.execute(&call).await.unwrap();

        assert_eq!(output["tool"], "delete");
        assert_eq!(output["received"]["id"], call.id.as_str());
        assert_eq!(output["received"]["args"]["request"], "Delete all customer data");
    }

    #[tokio::test]
    async fn test_backend_error_status() {
        let base = spawn_backend().await;
        let executor = HttpToolExecutor::new(&base, Duration::from_secs(5)).unwrap();

        let err = executor
            .execute(&ToolCall::new("explode", json!({})))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::ExecutionFailed { ref error, .. } if error.contains("500")));
    }

    #[tokio::test]
    async fn test_unreachable_backend() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let executor =
            HttpToolExecutor::new(&format!("http://{}", addr), Duration::from_secs(2)).unwrap();
        let err = executor
            .execute(&ToolCall::new("query", json!({})))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Unavailable { .. }));
    }

    #[test]
    fn test_endpoint_keeps_name_inside_tools_prefix() {
        let executor =
            HttpToolExecutor::new("http://backend.local/api", Duration::from_secs(5)).unwrap();

        let url = executor
            .endpoint(&ToolCall::new("../../admin/purge?all=1", json!({})))
            .unwrap();
        assert!(url.path().starts_with("/api/tools/"), "{}", url);
        assert_eq!(url.path_segments().unwrap().count(), 3);
        assert!(url.query().is_none());

        let url = executor.endpoint(&ToolCall::new("lookup", json!({}))).unwrap();
        assert_eq!(url.as_str(), "http://backend.local/api/tools/lookup");
    }

    #[test]
    fn test_endpoint_with_trailing_slash_and_dot_names() {
        let executor = HttpToolExecutor::new("http://backend.local/", Duration::from_secs(5)).unwrap();
        let url = executor.endpoint(&ToolCall::new("delete", json!({}))).unwrap();
        assert_eq!(url.as_str(), "http://backend.local/tools/delete");

        let err = executor.endpoint(&ToolCall::new("..", json!({}))).unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments { .. }));
    }

    #[test]
    fn test_invalid_base_url() {
        let err = HttpToolExecutor::new("not a url", Duration::from_secs(5)).unwrap_err();
        assert!(matches!(err, ToolClientError::InvalidUrl { .. }));
    }
}

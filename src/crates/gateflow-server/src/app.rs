//! Wiring from configuration to a ready [`AppState`]

use gateflow_checkpoint::{CheckpointError, CheckpointSaver, InMemoryCheckpointSaver, SqliteCheckpointSaver};
use gateflow_core::{
    approval_workflow, ControllerConfig, GraphError, KeywordClassifier, Tool, ToolExecutor,
    ToolRegistry, WorkflowController,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::api::AppState;
use crate::config::{ServerConfig, ServerConfigError};
use crate::tool_client::{HttpToolExecutor, ToolClientError};

/// Startup failures
#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Config(#[from] ServerConfigError),
    #[error("Checkpoint store: {0}")]
    Checkpoint(#[from] CheckpointError),
    #[error("Workflow: {0}")]
    Graph(#[from] GraphError),
    #[error("Tool backend client: {0}")]
    ToolClient(#[from] ToolClientError),
}

pub async fn build_saver(config: &ServerConfig) -> Result<Arc<dyn CheckpointSaver>, ServerError> {
    match &config.database.url {
        Some(url) => {
            tracing::info!("Connecting to checkpoint database: {}", url);
            let saver = SqliteCheckpointSaver::connect(url).await?;
            saver.health_check().await?;
            Ok(Arc::new(saver))
        }
        None => {
            tracing::warn!("No database.url configured; checkpoints are kept in memory and lost on restart");
            Ok(Arc::new(InMemoryCheckpointSaver::new()))
        }
    }
}

/// Tool backend from `[tools]`
///
/// Without a backend URL every approved call is acknowledged in-process and
/// echoes its arguments back.
pub fn build_executor(config: &ServerConfig) -> Result<Arc<dyn ToolExecutor>, ServerError> {
    match &config.tools.backend_url {
        Some(url) => {
            tracing::info!("Forwarding tool calls to {}", url);
            let timeout = Duration::from_secs(config.tools.timeout_secs);
            Ok(Arc::new(HttpToolExecutor::new(url.as_str(), timeout)?))
        }
        None => {
            tracing::warn!("No tools.backend_url configured; tool calls are acknowledged in-process");
            let registry = ToolRegistry::new().with_fallback(Tool::new(
                "acknowledge",
                "Record the operation without side effects",
                |args| async move { Ok(json!({ "acknowledged": true, "args": args })) },
            ));
            Ok(Arc::new(registry))
        }
    }
}

pub fn build_classifier(config: &ServerConfig) -> Result<KeywordClassifier, ServerError> {
    Ok(KeywordClassifier::new(
        config.classifier.high_risk_keywords.clone(),
        config.classifier.medium_risk_keywords.clone(),
    )?)
}

/// Assemble the controller and router state
pub async fn build_state(config: &ServerConfig) -> Result<AppState, ServerError> {
    let saver = build_saver(config).await?;
    let executor = build_executor(config)?;
    let classifier = build_classifier(config)?;

    let graph = approval_workflow(Arc::new(classifier), executor)?;
    let controller = WorkflowController::with_config(
        graph,
        saver,
        ControllerConfig {
            recursion_limit: config.engine.recursion_limit,
        },
    );

    Ok(AppState::new(Arc::new(controller), config.server.name.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateflow_core::{ToolCall, ToolExecutor};

    #[tokio::test]
    async fn test_build_state_with_defaults() {
        let state = build_state(&ServerConfig::default()).await.unwrap();
        assert_eq!(state.name, "gateflow");
        assert_eq!(state.controller.config().recursion_limit, 25);
    }

    #[tokio::test]
    async fn test_build_state_with_sqlite() {
        let config = ServerConfig::from_toml_str(
            "[database]\nurl = \"sqlite::memory:\"\n[engine]\nrecursion_limit = 10",
        )
        .unwrap();
        let state = build_state(&config).await.unwrap();
        assert_eq!(state.controller.config().recursion_limit, 10);
    }

    #[tokio::test]
    async fn test_fallback_executor_acknowledges() {
        let executor = build_executor(&ServerConfig::default()).unwrap();
        let output = executor
            .execute(&ToolCall::new("anything", json!({ "k": 1 })))
            .await
            .unwrap();
        assert_eq!(output["acknowledged"], true);
        assert_eq!(output["args"]["k"], 1);
    }
}

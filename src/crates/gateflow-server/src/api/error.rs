//! API error types and HTTP response conversion
//!
//! Engine errors are mapped onto HTTP status codes here, before any stream is
//! opened. Errors that happen mid-run are reported as `error` events instead.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use gateflow_core::GraphError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// API error response structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorResponse {
    /// Error type identifier
    pub error: String,
    /// Human-readable error message
    pub message: String,
    /// Error code for programmatic handling
    pub code: String,
}

impl ApiErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            code: code.into(),
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Request body could not be read as JSON of the expected shape
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Engine error carried with its own code
    #[error("{0}")]
    Workflow(GraphError),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Workflow(err) => match err {
                GraphError::ThreadNotFound { .. } => StatusCode::NOT_FOUND,
                GraphError::ThreadExists { .. } | GraphError::NotSuspended { .. } => {
                    StatusCode::CONFLICT
                }
                GraphError::Validation(_) | GraphError::InvalidDecision { .. } => {
                    StatusCode::UNPROCESSABLE_ENTITY
                }
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::Workflow(err) => err.code(),
        }
    }

    pub fn error_type(&self) -> &'static str {
        match self.status_code() {
            StatusCode::BAD_REQUEST => "BadRequest",
            StatusCode::NOT_FOUND => "NotFound",
            StatusCode::CONFLICT => "Conflict",
            StatusCode::UNPROCESSABLE_ENTITY => "ValidationError",
            _ => "InternalError",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ApiErrorResponse::new(self.error_type(), self.to_string(), self.code());

        if status.is_server_error() {
            tracing::error!("API Error: {:?}", body);
        } else {
            tracing::debug!("API Error: {:?}", body);
        }

        (status, Json(body)).into_response()
    }
}

impl From<GraphError> for ApiError {
    fn from(err: GraphError) -> Self {
        ApiError::Workflow(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

//! HTTP boundary
//!
//! - `POST /workflow/start` and `POST /workflow/resume` stream progress as SSE
//! - `GET /workflow/{threadId}` and `GET /workflow/{threadId}/history` read checkpoints
//! - `GET /health`

pub mod error;
pub mod handlers;
pub mod models;
pub mod routes;

pub use error::{ApiError, ApiErrorResponse, ApiResult};
pub use routes::{create_router, AppState};

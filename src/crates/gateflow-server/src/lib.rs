//! # gateflow-server
//!
//! HTTP front end for [`gateflow_core`]: starts and resumes approval workflows,
//! streams their progress as server-sent events and serves checkpoint history.
//!
//! ```rust,ignore
//! let config = ServerConfig::load(None)?;
//! let state = app::build_state(&config).await?;
//! let router = api::create_router(state);
//! ```

pub mod api;
pub mod app;
pub mod config;
pub mod tool_client;

pub use app::ServerError;
pub use config::{ServerConfig, ServerConfigError};
pub use tool_client::{HttpToolExecutor, ToolClientError};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//! Server configuration for gateflow-server
//!
//! Loads `gateflow.toml`. Every section and field is optional; a missing file
//! means "run with defaults" (in-memory checkpoints, built-in keyword lists,
//! in-process acknowledgement tool).
//!
//! ```toml
//! [server]
//! name = "gateflow"
//! host = "127.0.0.1"
//! port = 8080
//!
//! [database]
//! url = "sqlite://data/gateflow.db"
//!
//! [engine]
//! recursion_limit = 25
//!
//! [classifier]
//! high_risk_keywords = ["delete", "cancel", "submit", "approve", "reject", "remove"]
//! medium_risk_keywords = ["create", "update", "modify", "change", "add"]
//!
//! [tools]
//! backend_url = "http://localhost:9000"
//! timeout_secs = 30
//! ```

use gateflow_core::classifier::{DEFAULT_HIGH_RISK_KEYWORDS, DEFAULT_MEDIUM_RISK_KEYWORDS};
use gateflow_core::controller::DEFAULT_RECURSION_LIMIT;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerConfigError {
    #[error("Failed to read config file {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_name() -> String {
    "gateflow".to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            name: default_name(),
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Checkpoint database
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite URL; checkpoints are kept in memory when unset
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_recursion_limit")]
    pub recursion_limit: usize,
}

fn default_recursion_limit() -> usize {
    DEFAULT_RECURSION_LIMIT
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            recursion_limit: default_recursion_limit(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierConfig {
    #[serde(default = "default_high_risk_keywords")]
    pub high_risk_keywords: Vec<String>,
    #[serde(default = "default_medium_risk_keywords")]
    pub medium_risk_keywords: Vec<String>,
}

fn default_high_risk_keywords() -> Vec<String> {
    DEFAULT_HIGH_RISK_KEYWORDS.iter().map(|k| k.to_string()).collect()
}

fn default_medium_risk_keywords() -> Vec<String> {
    DEFAULT_MEDIUM_RISK_KEYWORDS.iter().map(|k| k.to_string()).collect()
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            high_risk_keywords: default_high_risk_keywords(),
            medium_risk_keywords: default_medium_risk_keywords(),
        }
    }
}

/// External tool backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Calls are POSTed to `{backend_url}/tools/{name}`; in-process when unset
    #[serde(default)]
    pub backend_url: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            backend_url: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
}

impl ServerConfig {
    /// Load configuration
    ///
    /// Search order:
    /// 1. `explicit` (from `--config` or `GATEFLOW_CONFIG`); must exist
    /// 2. ./config/gateflow.toml
    /// 3. ./gateflow.toml
    ///
    /// Falls back to defaults when nothing is found.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ServerConfigError> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }

        let candidates = [
            PathBuf::from("config/gateflow.toml"),
            PathBuf::from("gateflow.toml"),
        ];
        for path in &candidates {
            if path.exists() {
                return Self::from_file(path);
            }
        }

        tracing::warn!("No configuration file found, using defaults");
        let config = Self::default();
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ServerConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ServerConfigError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&contents)?;
        tracing::info!(path = %path.display(), "Configuration loaded");
        Ok(config)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ServerConfigError> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ServerConfigError> {
        if self.server.name.trim().is_empty() {
            return Err(ServerConfigError::InvalidConfig(
                "server.name must not be empty".to_string(),
            ));
        }
        if self.engine.recursion_limit == 0 {
            return Err(ServerConfigError::InvalidConfig(
                "engine.recursion_limit must be at least 1".to_string(),
            ));
        }
        if self.tools.timeout_secs == 0 {
            return Err(ServerConfigError::InvalidConfig(
                "tools.timeout_secs must be at least 1".to_string(),
            ));
        }
        if let Some(url) = &self.tools.backend_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ServerConfigError::InvalidConfig(format!(
                    "tools.backend_url must be an http(s) URL, got '{}'",
                    url
                )));
            }
        }
        if let Some(url) = &self.database.url {
            if !url.starts_with("sqlite:") {
                return Err(ServerConfigError::InvalidConfig(format!(
                    "database.url must be a sqlite: URL, got '{}'",
                    url
                )));
            }
        }
        let keywords = self
            .classifier
            .high_risk_keywords
            .iter()
            .chain(&self.classifier.medium_risk_keywords);
        for keyword in keywords {
            if keyword.trim().is_empty() {
                return Err(ServerConfigError::InvalidConfig(
                    "classifier keywords must not be empty".to_string(),
                ));
            }
        }
        Ok(())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ServerConfigError> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| {
                ServerConfigError::InvalidConfig(format!(
                    "invalid listen address {}:{}: {}",
                    self.server.host, self.server.port, e
                ))
            })
    }
}

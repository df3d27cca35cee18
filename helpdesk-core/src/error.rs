//! Structured error types for helpdesk-core.
//!
//! The binary uses `anyhow`; library consumers get these.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for helpdesk-core operations
#[derive(Error, Debug)]
pub enum CoreError {
    /// I/O operation failed
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// Config file missing at an explicitly requested path
    #[error("Config not found at {path:?}")]
    ConfigNotFound { path: PathBuf },

    /// Config file is not valid TOML or has the wrong shape
    #[error("Failed to parse config {path:?}: {source}")]
    ConfigParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    /// Config parsed but holds an unusable value
    #[error("Configuration error: {reason}")]
    Config { reason: String },
}

/// Result type alias for helpdesk-core operations
pub type Result<T> = std::result::Result<T, CoreError>;

impl CoreError {
    /// Create a config error
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }
}

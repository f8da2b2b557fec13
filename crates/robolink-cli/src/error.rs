//! Error handling for the RoboLink CLI

use thiserror::Error;

/// CLI-specific error types
#[derive(Debug, Error)]
pub enum CliError {
    #[error("link error: {0}")]
    Link(#[from] robolink_core::LinkError),

    #[error("configuration error: {0}")]
    Config(#[from] robolink_core::ConfigError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

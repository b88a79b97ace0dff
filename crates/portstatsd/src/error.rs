//! Error types for portstatsd

use thiserror::Error;

/// Port statistics exporter errors
#[derive(Error, Debug)]
pub enum PortstatsError {
    /// Missing or invalid configuration, fatal at startup
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Device unreachable, connection refused or request timed out
    #[error("Transport error: {0}")]
    Transport(String),

    /// Device response has no recognisable table structure
    #[error("Parse error: {0}")]
    Parse(String),

    /// Metric descriptor or registry error
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for PortstatsError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            PortstatsError::Transport(format!("request timed out: {}", err))
        } else if err.is_connect() {
            PortstatsError::Transport(format!("connection failed: {}", err))
        } else {
            PortstatsError::Transport(err.to_string())
        }
    }
}

/// Result type for portstatsd operations
pub type Result<T> = std::result::Result<T, PortstatsError>;

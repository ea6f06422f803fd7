//! Error handling for the lanscout discovery engine
//!
//! Probe-level and identification failures never surface here: they are
//! resolved to "closed" or "no model" where they happen. What remains are
//! the failures an operator has to see.

use thiserror::Error;

/// Main error type for discovery operations
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Output error: {0}")]
    OutputError(String),

    #[error("Task error: {0}")]
    TaskError(String),
}

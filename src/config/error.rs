//! Configuration error types

use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),
}

/// Errors that can occur during configuration validation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Required configuration missing: {0}")]
    MissingRequired(&'static str),

    #[error("Invalid connection URL: {0}")]
    InvalidConnectionUrl(String),

    #[error("Send interval must be greater than zero")]
    InvalidSendInterval,

    #[error("Connect attempts must be greater than zero when set")]
    InvalidConnectAttempts,

    #[error("Duplicate connection id: {0}")]
    DuplicateConnectionId(String),

    #[error("Invalid trace collector URL: {0}")]
    InvalidTraceUrl(String),

    #[error("Invalid log level: {0}")]
    InvalidLogLevel(String),
}

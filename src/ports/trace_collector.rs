//! TraceCollector port - Remote collection of raised errors.
//!
//! The error reporter forwards every raised error to an optional collector
//! in the background. Collection failures are logged and never re-raised.

use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashMap;

use crate::domain::foundation::XrtmlError;

/// Serializable form of a raised error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TraceRecord {
    pub name: String,
    #[serde(rename = "type")]
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    pub info: HashMap<String, String>,
    pub occurred_at: String,
}

impl From<&XrtmlError> for TraceRecord {
    fn from(error: &XrtmlError) -> Self {
        Self {
            name: error.name(),
            code: error.code.to_string(),
            message: error.message.clone(),
            target: error.target.clone(),
            info: error.info.clone(),
            occurred_at: error.occurred_at.to_rfc3339(),
        }
    }
}

/// Errors that can occur while shipping a trace record.
#[derive(Debug, thiserror::Error)]
pub enum TraceError {
    #[error("trace request failed: {0}")]
    Request(String),

    #[error("trace collector rejected record with status {0}")]
    Rejected(u16),
}

#[async_trait]
pub trait TraceCollector: Send + Sync {
    async fn collect(&self, record: TraceRecord) -> Result<(), TraceError>;

    /// Collector name for logging.
    fn name(&self) -> &'static str;
}

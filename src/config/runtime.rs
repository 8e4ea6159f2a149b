//! Runtime configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

/// Error-handling and trace settings shared by every component.
#[derive(Debug, Clone, Deserialize)]
pub struct RuntimeConfig {
    /// Turn raised errors into hard failures
    #[serde(default)]
    pub throw_on_error: bool,

    /// Remote trace collector endpoint
    #[serde(default)]
    pub trace_url: Option<String>,

    /// Trace request timeout in seconds
    #[serde(default = "default_trace_timeout")]
    pub trace_timeout_secs: u64,
}

impl RuntimeConfig {
    /// Get trace timeout as Duration
    pub fn trace_timeout(&self) -> Duration {
        Duration::from_secs(self.trace_timeout_secs)
    }

    /// Validate runtime configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(url) = &self.trace_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(ValidationError::InvalidTraceUrl(url.clone()));
            }
        }
        Ok(())
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            throw_on_error: false,
            trace_url: None,
            trace_timeout_secs: default_trace_timeout(),
        }
    }
}

fn default_trace_timeout() -> u64 {
    5
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runtime_config_defaults() {
        let config = RuntimeConfig::default();
        assert!(!config.throw_on_error);
        assert!(config.trace_url.is_none());
        assert_eq!(config.trace_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_validation_rejects_non_http_trace_url() {
        let config = RuntimeConfig {
            trace_url: Some("udp://collector".to_string()),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_accepts_https_trace_url() {
        let config = RuntimeConfig {
            trace_url: Some("https://trace.example.com/errors".to_string()),
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }
}

//! Logging configuration

use serde::Deserialize;

use super::error::ValidationError;

const LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Tracing subscriber settings for the relay binary.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive (overridden by `RUST_LOG`)
    #[serde(default = "default_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

impl LoggingConfig {
    /// Validate logging configuration
    ///
    /// Only the bare level is checked; per-target directives are passed
    /// through to the filter as is.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.level.contains('=') || LEVELS.contains(&self.level.to_lowercase().as_str()) {
            Ok(())
        } else {
            Err(ValidationError::InvalidLogLevel(self.level.clone()))
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            json: false,
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logging_defaults() {
        let config = LoggingConfig::default();
        assert_eq!(config.level, "info");
        assert!(!config.json);
    }

    #[test]
    fn test_validation_accepts_known_levels_and_directives() {
        for level in ["debug", "WARN", "xrtml=trace,info"] {
            let config = LoggingConfig {
                level: level.to_string(),
                json: false,
            };
            assert!(config.validate().is_ok(), "{}", level);
        }
    }

    #[test]
    fn test_validation_rejects_unknown_level() {
        let config = LoggingConfig {
            level: "loud".to_string(),
            json: false,
        };
        assert!(config.validate().is_err());
    }
}

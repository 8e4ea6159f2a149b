//! Application configuration module
//!
//! Configuration is layered with the `config` and `dotenvy` crates: an
//! optional file named by `XRTML_CONFIG` (any format `config` understands)
//! is read first, then environment variables with the `XRTML` prefix override
//! it. Nested values use `__` as the separator.
//!
//! # Example
//!
//! ```no_run
//! use xrtml::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//!
//! println!("{} connection(s) configured", config.connections.len());
//! ```

mod connection;
mod error;
mod logging;
mod runtime;

pub use connection::{ChannelConfig, ConnectionConfig};
pub use error::{ConfigError, ValidationError};
pub use logging::LoggingConfig;
pub use runtime::RuntimeConfig;

use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;

/// Environment variable naming the optional configuration file
pub const CONFIG_FILE_ENV: &str = "XRTML_CONFIG";

/// Root application configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Error-handling and trace settings
    #[serde(default)]
    pub runtime: RuntimeConfig,

    /// Log output settings
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Connections created at startup
    #[serde(default)]
    pub connections: Vec<ConnectionConfig>,
}

impl AppConfig {
    /// Load configuration from the optional file and the environment
    ///
    /// # Environment Variable Format
    ///
    /// - `XRTML__RUNTIME__THROW_ON_ERROR=true` -> `runtime.throw_on_error = true`
    /// - `XRTML__LOGGING__LEVEL=debug` -> `logging.level = "debug"`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file cannot be read or values cannot be
    /// parsed into the expected types.
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (development)
        dotenvy::dotenv().ok();

        let mut builder = config::Config::builder();
        if let Ok(path) = std::env::var(CONFIG_FILE_ENV) {
            builder = builder.add_source(config::File::with_name(&path).required(true));
        }

        let config = builder
            .add_source(config::Environment::default().prefix("XRTML").separator("__"))
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Load configuration from an explicit file, still honouring env overrides
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::from(path.as_ref()).required(true))
            .add_source(config::Environment::default().prefix("XRTML").separator("__"))
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` for the first invalid value, including
    /// connection ids used more than once.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.runtime.validate()?;
        self.logging.validate()?;

        let mut seen = HashSet::new();
        for connection in &self.connections {
            connection.validate()?;
            if !seen.insert(connection.id.as_str()) {
                return Err(ValidationError::DuplicateConnectionId(connection.id.clone()));
            }
        }
        Ok(())
    }
}

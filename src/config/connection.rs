//! Connection configuration

use serde::Deserialize;
use std::time::Duration;

use crate::domain::connection::Channel;

use super::error::ValidationError;

/// Declarative description of one connection.
///
/// `ConnectionManager::create` turns this into a live `Connection`.
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionConfig {
    /// User-assigned connection id
    pub id: String,

    /// Application key presented to the backend
    #[serde(default)]
    pub app_key: String,

    /// Authentication token presented to the backend
    #[serde(default)]
    pub auth_token: Option<String>,

    /// Retries for a send issued while not connected
    #[serde(default = "default_send_retries")]
    pub send_retries: u32,

    /// Delay between send retries in milliseconds
    #[serde(default = "default_send_interval_ms")]
    pub send_interval_ms: u64,

    /// Transport connect timeout in milliseconds
    #[serde(default)]
    pub timeout_ms: Option<u64>,

    /// Reconnect attempts tolerated before giving up (unbounded if unset)
    #[serde(default)]
    pub connect_attempts: Option<u32>,

    /// Connect as soon as the connection is created
    #[serde(default = "default_true")]
    pub auto_connect: bool,

    /// Inactive connections neither process inbound nor send outbound
    #[serde(default = "default_true")]
    pub active: bool,

    /// Opaque metadata forwarded to the backend on connect
    #[serde(default)]
    pub metadata: Option<String>,

    /// Backend server flavour, forwarded on connect
    #[serde(default)]
    pub server_type: Option<String>,

    /// Backend URL (required when auto-connecting)
    #[serde(default)]
    pub url: Option<String>,

    /// `url` points at a cluster balancer
    #[serde(default = "default_true")]
    pub is_cluster: bool,

    /// Channels created with the connection
    #[serde(default)]
    pub channels: Vec<ChannelConfig>,
}

impl ConnectionConfig {
    /// Creates a config with defaults for everything but the id.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            app_key: String::new(),
            auth_token: None,
            send_retries: default_send_retries(),
            send_interval_ms: default_send_interval_ms(),
            timeout_ms: None,
            connect_attempts: None,
            auto_connect: true,
            active: true,
            metadata: None,
            server_type: None,
            url: None,
            is_cluster: true,
            channels: Vec::new(),
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_app_key(mut self, app_key: impl Into<String>) -> Self {
        self.app_key = app_key.into();
        self
    }

    pub fn with_auth_token(mut self, auth_token: impl Into<String>) -> Self {
        self.auth_token = Some(auth_token.into());
        self
    }

    pub fn with_channel(mut self, name: impl Into<String>) -> Self {
        self.channels.push(ChannelConfig::new(name));
        self
    }

    pub fn with_send_policy(mut self, send_retries: u32, send_interval_ms: u64) -> Self {
        self.send_retries = send_retries;
        self.send_interval_ms = send_interval_ms;
        self
    }

    pub fn with_connect_attempts(mut self, connect_attempts: u32) -> Self {
        self.connect_attempts = Some(connect_attempts);
        self
    }

    /// Disables connecting on creation.
    pub fn manual_connect(mut self) -> Self {
        self.auto_connect = false;
        self
    }

    /// Get send interval as Duration
    pub fn send_interval(&self) -> Duration {
        Duration::from_millis(self.send_interval_ms)
    }

    /// Get connect timeout as Duration
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    /// Validate connection configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.trim().is_empty() {
            return Err(ValidationError::MissingRequired("connection id"));
        }

        match self.url.as_deref() {
            None | Some("") if self.auto_connect => {
                return Err(ValidationError::MissingRequired("connection url"));
            }
            Some(url) if !url.is_empty() && !has_supported_scheme(url) => {
                return Err(ValidationError::InvalidConnectionUrl(url.to_string()));
            }
            _ => {}
        }

        if self.send_interval_ms == 0 {
            return Err(ValidationError::InvalidSendInterval);
        }
        if self.connect_attempts == Some(0) {
            return Err(ValidationError::InvalidConnectAttempts);
        }
        Ok(())
    }
}

/// Declarative description of a channel.
#[derive(Debug, Clone, Deserialize)]
pub struct ChannelConfig {
    pub name: String,

    #[serde(default = "default_true")]
    pub subscribe: bool,

    #[serde(default = "default_true")]
    pub subscribe_on_reconnect: bool,
}

impl ChannelConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            subscribe: true,
            subscribe_on_reconnect: true,
        }
    }

    /// Builds the runtime channel (without adapter or handler).
    pub fn to_channel(&self) -> Channel {
        Channel::new(self.name.clone())
            .with_subscribe(self.subscribe)
            .with_subscribe_on_reconnect(self.subscribe_on_reconnect)
    }
}

fn has_supported_scheme(url: &str) -> bool {
    ["http://", "https://", "ws://", "wss://", "memory://"]
        .iter()
        .any(|scheme| url.starts_with(scheme))
}

fn default_send_retries() -> u32 {
    5
}

fn default_send_interval_ms() -> u64 {
    1000
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_config_defaults() {
        let config: ConnectionConfig = serde_json::from_str(r#"{"id": "main"}"#).unwrap();

        assert_eq!(config.send_retries, 5);
        assert_eq!(config.send_interval(), Duration::from_millis(1000));
        assert!(config.auto_connect);
        assert!(config.is_cluster);
        assert!(config.active);
        assert!(config.connect_attempts.is_none());
        assert!(config.channels.is_empty());
    }

    #[test]
    fn test_channel_config_defaults() {
        let config: ConnectionConfig =
            serde_json::from_str(r#"{"id": "main", "channels": [{"name": "news"}]}"#).unwrap();

        let channel = &config.channels[0];
        assert!(channel.subscribe);
        assert!(channel.subscribe_on_reconnect);
    }

    #[test]
    fn test_validation_missing_id() {
        let config = ConnectionConfig::new("  ").manual_connect();
        assert_eq!(
            config.validate(),
            Err(ValidationError::MissingRequired("connection id"))
        );
    }

    #[test]
    fn test_validation_auto_connect_requires_url() {
        let config = ConnectionConfig::new("main");
        assert_eq!(
            config.validate(),
            Err(ValidationError::MissingRequired("connection url"))
        );
    }

    #[test]
    fn test_validation_manual_connect_without_url() {
        let config = ConnectionConfig::new("main").manual_connect();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_invalid_url_scheme() {
        let config = ConnectionConfig::new("main").with_url("ftp://example.com");
        assert!(matches!(
            config.validate(),
            Err(ValidationError::InvalidConnectionUrl(_))
        ));
    }

    #[test]
    fn test_validation_zero_send_interval() {
        let config = ConnectionConfig::new("main")
            .with_url("https://ortc.example.com")
            .with_send_policy(5, 0);
        assert_eq!(config.validate(), Err(ValidationError::InvalidSendInterval));
    }

    #[test]
    fn test_validation_zero_connect_attempts() {
        let config = ConnectionConfig::new("main")
            .with_url("wss://ortc.example.com")
            .with_connect_attempts(0);
        assert_eq!(
            config.validate(),
            Err(ValidationError::InvalidConnectAttempts)
        );
    }

    #[test]
    fn test_channel_config_to_channel() {
        let config = ChannelConfig {
            name: "news".to_string(),
            subscribe: false,
            subscribe_on_reconnect: true,
        };
        let channel = config.to_channel();
        assert_eq!(channel.name, "news");
        assert!(!channel.subscribe);
        assert!(channel.subscribe_on_reconnect);
    }
}

//! Transport port - Interface to the real-time messaging backend.
//!
//! A transport is one client session against the backend. Requests
//! (`connect`, `subscribe`, ...) are issued synchronously and return as soon
//! as they have been handed off; their outcome arrives later as a
//! [`TransportSignal`] delivered to the [`TransportListener`] the transport
//! was created with.
//!
//! # Example
//!
//! ```ignore
//! let transport = factory.create(listener)?;
//! transport.connect(&request)?;          // returns immediately
//! // ... later: listener.on_signal(TransportSignal::Connected)
//! transport.subscribe("news", true)?;    // confirmed by Subscribed { channel }
//! ```
//!
//! # Reentrancy
//!
//! Implementations may deliver a signal from inside the request that caused
//! it (an in-process backend confirms `connect` immediately). Callers must
//! not hold locks across transport calls, and transports must not hold their
//! own locks while signalling.

use std::sync::{Arc, Weak};
use std::time::Duration;

/// Everything a transport needs to open a session.
#[derive(Debug, Clone)]
pub struct ConnectRequest {
    pub app_key: String,
    pub auth_token: Option<String>,
    pub url: String,
    /// `url` points at a cluster balancer rather than a single server.
    pub is_cluster: bool,
    pub metadata: Option<String>,
    pub server_type: Option<String>,
    pub timeout: Option<Duration>,
}

/// Lifecycle and data callbacks from the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportSignal {
    Connected,
    Disconnected,
    Subscribed { channel: String },
    Unsubscribed { channel: String },
    /// Session lost; the transport is retrying on its own.
    Reconnecting,
    Reconnected,
    Exception { error: String },
    Message { channel: String, message: String },
}

/// Errors that can occur while issuing transport requests.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// No transport implementation could be instantiated
    #[error("transport client unavailable: {0}")]
    Unavailable(String),

    /// The request needs an open session
    #[error("transport is not connected")]
    NotConnected,

    /// The backend rejected the request
    #[error("transport request rejected: {0}")]
    Rejected(String),
}

/// Receiver of transport callbacks.
pub trait TransportListener: Send + Sync {
    fn on_signal(&self, signal: TransportSignal);
}

/// One client session against the messaging backend.
pub trait Transport: Send + Sync {
    /// Opens the session. Confirmed by `Connected`.
    fn connect(&self, request: &ConnectRequest) -> Result<(), TransportError>;

    /// Closes the session and stops reconnect attempts. Confirmed by `Disconnected`.
    fn disconnect(&self) -> Result<(), TransportError>;

    /// Confirmed by `Subscribed { channel }`.
    fn subscribe(&self, channel: &str, subscribe_on_reconnect: bool) -> Result<(), TransportError>;

    /// Confirmed by `Unsubscribed { channel }`.
    fn unsubscribe(&self, channel: &str) -> Result<(), TransportError>;

    /// Publishes `message` on `channel`.
    fn send(&self, channel: &str, message: &str) -> Result<(), TransportError>;

    fn is_connected(&self) -> bool;
}

/// Instantiates transports bound to a listener.
///
/// The listener is held weakly so a transport never keeps its owner alive.
pub trait TransportFactory: Send + Sync {
    fn create(&self, listener: Weak<dyn TransportListener>)
        -> Result<Arc<dyn Transport>, TransportError>;
}

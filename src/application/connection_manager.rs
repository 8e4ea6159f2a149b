//! ConnectionManager - registry and router across connections.
//!
//! The manager owns every [`Connection`] it creates or is handed, re-fires
//! their decoded envelopes as [`ManagerEvent::XrtmlMessage`], and buffers
//! outbound messages for connections that are not connected yet. A buffer is
//! flushed in FIFO order on the connection's next `Connect` event and then
//! discarded.

use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tracing::{debug, info};

use super::connection::Connection;
use crate::config::ConnectionConfig;
use crate::domain::connection::{ConnectionEvent, OutboundMessage};
use crate::domain::foundation::{
    ConnectionInternalId, ErrorCode, EventEmitter, ListenerId, XrtmlError,
};
use crate::domain::message::Envelope;
use crate::ports::{ErrorSink, TransportFactory};

/// Notifications at registry level.
#[derive(Debug, Clone, PartialEq)]
pub enum ManagerEvent {
    ConnectionAdded { id: String },
    ConnectionRemoved { id: String },
    /// An envelope decoded by one of the managed connections.
    XrtmlMessage {
        connection: String,
        channel: String,
        message: Envelope,
    },
}

/// A message addressed to one or more connections by user-assigned id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendRequest {
    pub connections: Vec<String>,
    pub channel: String,
    pub content: String,
    pub send_only: bool,
}

impl SendRequest {
    pub fn new(
        connections: impl IntoIterator<Item = impl Into<String>>,
        channel: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            connections: connections.into_iter().map(Into::into).collect(),
            channel: channel.into(),
            content: content.into(),
            send_only: false,
        }
    }

    pub fn send_only(mut self) -> Self {
        self.send_only = true;
        self
    }

    fn to_message(&self) -> OutboundMessage {
        OutboundMessage {
            channel: self.channel.clone(),
            content: self.content.clone(),
            send_only: self.send_only,
        }
    }
}

/// What happened to each recipient of a [`SendRequest`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendSummary {
    /// Handed to a connected transport.
    pub sent: usize,
    /// Queued until the connection connects.
    pub buffered: usize,
    /// Connected ids that did not take the message (inactive connection or
    /// transport rejection).
    pub refused: Vec<String>,
    /// Ids that matched no connection.
    pub missing: Vec<String>,
}

/// Registry of connections. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<ManagerInner>,
}

struct ManagerInner {
    factory: Arc<dyn TransportFactory>,
    errors: Arc<dyn ErrorSink>,
    connections: RwLock<HashMap<ConnectionInternalId, Arc<Connection>>>,
    ids: RwLock<Vec<String>>,
    pending: Mutex<HashMap<ConnectionInternalId, Vec<OutboundMessage>>>,
    events: EventEmitter<ManagerEvent>,
}

impl ConnectionManager {
    pub fn new(factory: Arc<dyn TransportFactory>, errors: Arc<dyn ErrorSink>) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                factory,
                errors,
                connections: RwLock::new(HashMap::new()),
                ids: RwLock::new(Vec::new()),
                pending: Mutex::new(HashMap::new()),
                events: EventEmitter::new(),
            }),
        }
    }

    /// Builds, registers and (if configured) connects a connection.
    ///
    /// An invalid configuration is reported as `FATAL` but the connection is
    /// still created and registered. If the id is already taken the existing
    /// connection is returned.
    pub fn create(&self, config: &ConnectionConfig) -> Arc<Connection> {
        if let Some(existing) = self.find_by_user_id(&config.id) {
            debug!(connection_id = %config.id, "connection id already registered");
            return existing;
        }

        let connection = Connection::new(config, self.inner.errors.clone());
        if let Err(invalid) = config.validate() {
            self.inner.errors.report(
                &XrtmlError::new(ErrorCode::Fatal, "Invalid connection configuration")
                    .with_target(config.id.clone())
                    .with_info("reason", invalid.to_string()),
            );
        }

        self.add(connection.clone());

        if connection.create_client(self.inner.factory.as_ref()).is_ok()
            && config.auto_connect
            && config.url.as_deref().map_or(false, |url| !url.is_empty())
        {
            if let Err(err) = connection.connect() {
                debug!(connection_id = %config.id, error = %err, "auto-connect failed");
            }
        }
        connection
    }

    /// Registers a connection. Returns false (and does nothing) if a
    /// connection with the same user-assigned id is already registered.
    pub fn add(&self, connection: Arc<Connection>) -> bool {
        let id = connection.id().to_string();
        {
            let mut ids = self.inner.ids.write();
            if ids.contains(&id) {
                debug!(connection_id = %id, "add ignored, id already registered");
                return false;
            }
            ids.push(id.clone());
        }
        let internal_id = connection.internal_id();
        self.inner
            .connections
            .write()
            .insert(internal_id, connection.clone());

        let weak = Arc::downgrade(&self.inner);
        let source = id.clone();
        connection.on(move |event| {
            let Some(inner) = weak.upgrade() else { return };
            match event {
                ConnectionEvent::XrtmlMessage { channel, message } => {
                    inner.events.emit(&ManagerEvent::XrtmlMessage {
                        connection: source.clone(),
                        channel: channel.clone(),
                        message: message.clone(),
                    });
                }
                ConnectionEvent::Dispose => inner.purge(internal_id),
                _ => {}
            }
        });

        info!(connection_id = %id, "connection registered");
        self.inner
            .events
            .emit(&ManagerEvent::ConnectionAdded { id });
        true
    }

    /// Sends to every listed connection.
    ///
    /// Connected targets send immediately; the rest buffer until their next
    /// connect. Unknown ids are raised as `CONNECTION_NOT_FOUND` and skipped,
    /// unless the error sink throws.
    pub fn send_message(&self, request: &SendRequest) -> Result<SendSummary, XrtmlError> {
        let message = request.to_message();
        let mut summary = SendSummary::default();

        for id in &request.connections {
            match self.get_by_id(id) {
                Some(connection) if connection.is_connected() => {
                    if connection.send(message.clone())?.is_sent() {
                        summary.sent += 1;
                    } else {
                        summary.refused.push(id.clone());
                    }
                }
                Some(connection) => {
                    self.buffer(&connection, message.clone());
                    summary.buffered += 1;
                }
                None => {
                    summary.missing.push(id.clone());
                    self.inner.errors.raise(
                        XrtmlError::new(ErrorCode::ConnectionNotFound, "Connection not found")
                            .with_target(id.clone())
                            .with_info("channel", request.channel.clone()),
                    )?;
                }
            }
        }
        Ok(summary)
    }

    /// Looks a connection up by internal id first, then by user-assigned id.
    pub fn get_by_id(&self, id: &str) -> Option<Arc<Connection>> {
        if let Ok(internal_id) = id.parse::<ConnectionInternalId>() {
            if let Some(connection) = self.inner.connections.read().get(&internal_id) {
                return Some(connection.clone());
            }
        }
        self.find_by_user_id(id)
    }

    /// Disposes and unregisters a connection. Returns false if unknown.
    pub fn remove(&self, id: &str) -> bool {
        match self.get_by_id(id) {
            Some(connection) => {
                connection.dispose();
                // Already-disposed connections no longer fire `Dispose`
                self.inner.purge(connection.internal_id());
                true
            }
            None => false,
        }
    }

    /// Disposes every registered connection.
    pub fn dispose_all(&self) {
        let connections: Vec<Arc<Connection>> =
            self.inner.connections.read().values().cloned().collect();
        for connection in connections {
            connection.dispose();
            self.inner.purge(connection.internal_id());
        }
    }

    /// User-assigned ids in registration order.
    pub fn ids(&self) -> Vec<String> {
        self.inner.ids.read().clone()
    }

    pub fn len(&self) -> usize {
        self.inner.ids.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Messages waiting for the connection's next connect.
    pub fn pending_count(&self, id: &str) -> usize {
        self.get_by_id(id).map_or(0, |connection| {
            self.inner
                .pending
                .lock()
                .get(&connection.internal_id())
                .map_or(0, Vec::len)
        })
    }

    pub fn on<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&ManagerEvent) + Send + Sync + 'static,
    {
        self.inner.events.on(listener)
    }

    pub fn off(&self, id: ListenerId) -> bool {
        self.inner.events.off(id)
    }

    fn find_by_user_id(&self, id: &str) -> Option<Arc<Connection>> {
        self.inner
            .connections
            .read()
            .values()
            .find(|connection| connection.id() == id)
            .cloned()
    }

    fn buffer(&self, connection: &Arc<Connection>, message: OutboundMessage) {
        let internal_id = connection.internal_id();
        let first = {
            let mut pending = self.inner.pending.lock();
            let queue = pending.entry(internal_id).or_default();
            queue.push(message);
            queue.len() == 1
        };
        debug!(connection_id = %connection.id(), "message buffered until connect");

        if first {
            let weak = Arc::downgrade(&self.inner);
            connection.events().once_when(
                |event| matches!(event, ConnectionEvent::Connect),
                move |_| {
                    if let Some(inner) = weak.upgrade() {
                        inner.flush(internal_id);
                    }
                },
            );
        }
    }
}

impl ManagerInner {
    fn flush(&self, internal_id: ConnectionInternalId) {
        let queued = self.pending.lock().remove(&internal_id).unwrap_or_default();
        let Some(connection) = self.connections.read().get(&internal_id).cloned() else {
            return;
        };

        debug!(connection_id = %connection.id(), count = queued.len(), "flushing buffered messages");
        for message in queued {
            if let Err(err) = connection.send(message) {
                debug!(connection_id = %connection.id(), error = %err, "buffered send failed");
            }
        }
    }

    fn purge(&self, internal_id: ConnectionInternalId) {
        let Some(connection) = self.connections.write().remove(&internal_id) else {
            return;
        };
        self.pending.lock().remove(&internal_id);
        self.ids.write().retain(|id| id != connection.id());

        info!(connection_id = %connection.id(), "connection unregistered");
        self.events.emit(&ManagerEvent::ConnectionRemoved {
            id: connection.id().to_string(),
        });
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("ids", &self.ids())
            .finish()
    }
}

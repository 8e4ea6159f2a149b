//! Connection - one transport session and the channels negotiated on it.
//!
//! A connection turns transport signals into [`ConnectionEvent`]s, owns the
//! per-channel subscription state, retries sends issued before the session
//! is up, and runs inbound payloads through anti-echo, adaptation and
//! envelope decoding before they are handed to observers.
//!
//! # Lifecycle
//!
//! ```text
//! new → create_client → connect → Connected ⇄ Reconnecting → Disconnected
//!                                     └──────── dispose (from anywhere) ──┘
//! ```
//!
//! Transport confirmations may arrive while a request is still on the stack
//! (see [`crate::ports::Transport`]); no lock here is held across a
//! transport call.

use parking_lot::{Mutex, RwLock};
use secrecy::{ExposeSecret, SecretString};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Weak};
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ConnectionConfig;
use crate::domain::connection::{
    Channel, ConnectionEvent, ConnectionState, InboundMessage, MessageAdapter, OutboundMessage,
    SendOutcome,
};
use crate::domain::foundation::{
    ConnectionInternalId, ErrorCode, EventEmitter, ListenerId, StateMachine, XrtmlError,
};
use crate::domain::message::{self, sentinel, Sentinel};
use crate::ports::{
    ConnectRequest, ErrorSink, Transport, TransportError, TransportFactory, TransportListener,
    TransportSignal,
};

/// A single session against the messaging backend.
pub struct Connection {
    id: String,
    internal_id: ConnectionInternalId,
    this: Weak<Connection>,
    settings: ConnectionConfig,
    auth_token: Option<SecretString>,
    state: Mutex<ConnectionState>,
    channels: Mutex<HashMap<String, Channel>>,
    transport: RwLock<Option<Arc<dyn Transport>>>,
    active: AtomicBool,
    reconnect_attempts: AtomicU32,
    message_adapter: RwLock<Option<MessageAdapter>>,
    events: EventEmitter<ConnectionEvent>,
    errors: Arc<dyn ErrorSink>,
    liveness: CancellationToken,
}

impl Connection {
    /// Builds an uninitialized connection from its configuration.
    ///
    /// Channels listed in the configuration are registered but not yet
    /// subscribed; that happens once the session is up.
    pub fn new(config: &ConnectionConfig, errors: Arc<dyn ErrorSink>) -> Arc<Self> {
        let mut settings = config.clone();
        let auth_token = settings.auth_token.take().map(SecretString::new);
        let channels = settings
            .channels
            .iter()
            .map(|channel| (channel.name.clone(), channel.to_channel()))
            .collect();

        Arc::new_cyclic(|this| Self {
            id: settings.id.clone(),
            internal_id: ConnectionInternalId::new(),
            this: this.clone(),
            active: AtomicBool::new(settings.active),
            settings,
            auth_token,
            state: Mutex::new(ConnectionState::Uninitialized),
            channels: Mutex::new(channels),
            transport: RwLock::new(None),
            reconnect_attempts: AtomicU32::new(0),
            message_adapter: RwLock::new(None),
            events: EventEmitter::new(),
            errors,
            liveness: CancellationToken::new(),
        })
    }

    /// User-assigned id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Generated id, also used as the send-only sender id.
    pub fn internal_id(&self) -> ConnectionInternalId {
        self.internal_id
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.lock()
    }

    pub fn settings(&self) -> &ConnectionConfig {
        &self.settings
    }

    /// True once a transport client has been instantiated.
    pub fn is_created(&self) -> bool {
        self.transport.read().is_some()
    }

    pub fn is_connected(&self) -> bool {
        self.current_transport()
            .map_or(false, |transport| transport.is_connected())
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Inactive connections drop inbound payloads and refuse sends; the
    /// transport session is left alone.
    pub fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::SeqCst);
    }

    /// Installs the connection-wide adapter, applied before any channel adapter.
    pub fn set_message_adapter<F>(&self, adapter: F)
    where
        F: Fn(&InboundMessage) -> Result<String, String> + Send + Sync + 'static,
    {
        *self.message_adapter.write() = Some(Arc::new(adapter));
    }

    /// Registers an observer for every connection event.
    pub fn on<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&ConnectionEvent) + Send + Sync + 'static,
    {
        self.events.on(listener)
    }

    pub fn off(&self, id: ListenerId) -> bool {
        self.events.off(id)
    }

    pub fn events(&self) -> &EventEmitter<ConnectionEvent> {
        &self.events
    }

    /// Snapshot of a channel's state.
    pub fn channel(&self, name: &str) -> Option<Channel> {
        self.channels.lock().get(name).cloned()
    }

    pub fn channel_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.channels.lock().keys().cloned().collect();
        names.sort();
        names
    }

    // === Lifecycle ===

    /// Instantiates the transport client. At most one client is ever created.
    pub fn create_client(&self, factory: &dyn TransportFactory) -> Result<(), XrtmlError> {
        if self.state().is_disposed() {
            return Err(self.errors.fail(self.error(
                ErrorCode::ConnectionInactive,
                "Connection has been disposed",
            )));
        }
        if self.is_created() {
            return Ok(());
        }

        let listener: Weak<dyn TransportListener> = self.this.clone();
        let transport = factory.create(listener).map_err(|err| {
            self.errors.fail(
                self.error(ErrorCode::OrtcNotFound, "Transport client could not be created")
                    .with_info("cause", err.to_string()),
            )
        })?;

        *self.transport.write() = Some(transport);
        self.transition(ConnectionState::Created);
        debug!(connection_id = %self.id, "transport client created");
        self.events.emit(&ConnectionEvent::Created);
        Ok(())
    }

    /// Opens the session with the configured credentials.
    ///
    /// Already being connected (or connecting) is a no-op.
    pub fn connect(&self) -> Result<(), XrtmlError> {
        let Some(transport) = self.current_transport() else {
            return Err(self.errors.fail(self.error(
                ErrorCode::OrtcUnavailable,
                "Transport client has not been created",
            )));
        };
        if transport.is_connected() {
            debug!(connection_id = %self.id, "connect ignored, already connected");
            return Ok(());
        }

        let Some(url) = self.settings.url.clone().filter(|url| !url.is_empty()) else {
            return Err(self.errors.fail(
                self.error(ErrorCode::MissingArgument, "Connection url is required to connect")
                    .with_info("argument", "url"),
            ));
        };

        if !self.transition(ConnectionState::Connecting) {
            debug!(connection_id = %self.id, state = ?self.state(), "connect ignored");
            return Ok(());
        }

        let request = ConnectRequest {
            app_key: self.settings.app_key.clone(),
            auth_token: self
                .auth_token
                .as_ref()
                .map(|token| token.expose_secret().clone()),
            url,
            is_cluster: self.settings.is_cluster,
            metadata: self.settings.metadata.clone(),
            server_type: self.settings.server_type.clone(),
            timeout: self.settings.timeout(),
        };

        info!(connection_id = %self.id, url = %request.url, "connecting");
        transport.connect(&request).map_err(|err| {
            self.transition(ConnectionState::Disconnected);
            self.errors.fail(self.transport_error(err))
        })
    }

    /// Closes the session.
    pub fn disconnect(&self) -> Result<(), XrtmlError> {
        let transport = match self.current_transport() {
            Some(transport) if transport.is_connected() => transport,
            _ => {
                return Err(self.errors.fail(
                    self.error(ErrorCode::OrtcDisconnected, "Connection is not connected"),
                ))
            }
        };

        info!(connection_id = %self.id, "disconnecting");
        transport
            .disconnect()
            .map_err(|err| self.errors.fail(self.transport_error(err)))
    }

    /// Disconnects if needed, cancels deferred work and notifies observers.
    ///
    /// Terminal: the connection cannot be reused afterwards.
    pub fn dispose(&self) {
        if self.state().is_disposed() {
            return;
        }

        if self.is_connected() {
            if let Err(err) = self.disconnect() {
                debug!(connection_id = %self.id, error = %err, "disconnect during dispose failed");
            }
        }

        self.liveness.cancel();
        *self.state.lock() = ConnectionState::Disposed;
        *self.transport.write() = None;
        self.channels.lock().clear();

        info!(connection_id = %self.id, "connection disposed");
        self.events.emit(&ConnectionEvent::Dispose);
        self.events.clear();
    }

    // === Channels ===

    /// Registers a channel without issuing a subscribe request.
    pub fn create_channel(&self, channel: Channel) {
        self.channels.lock().insert(channel.name.clone(), channel);
    }

    /// Registers a channel and subscribes to it right away if connected.
    ///
    /// When not connected the subscription is issued on the next connect.
    pub fn subscribe(&self, channel: Channel) -> Result<(), XrtmlError> {
        let name = channel.name.clone();
        let subscribe_on_reconnect = channel.subscribe_on_reconnect;
        self.create_channel(channel.with_subscribe(true));

        match self.current_transport() {
            Some(transport) if transport.is_connected() => {
                debug!(connection_id = %self.id, channel = %name, "subscribing");
                transport
                    .subscribe(&name, subscribe_on_reconnect)
                    .map_err(|err| self.errors.fail(self.transport_error(err).with_info("channel", name)))
            }
            _ => Ok(()),
        }
    }

    /// Requests an unsubscribe. The channel is forgotten once the transport
    /// confirms.
    pub fn unsubscribe(&self, name: &str) -> Result<(), XrtmlError> {
        if !self.channels.lock().contains_key(name) {
            return Err(self.errors.fail(
                self.error(ErrorCode::InvalidArgument, "Channel is not registered")
                    .with_info("channel", name),
            ));
        }

        let transport = match self.current_transport() {
            Some(transport) if transport.is_connected() => transport,
            _ => {
                return Err(self.errors.fail(
                    self.error(ErrorCode::OrtcDisconnected, "Connection is not connected")
                        .with_info("channel", name),
                ))
            }
        };

        debug!(connection_id = %self.id, channel = %name, "unsubscribing");
        transport
            .unsubscribe(name)
            .map_err(|err| self.errors.fail(self.transport_error(err).with_info("channel", name)))
    }

    // === Outbound ===

    /// Sends now if connected, otherwise retries every `send_interval` up to
    /// `send_retries` times before dropping the message.
    ///
    /// Retries run on the ambient tokio runtime. The outcome says whether the
    /// message reached the transport on this call.
    pub fn send(&self, message: OutboundMessage) -> Result<SendOutcome, XrtmlError> {
        self.attempt_send(message, self.settings.send_retries)
    }

    fn attempt_send(
        &self,
        message: OutboundMessage,
        remaining: u32,
    ) -> Result<SendOutcome, XrtmlError> {
        if self.liveness.is_cancelled() {
            debug!(connection_id = %self.id, channel = %message.channel, "send skipped, connection disposed");
            return Ok(SendOutcome::Dropped);
        }
        if !self.is_active() {
            self.errors.raise(
                self.error(ErrorCode::ConnectionInactive, "Connection is inactive")
                    .with_info("channel", message.channel),
            )?;
            return Ok(SendOutcome::Refused);
        }

        match self.current_transport() {
            Some(transport) if transport.is_connected() => {
                let content = if message.send_only {
                    sentinel::wrap(&self.internal_id, &message.content)
                } else {
                    message.content
                };
                debug!(connection_id = %self.id, channel = %message.channel, "sending");
                match transport.send(&message.channel, &content) {
                    Ok(()) => Ok(SendOutcome::Sent),
                    Err(err) => {
                        self.errors.raise(
                            self.transport_error(err)
                                .with_info("channel", message.channel),
                        )?;
                        Ok(SendOutcome::Refused)
                    }
                }
            }
            _ => Ok(self.schedule_retry(message, remaining)),
        }
    }

    fn schedule_retry(&self, message: OutboundMessage, remaining: u32) -> SendOutcome {
        if remaining == 0 {
            warn!(connection_id = %self.id, channel = %message.channel, "send retries exhausted, message dropped");
            self.events.emit(&ConnectionEvent::SendDropped {
                channel: message.channel,
            });
            return SendOutcome::Dropped;
        }

        let Ok(handle) = Handle::try_current() else {
            warn!(connection_id = %self.id, channel = %message.channel, "no runtime for send retry, message dropped");
            self.events.emit(&ConnectionEvent::SendDropped {
                channel: message.channel,
            });
            return SendOutcome::Dropped;
        };

        let remaining = remaining - 1;
        debug!(connection_id = %self.id, channel = %message.channel, remaining, "send retry scheduled");
        self.events.emit(&ConnectionEvent::SendRetryScheduled {
            channel: message.channel.clone(),
            remaining,
        });

        let this = self.this.clone();
        let liveness = self.liveness.clone();
        let interval = self.settings.send_interval();
        handle.spawn(async move {
            tokio::select! {
                _ = liveness.cancelled() => {}
                _ = tokio::time::sleep(interval) => {
                    let Some(connection) = this.upgrade() else { return };
                    if liveness.is_cancelled() {
                        return;
                    }
                    if let Err(err) = connection.attempt_send(message, remaining) {
                        debug!(connection_id = %connection.id, error = %err, "send retry failed");
                    }
                }
            }
        });
        SendOutcome::RetryScheduled
    }

    // === Inbound ===

    /// Runs one inbound payload through anti-echo, adaptation and decoding.
    ///
    /// Emits `Message` for every payload that survives, then `XrtmlMessage`
    /// if the payload is an envelope.
    pub fn process(&self, channel: &str, raw: &str) -> Result<(), XrtmlError> {
        let payload = match sentinel::inspect(raw) {
            Sentinel::SendOnly { sender_id, .. } if sender_id == self.internal_id.to_string() => {
                debug!(connection_id = %self.id, channel, "dropping own send-only echo");
                return Ok(());
            }
            Sentinel::SendOnly { content, .. } => content,
            Sentinel::Plain(content) => content,
        };

        if !self.is_active() {
            debug!(connection_id = %self.id, channel, "connection inactive, message ignored");
            return Ok(());
        }

        let mut inbound = InboundMessage::new(channel, payload);
        let connection_adapter = self.message_adapter.read().clone();
        let (channel_adapter, handler) = match self.channels.lock().get(channel) {
            Some(entry) => (entry.message_adapter.clone(), entry.on_message.clone()),
            None => (None, None),
        };

        for adapter in [connection_adapter, channel_adapter].into_iter().flatten() {
            match adapter(&inbound) {
                Ok(adapted) => inbound.message = adapted,
                Err(reason) => self.errors.raise(
                    self.error(ErrorCode::ConnectionAdapt, "Message adapter failed")
                        .with_info("channel", channel)
                        .with_info("reason", reason),
                )?,
            }
        }

        self.events.emit(&ConnectionEvent::Message(inbound.clone()));
        if let Some(handler) = handler {
            handler(&inbound);
        }

        if !message::is_valid(&inbound.message) {
            return Ok(());
        }
        match message::decode(&inbound.message) {
            Ok(envelope) => {
                self.events.emit(&ConnectionEvent::XrtmlMessage {
                    channel: inbound.channel,
                    message: envelope,
                });
                Ok(())
            }
            Err(err) => self.errors.raise(
                self.error(ErrorCode::ConnectionProcess, "Message could not be unwrapped")
                    .with_info("channel", channel)
                    .with_info("cause", err.to_string()),
            ),
        }
    }

    // === Transport signals ===

    fn on_connected(&self) {
        self.reconnect_attempts.store(0, Ordering::SeqCst);
        self.transition(ConnectionState::Connected);
        info!(connection_id = %self.id, "connected");
        self.events.emit(&ConnectionEvent::Connect);
        self.subscribe_pending();
    }

    fn subscribe_pending(&self) {
        let Some(transport) = self.current_transport() else {
            return;
        };
        let pending: Vec<(String, bool)> = self
            .channels
            .lock()
            .values()
            .filter(|channel| channel.subscribe && !channel.is_subscribed())
            .map(|channel| (channel.name.clone(), channel.subscribe_on_reconnect))
            .collect();

        for (name, subscribe_on_reconnect) in pending {
            if let Err(err) = transport.subscribe(&name, subscribe_on_reconnect) {
                self.errors
                    .report(&self.transport_error(err).with_info("channel", name));
            }
        }
    }

    fn on_disconnected(&self) {
        if !self.state().is_disposed() {
            self.transition(ConnectionState::Disconnected);
        }
        for channel in self.channels.lock().values_mut() {
            channel.mark_subscribed(false);
        }
        info!(connection_id = %self.id, "disconnected");
        self.events.emit(&ConnectionEvent::Disconnect);
    }

    fn on_reconnecting(&self) {
        if self.state() == ConnectionState::Disconnected {
            debug!(connection_id = %self.id, "reconnecting ignored, connection given up");
            return;
        }

        let attempt = self.reconnect_attempts.fetch_add(1, Ordering::SeqCst) + 1;
        self.transition(ConnectionState::Reconnecting);
        // Restore re-confirms the subscriptions the backend kept
        for channel in self.channels.lock().values_mut() {
            channel.mark_subscribed(false);
        }
        info!(connection_id = %self.id, attempt, "reconnecting");
        self.events.emit(&ConnectionEvent::Reconnecting { attempt });

        let Some(ceiling) = self.settings.connect_attempts else {
            return;
        };
        if attempt < ceiling {
            return;
        }

        warn!(connection_id = %self.id, attempts = attempt, "reconnect attempts exhausted, giving up");
        self.events
            .emit(&ConnectionEvent::ReconnectAbandoned { attempts: attempt });
        self.transition(ConnectionState::Disconnected);
        // The session is gone either way; the ceiling is not an error
        if let Some(transport) = self.current_transport() {
            if let Err(err) = transport.disconnect() {
                debug!(connection_id = %self.id, error = %err, "transport disconnect after give-up failed");
            }
        }
    }

    fn on_reconnected(&self) {
        self.reconnect_attempts.store(0, Ordering::SeqCst);
        self.transition(ConnectionState::Connected);
        info!(connection_id = %self.id, "reconnected");
        self.events.emit(&ConnectionEvent::Reconnect);
    }

    fn on_subscribed(&self, channel: String) {
        if let Some(entry) = self.channels.lock().get_mut(&channel) {
            entry.mark_subscribed(true);
        }
        debug!(connection_id = %self.id, channel = %channel, "subscribed");
        self.events.emit(&ConnectionEvent::Subscribe { channel });
    }

    fn on_unsubscribed(&self, channel: String) {
        self.channels.lock().remove(&channel);
        debug!(connection_id = %self.id, channel = %channel, "unsubscribed");
        self.events.emit(&ConnectionEvent::Unsubscribe { channel });
    }

    fn on_exception(&self, error: String) {
        self.errors.report(
            &self
                .error(ErrorCode::OrtcException, "Transport reported an exception")
                .with_info("cause", error.clone()),
        );
        self.events.emit(&ConnectionEvent::Exception { error });
    }

    // === Helpers ===

    fn current_transport(&self) -> Option<Arc<dyn Transport>> {
        self.transport.read().clone()
    }

    fn transition(&self, target: ConnectionState) -> bool {
        let mut state = self.state.lock();
        match state.transition_to(target) {
            Ok(next) => {
                *state = next;
                true
            }
            Err(rejected) => {
                debug!(connection_id = %self.id, %rejected, "lifecycle transition ignored");
                false
            }
        }
    }

    fn error(&self, code: ErrorCode, message: &str) -> XrtmlError {
        XrtmlError::new(code, message).with_target(self.id.clone())
    }

    fn transport_error(&self, err: TransportError) -> XrtmlError {
        let code = match err {
            TransportError::NotConnected => ErrorCode::OrtcDisconnected,
            TransportError::Unavailable(_) => ErrorCode::OrtcUnavailable,
            TransportError::Rejected(_) => ErrorCode::OrtcException,
        };
        self.error(code, "Transport request failed")
            .with_info("cause", err.to_string())
    }
}

impl TransportListener for Connection {
    fn on_signal(&self, signal: TransportSignal) {
        if self.state().is_disposed() {
            debug!(connection_id = %self.id, ?signal, "signal after dispose ignored");
            return;
        }

        match signal {
            TransportSignal::Connected => self.on_connected(),
            TransportSignal::Disconnected => self.on_disconnected(),
            TransportSignal::Subscribed { channel } => self.on_subscribed(channel),
            TransportSignal::Unsubscribed { channel } => self.on_unsubscribed(channel),
            TransportSignal::Reconnecting => self.on_reconnecting(),
            TransportSignal::Reconnected => self.on_reconnected(),
            TransportSignal::Exception { error } => self.on_exception(error),
            TransportSignal::Message { channel, message } => {
                if let Err(err) = self.process(&channel, &message) {
                    debug!(connection_id = %self.id, error = %err, "inbound message aborted");
                }
            }
        }
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("internal_id", &self.internal_id)
            .field("state", &self.state())
            .field("active", &self.is_active())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::test_support::{FakeFactory, FakeTransport, MissingFactory, RecordingSink};
    use std::time::Duration;

    fn config(id: &str) -> ConnectionConfig {
        ConnectionConfig::new(id)
            .with_url("memory://test")
            .with_app_key("app")
            .with_auth_token("token")
    }

    fn connected(config: &ConnectionConfig) -> (Arc<Connection>, Arc<FakeTransport>, Arc<RecordingSink>) {
        let sink = RecordingSink::new();
        let transport = FakeTransport::online();
        let connection = Connection::new(config, sink.clone());
        connection
            .create_client(&FakeFactory::new(transport.clone()))
            .unwrap();
        connection.connect().unwrap();
        (connection, transport, sink)
    }

    fn record(connection: &Connection) -> Arc<Mutex<Vec<ConnectionEvent>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        connection.on(move |event| s.lock().push(event.clone()));
        seen
    }

    #[test]
    fn connect_without_client_fails_unavailable() {
        let sink = RecordingSink::new();
        let connection = Connection::new(&config("main"), sink.clone());

        let err = connection.connect().unwrap_err();
        assert_eq!(err.code, ErrorCode::OrtcUnavailable);
        assert_eq!(sink.codes(), vec![ErrorCode::OrtcUnavailable]);
    }

    #[test]
    fn failing_factory_reports_not_found() {
        let sink = RecordingSink::new();
        let connection = Connection::new(&config("main"), sink.clone());

        let err = connection.create_client(&MissingFactory).unwrap_err();
        assert_eq!(err.code, ErrorCode::OrtcNotFound);
        assert!(!connection.is_created());
    }

    #[test]
    fn connect_passes_credentials_and_subscribes_channels() {
        let (connection, transport, _) = connected(&config("main").with_channel("news"));

        assert_eq!(connection.state(), ConnectionState::Connected);
        let request = transport.connect_requests.lock()[0].clone();
        assert_eq!(request.app_key, "app");
        assert_eq!(request.auth_token.as_deref(), Some("token"));
        assert_eq!(*transport.subscribed.lock(), vec!["news".to_string()]);
        assert!(connection.channel("news").unwrap().is_subscribed());
    }

    #[test]
    fn second_create_client_keeps_first_transport() {
        let (connection, transport, _) = connected(&config("main"));
        let other = FakeTransport::online();

        connection
            .create_client(&FakeFactory::new(other.clone()))
            .unwrap();
        assert_eq!(transport.connect_requests.lock().len(), 1);
        assert!(other.connect_requests.lock().is_empty());
        assert!(connection.is_connected());
    }

    #[test]
    fn disconnect_when_not_connected_fails() {
        let sink = RecordingSink::new();
        let connection = Connection::new(&config("main"), sink.clone());
        connection
            .create_client(&FakeFactory::new(FakeTransport::pending()))
            .unwrap();

        let err = connection.disconnect().unwrap_err();
        assert_eq!(err.code, ErrorCode::OrtcDisconnected);
    }

    #[test]
    fn unsubscribe_confirmation_removes_channel() {
        let (connection, _, _) = connected(&config("main").with_channel("news"));
        let events = record(&connection);

        connection.unsubscribe("news").unwrap();

        assert!(connection.channel("news").is_none());
        assert_eq!(
            *events.lock(),
            vec![ConnectionEvent::Unsubscribe {
                channel: "news".to_string()
            }]
        );
    }

    #[test]
    fn subscribe_while_connected_is_issued_immediately() {
        let (connection, transport, _) = connected(&config("main"));

        connection.subscribe(Channel::new("alerts")).unwrap();

        assert_eq!(*transport.subscribed.lock(), vec!["alerts".to_string()]);
        assert!(connection.channel("alerts").unwrap().is_subscribed());
    }

    #[test]
    fn send_only_echo_is_dropped_by_sender_only() {
        let (sender, transport, _) = connected(&config("a"));
        let (receiver, _, _) = connected(&config("b"));
        let sender_events = record(&sender);
        let receiver_events = record(&receiver);

        sender
            .send(OutboundMessage::new("news", r#"{"xrtml":{"t":"poll"}}"#).send_only())
            .unwrap();
        let wire = transport.sent_contents()[0].clone();
        assert!(wire.starts_with(sentinel::SEND_ONLY_PREFIX));

        sender.process("news", &wire).unwrap();
        receiver.process("news", &wire).unwrap();

        assert!(sender_events.lock().is_empty());
        let received = receiver_events.lock();
        assert_eq!(
            received[0],
            ConnectionEvent::Message(InboundMessage::new("news", r#"{"xrtml":{"t":"poll"}}"#))
        );
        assert!(matches!(received[1], ConnectionEvent::XrtmlMessage { .. }));
    }

    #[test]
    fn inactive_connection_ignores_inbound_without_error() {
        let (connection, _, sink) = connected(&config("main"));
        let events = record(&connection);
        connection.set_active(false);

        connection.process("news", "hello").unwrap();

        assert!(events.lock().is_empty());
        assert!(sink.codes().is_empty());
    }

    #[test]
    fn inactive_connection_refuses_send() {
        let (connection, transport, sink) = connected(&config("main"));
        connection.set_active(false);

        let outcome = connection.send(OutboundMessage::new("news", "x")).unwrap();

        assert_eq!(outcome, SendOutcome::Refused);
        assert!(transport.sent.lock().is_empty());
        assert_eq!(sink.codes(), vec![ErrorCode::ConnectionInactive]);
    }

    #[test]
    fn adapters_chain_connection_then_channel() {
        let (connection, _, _) = connected(&config("main"));
        connection.set_message_adapter(|m| Ok(format!("{}-conn", m.message)));
        connection.create_channel(
            Channel::new("news").with_adapter(|m| Ok(format!("{}-chan", m.message))),
        );
        let events = record(&connection);

        connection.process("news", "raw").unwrap();

        assert_eq!(
            *events.lock(),
            vec![ConnectionEvent::Message(InboundMessage::new("news", "raw-conn-chan"))]
        );
    }

    #[test]
    fn failing_adapter_is_reported_and_processing_continues() {
        let (connection, _, sink) = connected(&config("main"));
        connection.set_message_adapter(|_| Err("boom".to_string()));
        let events = record(&connection);

        connection.process("news", "raw").unwrap();

        assert_eq!(sink.codes(), vec![ErrorCode::ConnectionAdapt]);
        assert_eq!(
            *events.lock(),
            vec![ConnectionEvent::Message(InboundMessage::new("news", "raw"))]
        );
    }

    #[test]
    fn failing_adapter_aborts_when_sink_throws() {
        let sink = RecordingSink::throwing();
        let connection = Connection::new(&config("main"), sink.clone());
        connection.set_message_adapter(|_| Err("boom".to_string()));
        let events = record(&connection);

        let err = connection.process("news", "raw").unwrap_err();
        assert_eq!(err.code, ErrorCode::ConnectionAdapt);
        assert!(events.lock().is_empty());
    }

    #[test]
    fn channel_handler_sees_adapted_message() {
        let (connection, _, _) = connected(&config("main"));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        connection.create_channel(
            Channel::new("news")
                .with_adapter(|m| Ok(m.message.to_uppercase()))
                .with_handler(move |m| s.lock().push(m.message.clone())),
        );

        connection.process("news", "hi").unwrap();
        assert_eq!(*seen.lock(), vec!["HI".to_string()]);
    }

    #[test]
    fn undecodable_envelope_reports_process_error() {
        let (connection, _, sink) = connected(&config("main"));
        let events = record(&connection);

        connection.process("news", r#"{"xrtml":5}"#).unwrap();

        assert_eq!(sink.codes(), vec![ErrorCode::ConnectionProcess]);
        assert_eq!(events.lock().len(), 1);
    }

    #[test]
    fn reconnect_ceiling_abandons_and_disconnects_without_error() {
        let (connection, transport, sink) =
            connected(&config("main").with_connect_attempts(2));
        let events = record(&connection);

        transport.signal(TransportSignal::Reconnecting);
        assert_eq!(connection.state(), ConnectionState::Reconnecting);
        transport.signal(TransportSignal::Reconnecting);

        assert_eq!(*transport.disconnects.lock(), 1);
        assert_eq!(connection.state(), ConnectionState::Disconnected);
        assert!(sink.codes().is_empty());
        let kinds: Vec<&str> = events.lock().iter().map(ConnectionEvent::kind).collect();
        assert_eq!(
            kinds,
            vec!["reconnecting", "reconnecting", "reconnectabandoned", "disconnect"]
        );
    }

    #[test]
    fn reconnecting_after_give_up_is_ignored() {
        let (connection, transport, _) = connected(&config("main").with_connect_attempts(1));
        transport.signal(TransportSignal::Reconnecting);
        assert_eq!(connection.state(), ConnectionState::Disconnected);
        let events = record(&connection);

        transport.signal(TransportSignal::Reconnecting);

        assert_eq!(*transport.disconnects.lock(), 1);
        assert_eq!(connection.state(), ConnectionState::Disconnected);
        assert!(events.lock().is_empty());
    }

    #[test]
    fn reconnect_resets_attempt_counter() {
        let (connection, transport, _) = connected(&config("main").with_connect_attempts(2));
        let events = record(&connection);

        transport.signal(TransportSignal::Reconnecting);
        transport.signal(TransportSignal::Reconnected);
        transport.signal(TransportSignal::Reconnecting);

        assert_eq!(connection.state(), ConnectionState::Reconnecting);
        assert_eq!(*transport.disconnects.lock(), 0);
        assert!(events
            .lock()
            .contains(&ConnectionEvent::Reconnecting { attempt: 1 }));
        assert!(!events
            .lock()
            .iter()
            .any(|event| matches!(event, ConnectionEvent::Reconnecting { attempt: 2 })));
    }

    #[test]
    fn dispose_disconnects_and_is_terminal() {
        let (connection, transport, _) = connected(&config("main"));
        let events = record(&connection);

        connection.dispose();
        connection.dispose();

        assert_eq!(connection.state(), ConnectionState::Disposed);
        assert_eq!(*transport.disconnects.lock(), 1);
        let kinds: Vec<&str> = events.lock().iter().map(ConnectionEvent::kind).collect();
        assert_eq!(kinds, vec!["disconnect", "dispose"]);
        assert_eq!(connection.events().listener_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn send_retries_then_drops() {
        let sink = RecordingSink::new();
        let transport = FakeTransport::pending();
        let connection = Connection::new(&config("main").with_send_policy(2, 10), sink);
        connection
            .create_client(&FakeFactory::new(transport.clone()))
            .unwrap();
        let events = record(&connection);

        connection.send(OutboundMessage::new("news", "x")).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(
            *events.lock(),
            vec![
                ConnectionEvent::SendRetryScheduled {
                    channel: "news".to_string(),
                    remaining: 1
                },
                ConnectionEvent::SendRetryScheduled {
                    channel: "news".to_string(),
                    remaining: 0
                },
                ConnectionEvent::SendDropped {
                    channel: "news".to_string()
                },
            ]
        );
        assert!(transport.sent.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn send_retry_delivers_once_connected() {
        let transport = FakeTransport::pending();
        let connection = Connection::new(&config("main").with_send_policy(3, 10), RecordingSink::new());
        connection
            .create_client(&FakeFactory::new(transport.clone()))
            .unwrap();
        connection.connect().unwrap();

        connection.send(OutboundMessage::new("news", "x")).unwrap();
        transport.confirm();
        tokio::time::sleep(Duration::from_millis(15)).await;

        assert_eq!(transport.sent_contents(), vec!["x".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn pending_retry_does_nothing_after_dispose() {
        let transport = FakeTransport::pending();
        let connection = Connection::new(&config("main").with_send_policy(3, 10), RecordingSink::new());
        connection
            .create_client(&FakeFactory::new(transport.clone()))
            .unwrap();
        let events = record(&connection);

        connection.send(OutboundMessage::new("news", "x")).unwrap();
        connection.dispose();
        tokio::time::sleep(Duration::from_millis(100)).await;

        let kinds: Vec<&str> = events.lock().iter().map(ConnectionEvent::kind).collect();
        assert_eq!(kinds, vec!["sendretry", "dispose"]);
    }
}

//! XrtmlRuntime - wires connections to consumers.
//!
//! Inbound: every envelope a managed connection decodes is re-fired by the
//! manager and dispatched by the broker. Outbound: consumers send envelopes
//! stamped with their own id through the manager.

use std::sync::Arc;
use tracing::{debug, info};

use super::broker::MessageBroker;
use super::connection::Connection;
use super::connection_manager::{ConnectionManager, ManagerEvent, SendRequest, SendSummary};
use super::consumer::{MessageHandler, TagRuntime};
use crate::config::AppConfig;
use crate::domain::foundation::{ErrorCode, XrtmlError};
use crate::domain::message::Envelope;
use crate::ports::{ErrorSink, TransportFactory};

/// An envelope addressed to connections and a channel.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundEnvelope {
    pub connections: Vec<String>,
    pub channel: String,
    pub message: Envelope,
    pub send_only: bool,
}

impl OutboundEnvelope {
    pub fn new(
        connections: impl IntoIterator<Item = impl Into<String>>,
        channel: impl Into<String>,
        message: Envelope,
    ) -> Self {
        Self {
            connections: connections.into_iter().map(Into::into).collect(),
            channel: channel.into(),
            message,
            send_only: false,
        }
    }

    pub fn send_only(mut self) -> Self {
        self.send_only = true;
        self
    }
}

pub struct XrtmlRuntime {
    manager: ConnectionManager,
    broker: MessageBroker,
    errors: Arc<dyn ErrorSink>,
}

impl XrtmlRuntime {
    pub fn new(factory: Arc<dyn TransportFactory>, errors: Arc<dyn ErrorSink>) -> Self {
        let manager = ConnectionManager::new(factory, errors.clone());
        let broker = MessageBroker::new(errors.clone());

        let dispatcher = broker.clone();
        manager.on(move |event| {
            if let ManagerEvent::XrtmlMessage {
                connection,
                channel,
                message,
            } = event
            {
                debug!(connection_id = %connection, channel = %channel, "routing envelope");
                if let Err(err) = dispatcher.trigger_tags(message) {
                    debug!(connection_id = %connection, error = %err, "dispatch aborted");
                }
            }
        });

        Self {
            manager,
            broker,
            errors,
        }
    }

    /// Builds a runtime and creates every configured connection.
    pub fn from_config(
        config: &AppConfig,
        factory: Arc<dyn TransportFactory>,
        errors: Arc<dyn ErrorSink>,
    ) -> Self {
        let runtime = Self::new(factory, errors);
        for connection in &config.connections {
            runtime.manager.create(connection);
        }
        info!(connections = runtime.manager.len(), "runtime started");
        runtime
    }

    pub fn manager(&self) -> &ConnectionManager {
        &self.manager
    }

    pub fn broker(&self) -> &MessageBroker {
        &self.broker
    }

    pub fn connection(&self, id: &str) -> Option<Arc<Connection>> {
        self.manager.get_by_id(id)
    }

    pub fn register(&self, handler: Arc<dyn MessageHandler>) -> Result<(), XrtmlError> {
        self.broker.register(handler)
    }

    /// Sends an envelope on behalf of a consumer.
    ///
    /// The envelope's sender id is set to the consumer's id so that the
    /// consumer does not receive its own message back.
    pub fn send_message(
        &self,
        sender: &TagRuntime,
        outbound: OutboundEnvelope,
    ) -> Result<SendSummary, XrtmlError> {
        if sender.is_disposed() {
            self.errors.raise(
                XrtmlError::new(ErrorCode::TagNotCreated, "Consumer has been disposed")
                    .with_target(sender.id().to_string()),
            )?;
            return Ok(SendSummary::default());
        }

        let message = outbound.message.with_sender(sender.id().as_str());
        let content = match message.stringify() {
            Ok(content) => content,
            Err(err) => {
                self.errors.raise(
                    XrtmlError::from(err).with_target(sender.id().to_string()),
                )?;
                return Ok(SendSummary::default());
            }
        };

        let mut request = SendRequest::new(outbound.connections, outbound.channel, content);
        request.send_only = outbound.send_only;
        self.manager.send_message(&request)
    }

    /// Disposes every connection.
    pub fn shutdown(&self) {
        self.manager.dispose_all();
        info!("runtime stopped");
    }
}

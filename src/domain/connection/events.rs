//! Notifications a connection emits over its lifetime.

use crate::domain::message::Envelope;

use super::channel::InboundMessage;

#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    /// Transport client instantiated.
    Created,
    Connect,
    Disconnect,
    Subscribe { channel: String },
    Unsubscribe { channel: String },
    /// The transport reported a lost session; `attempt` counts since the
    /// last successful (re)connect.
    Reconnecting { attempt: u32 },
    Reconnect,
    /// The reconnect ceiling was reached and the transport was stopped.
    ReconnectAbandoned { attempts: u32 },
    Exception { error: String },
    /// Every processed inbound message.
    Message(InboundMessage),
    /// Inbound messages that decoded as envelopes, in addition to `Message`.
    XrtmlMessage { channel: String, message: Envelope },
    SendRetryScheduled { channel: String, remaining: u32 },
    SendDropped { channel: String },
    Dispose,
}

impl ConnectionEvent {
    /// Short event name, as used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ConnectionEvent::Created => "create",
            ConnectionEvent::Connect => "connect",
            ConnectionEvent::Disconnect => "disconnect",
            ConnectionEvent::Subscribe { .. } => "subscribe",
            ConnectionEvent::Unsubscribe { .. } => "unsubscribe",
            ConnectionEvent::Reconnecting { .. } => "reconnecting",
            ConnectionEvent::Reconnect => "reconnect",
            ConnectionEvent::ReconnectAbandoned { .. } => "reconnectabandoned",
            ConnectionEvent::Exception { .. } => "exception",
            ConnectionEvent::Message(_) => "message",
            ConnectionEvent::XrtmlMessage { .. } => "xrtmlmessage",
            ConnectionEvent::SendRetryScheduled { .. } => "sendretry",
            ConnectionEvent::SendDropped { .. } => "senddropped",
            ConnectionEvent::Dispose => "dispose",
        }
    }
}

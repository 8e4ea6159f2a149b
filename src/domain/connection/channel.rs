//! Channels and the messages that travel on them.

use std::fmt;
use std::sync::Arc;

/// A message received on a channel, after the send-only sentinel has been
/// stripped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub channel: String,
    pub message: String,
}

impl InboundMessage {
    pub fn new(channel: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            message: message.into(),
        }
    }
}

/// A message handed to a connection for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub channel: String,
    pub content: String,
    /// Deliver to everyone but the sending connection.
    pub send_only: bool,
}

impl OutboundMessage {
    pub fn new(channel: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            content: content.into(),
            send_only: false,
        }
    }

    pub fn send_only(mut self) -> Self {
        self.send_only = true;
        self
    }
}

/// What a connection did with an [`OutboundMessage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Handed to a connected transport.
    Sent,
    /// Not connected yet; a timed retry is pending.
    RetryScheduled,
    /// Refused: the connection is inactive or the transport rejected it.
    Refused,
    /// Given up on after the retries ran out, or the connection is gone.
    Dropped,
}

impl SendOutcome {
    pub fn is_sent(&self) -> bool {
        matches!(self, SendOutcome::Sent)
    }
}

/// Rewrites an inbound payload before it is interpreted.
///
/// An `Err` is reported as `CONNECTION_ADAPT`.
pub type MessageAdapter = Arc<dyn Fn(&InboundMessage) -> Result<String, String> + Send + Sync>;

/// Called with every (adapted) message delivered on a channel.
pub type ChannelHandler = Arc<dyn Fn(&InboundMessage) + Send + Sync>;

/// A named pub/sub topic within a connection.
#[derive(Clone)]
pub struct Channel {
    pub name: String,
    /// Issue a subscribe request for this channel when connected.
    pub subscribe: bool,
    /// Ask the transport to restore the subscription after a reconnect.
    pub subscribe_on_reconnect: bool,
    pub message_adapter: Option<MessageAdapter>,
    pub on_message: Option<ChannelHandler>,
    subscribed: bool,
}

impl Channel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            subscribe: true,
            subscribe_on_reconnect: true,
            message_adapter: None,
            on_message: None,
            subscribed: false,
        }
    }

    pub fn with_subscribe(mut self, subscribe: bool) -> Self {
        self.subscribe = subscribe;
        self
    }

    pub fn with_subscribe_on_reconnect(mut self, subscribe_on_reconnect: bool) -> Self {
        self.subscribe_on_reconnect = subscribe_on_reconnect;
        self
    }

    pub fn with_adapter<F>(mut self, adapter: F) -> Self
    where
        F: Fn(&InboundMessage) -> Result<String, String> + Send + Sync + 'static,
    {
        self.message_adapter = Some(Arc::new(adapter));
        self
    }

    pub fn with_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&InboundMessage) + Send + Sync + 'static,
    {
        self.on_message = Some(Arc::new(handler));
        self
    }

    /// Whether the transport has confirmed the subscription.
    pub fn is_subscribed(&self) -> bool {
        self.subscribed
    }

    pub(crate) fn mark_subscribed(&mut self, subscribed: bool) {
        self.subscribed = subscribed;
    }
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("name", &self.name)
            .field("subscribe", &self.subscribe)
            .field("subscribe_on_reconnect", &self.subscribe_on_reconnect)
            .field("has_adapter", &self.message_adapter.is_some())
            .field("has_handler", &self.on_message.is_some())
            .field("subscribed", &self.subscribed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_defaults_subscribe_on_both_flags() {
        let channel = Channel::new("news");
        assert!(channel.subscribe);
        assert!(channel.subscribe_on_reconnect);
        assert!(!channel.is_subscribed());
    }

    #[test]
    fn channel_adapter_is_callable() {
        let channel = Channel::new("news").with_adapter(|m| Ok(m.message.to_uppercase()));
        let adapter = channel.message_adapter.unwrap();
        assert_eq!(
            adapter(&InboundMessage::new("news", "hi")),
            Ok("HI".to_string())
        );
    }

    #[test]
    fn outbound_send_only_builder() {
        let message = OutboundMessage::new("news", "x").send_only();
        assert!(message.send_only);
    }
}

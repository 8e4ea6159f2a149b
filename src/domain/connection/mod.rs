//! Connection module - lifecycle states, channels and connection events.

mod channel;
mod events;
mod state;

pub use channel::{
    Channel, ChannelHandler, InboundMessage, MessageAdapter, OutboundMessage, SendOutcome,
};
pub use events::ConnectionEvent;
pub use state::ConnectionState;

//! Application layer - connections, routing and consumer dispatch.
//!
//! Orchestrates the domain types over the transport and error ports:
//! [`Connection`] drives one transport session, [`ConnectionManager`] routes
//! across sessions, [`MessageBroker`] fans envelopes out to consumers, and
//! [`XrtmlRuntime`] wires the two directions together.

mod broker;
mod connection;
mod connection_manager;
mod consumer;
mod runtime;
mod trigger_registry;

#[cfg(test)]
pub(crate) mod test_support;

pub use broker::MessageBroker;
pub use connection::Connection;
pub use connection_manager::{ConnectionManager, ManagerEvent, SendRequest, SendSummary};
pub use consumer::{
    apply_mappings, ActionHandler, ActionNotFound, FieldMapping, Handled, MessageHandler,
    TagEvent, TagRuntime, TriggerBinding,
};
pub use runtime::{OutboundEnvelope, XrtmlRuntime};
pub use trigger_registry::{Registration, TriggerRegistry};

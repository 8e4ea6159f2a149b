//! Domain layer containing the routing vocabulary.
//!
//! # Module Organization
//!
//! - `foundation` - Shared primitives (IDs, timestamps, events, errors)
//! - `message` - The envelope, its wire codec and the send-only sentinel
//! - `connection` - Connection lifecycle states, channels and events

pub mod connection;
pub mod foundation;
pub mod message;

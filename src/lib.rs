//! xRTML - real-time messaging routing core
//!
//! This crate manages named connections to a pub/sub backend, encodes and
//! decodes the `xrtml` wire envelope, and dispatches inbound envelopes to
//! consumers by trigger name.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

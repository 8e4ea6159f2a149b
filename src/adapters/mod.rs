//! Adapters - Implementations of port interfaces.
//!
//! - `transport` - In-memory pub/sub backend implementing the transport ports
//! - `errors` - Error reporter (the default `ErrorSink`) and trace collectors

pub mod errors;
pub mod transport;

pub use errors::{ErrorReporter, HttpTraceCollector};
pub use transport::{InMemoryHub, InMemoryTransport, InMemoryTransportFactory};

//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the routing core and the outside world. Adapters implement these ports.
//!
//! ## Transport Ports
//!
//! - `Transport` - One client session against the messaging backend
//! - `TransportFactory` - Instantiates transports for connections
//! - `TransportListener` - Receives transport lifecycle and data signals
//!
//! ## Error Ports
//!
//! - `ErrorSink` - Centralized error notification
//! - `TraceCollector` - Remote collection of raised errors

mod error_sink;
mod trace_collector;
mod transport;

pub use error_sink::ErrorSink;
pub use trace_collector::{TraceCollector, TraceError, TraceRecord};
pub use transport::{
    ConnectRequest, Transport, TransportError, TransportFactory, TransportListener,
    TransportSignal,
};

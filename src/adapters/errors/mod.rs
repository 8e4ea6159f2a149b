//! Error reporting adapters.

mod http_collector;
mod reporter;

pub use http_collector::HttpTraceCollector;
pub use reporter::ErrorReporter;

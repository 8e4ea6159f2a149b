//! Centralized error reporter.
//!
//! Implements the [`ErrorSink`] port: every raised error is logged, shipped
//! to the optional trace collector in the background and emitted to
//! observers. Whether `raise` interrupts the caller is decided by the
//! `throw_on_error` setting.

use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{debug, error, warn};

use super::http_collector::HttpTraceCollector;
use crate::config::RuntimeConfig;
use crate::domain::foundation::{EventEmitter, ListenerId, XrtmlError};
use crate::ports::{ErrorSink, TraceCollector, TraceError, TraceRecord};

pub struct ErrorReporter {
    throw_on_error: bool,
    collector: Option<Arc<dyn TraceCollector>>,
    events: EventEmitter<XrtmlError>,
}

impl ErrorReporter {
    pub fn new(throw_on_error: bool) -> Self {
        Self {
            throw_on_error,
            collector: None,
            events: EventEmitter::new(),
        }
    }

    /// Builds a reporter from runtime settings, with an HTTP collector when
    /// a trace URL is configured.
    pub fn from_config(config: &RuntimeConfig) -> Result<Self, TraceError> {
        let reporter = Self::new(config.throw_on_error);
        match &config.trace_url {
            Some(url) => {
                let collector = HttpTraceCollector::new(url.clone(), config.trace_timeout())?;
                Ok(reporter.with_collector(Arc::new(collector)))
            }
            None => Ok(reporter),
        }
    }

    pub fn with_collector(mut self, collector: Arc<dyn TraceCollector>) -> Self {
        self.collector = Some(collector);
        self
    }

    /// Registers an observer for every reported error.
    pub fn subscribe<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&XrtmlError) + Send + Sync + 'static,
    {
        self.events.on(listener)
    }

    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.events.off(id)
    }

    fn forward(&self, error: &XrtmlError) {
        let Some(collector) = self.collector.clone() else {
            return;
        };
        let Ok(handle) = Handle::try_current() else {
            debug!(collector = collector.name(), "no runtime, trace not collected");
            return;
        };

        let record = TraceRecord::from(error);
        handle.spawn(async move {
            if let Err(err) = collector.collect(record).await {
                warn!(collector = collector.name(), error = %err, "trace collection failed");
            }
        });
    }
}

impl ErrorSink for ErrorReporter {
    fn report(&self, err: &XrtmlError) {
        let subject = err.target.as_deref().unwrap_or("-");
        if err.category().is_severe() {
            error!(name = %err.name(), code = %err.code, subject, info = ?err.info, "{}", err.message);
        } else {
            warn!(name = %err.name(), code = %err.code, subject, info = ?err.info, "{}", err.message);
        }

        self.forward(err);
        self.events.emit(err);
    }

    fn throws(&self) -> bool {
        self.throw_on_error
    }
}

impl std::fmt::Debug for ErrorReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorReporter")
            .field("throw_on_error", &self.throw_on_error)
            .field("collector", &self.collector.as_ref().map(|c| c.name()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::ErrorCode;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::time::Duration;
    use tokio::sync::mpsc;

    struct ChannelCollector {
        tx: mpsc::UnboundedSender<TraceRecord>,
    }

    #[async_trait]
    impl TraceCollector for ChannelCollector {
        async fn collect(&self, record: TraceRecord) -> Result<(), TraceError> {
            self.tx
                .send(record)
                .map_err(|err| TraceError::Request(err.to_string()))
        }

        fn name(&self) -> &'static str {
            "channel"
        }
    }

    #[test]
    fn raise_follows_throw_setting() {
        let lenient = ErrorReporter::new(false);
        let strict = ErrorReporter::new(true);
        let error = XrtmlError::new(ErrorCode::ConnectionNotFound, "missing");

        assert!(lenient.raise(error.clone()).is_ok());
        assert_eq!(strict.raise(error).unwrap_err().code, ErrorCode::ConnectionNotFound);
    }

    #[test]
    fn observers_receive_reported_errors() {
        let reporter = ErrorReporter::new(false);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        let id = reporter.subscribe(move |err| s.lock().push(err.code));

        reporter.report(&XrtmlError::new(ErrorCode::TagInactive, "inactive"));
        reporter.unsubscribe(id);
        reporter.report(&XrtmlError::new(ErrorCode::Fatal, "fatal"));

        assert_eq!(*seen.lock(), vec![ErrorCode::TagInactive]);
    }

    #[test]
    fn report_without_runtime_skips_collection() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let reporter =
            ErrorReporter::new(false).with_collector(Arc::new(ChannelCollector { tx }));

        reporter.report(&XrtmlError::new(ErrorCode::Unexpected, "boom"));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn report_forwards_to_collector() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let reporter =
            ErrorReporter::new(false).with_collector(Arc::new(ChannelCollector { tx }));

        reporter.report(
            &XrtmlError::new(ErrorCode::OrtcException, "lost").with_target("main"),
        );

        let record = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.code, "ORTC_EXCEPTION");
        assert_eq!(record.name, "ORTCError");
        assert_eq!(record.target.as_deref(), Some("main"));
    }

    #[test]
    fn from_config_without_trace_url_has_no_collector() {
        let reporter = ErrorReporter::from_config(&RuntimeConfig::default()).unwrap();
        assert!(reporter.collector.is_none());
        assert!(!reporter.throws());
    }
}

//! ErrorSink port - Centralized error notification.
//!
//! Errors are *raised*, not thrown: the sink records them (log, remote
//! trace, observers) and control flow continues. Only a sink configured to
//! throw turns `raise` into an `Err` the caller propagates with `?`.
//!
//! # Example
//!
//! ```ignore
//! for id in recipients {
//!     match manager.get_by_id(id) {
//!         Some(connection) => connection.send(message.clone()),
//!         // Keeps looping unless the sink throws
//!         None => errors.raise(not_found(id))?,
//!     }
//! }
//! ```

use crate::domain::foundation::XrtmlError;

pub trait ErrorSink: Send + Sync {
    /// Records the error without affecting control flow.
    fn report(&self, error: &XrtmlError);

    /// Whether raised errors should interrupt the caller.
    fn throws(&self) -> bool;

    /// Reports the error, returning it as `Err` only if the sink throws.
    fn raise(&self, error: XrtmlError) -> Result<(), XrtmlError> {
        self.report(&error);
        if self.throws() {
            Err(error)
        } else {
            Ok(())
        }
    }

    /// Reports the error and hands it back, for paths that always fail.
    fn fail(&self, error: XrtmlError) -> XrtmlError {
        self.report(&error);
        error
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::ErrorCode;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSink {
        reported: AtomicUsize,
        throws: bool,
    }

    impl ErrorSink for CountingSink {
        fn report(&self, _error: &XrtmlError) {
            self.reported.fetch_add(1, Ordering::SeqCst);
        }

        fn throws(&self) -> bool {
            self.throws
        }
    }

    #[allow(dead_code)]
    fn assert_object_safe(_: &dyn ErrorSink) {}

    #[test]
    fn raise_continues_when_not_throwing() {
        let sink = CountingSink {
            reported: AtomicUsize::new(0),
            throws: false,
        };
        assert!(sink
            .raise(XrtmlError::new(ErrorCode::ConnectionNotFound, "x"))
            .is_ok());
        assert_eq!(sink.reported.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn raise_returns_error_when_throwing() {
        let sink = CountingSink {
            reported: AtomicUsize::new(0),
            throws: true,
        };
        let err = sink
            .raise(XrtmlError::new(ErrorCode::ConnectionNotFound, "x"))
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ConnectionNotFound);
        assert_eq!(sink.reported.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn fail_reports_and_returns() {
        let sink = CountingSink {
            reported: AtomicUsize::new(0),
            throws: false,
        };
        let err = sink.fail(XrtmlError::new(ErrorCode::OrtcUnavailable, "x"));
        assert_eq!(err.code, ErrorCode::OrtcUnavailable);
        assert_eq!(sink.reported.load(Ordering::SeqCst), 1);
    }
}

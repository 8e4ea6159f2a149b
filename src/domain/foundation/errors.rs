//! Error types shared by every layer.
//!
//! `XrtmlError` is the structured error raised through the error sink. Its
//! `category` is the error "name" consumers see (`ConnectionError`,
//! `ORTCError`, ...) and its `code` is the specific error "type".

use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

use super::Timestamp;

/// Error families, rendered as the error name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Connection,
    Ortc,
    Tag,
    Message,
    Parse,
    Request,
    Method,
    Unexpected,
    Fatal,
}

impl ErrorCategory {
    /// Whether errors of this family indicate a broken setup rather than a
    /// recoverable runtime condition.
    pub fn is_severe(&self) -> bool {
        matches!(self, ErrorCategory::Fatal | ErrorCategory::Unexpected)
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorCategory::Connection => "ConnectionError",
            ErrorCategory::Ortc => "ORTCError",
            ErrorCategory::Tag => "TagError",
            ErrorCategory::Message => "MessageError",
            ErrorCategory::Parse => "ParseError",
            ErrorCategory::Request => "RequestError",
            ErrorCategory::Method => "MethodError",
            ErrorCategory::Unexpected => "UnexpectedError",
            ErrorCategory::Fatal => "FatalError",
        };
        write!(f, "{}", s)
    }
}

/// Error codes organized by category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // Connection errors
    ConnectionInactive,
    ConnectionNotFound,
    ConnectionProcess,
    ConnectionAdapt,

    // Transport errors
    OrtcNotFound,
    OrtcUnavailable,
    OrtcDisconnected,
    OrtcException,

    // Consumer errors
    TagNotCreated,
    TagInactive,
    TagUnregistered,
    TagActionUndefined,

    // Message errors
    InvalidMessage,
    TriggerUnregistered,

    // Parse errors
    JsonParse,

    // Request errors
    RequestFailed,

    // Method errors
    MissingArgument,
    InvalidArgument,

    // Catch-alls
    Unexpected,
    Fatal,
}

impl ErrorCode {
    /// Returns the family this code belongs to.
    pub fn category(&self) -> ErrorCategory {
        use ErrorCode::*;
        match self {
            ConnectionInactive | ConnectionNotFound | ConnectionProcess | ConnectionAdapt => {
                ErrorCategory::Connection
            }
            OrtcNotFound | OrtcUnavailable | OrtcDisconnected | OrtcException => ErrorCategory::Ortc,
            TagNotCreated | TagInactive | TagUnregistered | TagActionUndefined => ErrorCategory::Tag,
            InvalidMessage | TriggerUnregistered => ErrorCategory::Message,
            JsonParse => ErrorCategory::Parse,
            RequestFailed => ErrorCategory::Request,
            MissingArgument | InvalidArgument => ErrorCategory::Method,
            Unexpected => ErrorCategory::Unexpected,
            Fatal => ErrorCategory::Fatal,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorCode::ConnectionInactive => "CONNECTION_INACTIVE",
            ErrorCode::ConnectionNotFound => "CONNECTION_NOT_FOUND",
            ErrorCode::ConnectionProcess => "CONNECTION_PROCESS",
            ErrorCode::ConnectionAdapt => "CONNECTION_ADAPT",
            ErrorCode::OrtcNotFound => "ORTC_NOT_FOUND",
            ErrorCode::OrtcUnavailable => "ORTC_UNAVAILABLE",
            ErrorCode::OrtcDisconnected => "ORTC_DISCONNECTED",
            ErrorCode::OrtcException => "ORTC_EXCEPTION",
            ErrorCode::TagNotCreated => "TAG_NOT_CREATED",
            ErrorCode::TagInactive => "TAG_INACTIVE",
            ErrorCode::TagUnregistered => "TAG_UNREGISTERED",
            ErrorCode::TagActionUndefined => "TAG_ACTION_UNDEFINED",
            ErrorCode::InvalidMessage => "INVALID_MESSAGE",
            ErrorCode::TriggerUnregistered => "TRIGGER_UNREGISTERED",
            ErrorCode::JsonParse => "JSON_PARSE",
            ErrorCode::RequestFailed => "REQUEST_FAILED",
            ErrorCode::MissingArgument => "MISSING_ARGUMENT",
            ErrorCode::InvalidArgument => "INVALID_ARGUMENT",
            ErrorCode::Unexpected => "UNEXPECTED",
            ErrorCode::Fatal => "FATAL",
        };
        write!(f, "{}", s)
    }
}

/// Structured error raised through the error sink.
///
/// `target` names the object the error is about (a connection id, a consumer
/// id, a trigger); `info` carries free-form context.
#[derive(Debug, Clone, Error)]
#[error("[{code}] {message}")]
pub struct XrtmlError {
    pub code: ErrorCode,
    pub message: String,
    pub target: Option<String>,
    pub info: HashMap<String, String>,
    pub occurred_at: Timestamp,
}

impl XrtmlError {
    /// Creates a new error.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            target: None,
            info: HashMap::new(),
            occurred_at: Timestamp::now(),
        }
    }

    /// Sets the object this error is about.
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    /// Adds a context entry.
    pub fn with_info(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.info.insert(key.into(), value.into());
        self
    }

    /// The error family, rendered as the error name.
    pub fn category(&self) -> ErrorCategory {
        self.code.category()
    }

    /// The error name (`ConnectionError`, `ORTCError`, ...).
    pub fn name(&self) -> String {
        self.category().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn xrtml_error_displays_code_and_message() {
        let err = XrtmlError::new(ErrorCode::ConnectionNotFound, "Connection not found");
        assert_eq!(
            format!("{}", err),
            "[CONNECTION_NOT_FOUND] Connection not found"
        );
    }

    #[test]
    fn xrtml_error_name_follows_category() {
        assert_eq!(
            XrtmlError::new(ErrorCode::OrtcUnavailable, "x").name(),
            "ORTCError"
        );
        assert_eq!(
            XrtmlError::new(ErrorCode::TagActionUndefined, "x").name(),
            "TagError"
        );
        assert_eq!(XrtmlError::new(ErrorCode::JsonParse, "x").name(), "ParseError");
    }

    #[test]
    fn xrtml_error_builders_set_target_and_info() {
        let err = XrtmlError::new(ErrorCode::ConnectionAdapt, "adapter failed")
            .with_target("conn-1")
            .with_info("channel", "news");

        assert_eq!(err.target.as_deref(), Some("conn-1"));
        assert_eq!(err.info.get("channel"), Some(&"news".to_string()));
    }

    #[test]
    fn only_fatal_and_unexpected_are_severe() {
        assert!(ErrorCode::Fatal.category().is_severe());
        assert!(ErrorCode::Unexpected.category().is_severe());
        assert!(!ErrorCode::ConnectionNotFound.category().is_severe());
    }
}

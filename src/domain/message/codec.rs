//! Envelope validation and wire transcoding.
//!
//! Wire form:
//!
//! ```text
//! {"xrtml":{"s":<senderId>,"t":<trigger>,"a":<action>,"d":<payload>}}
//! ```
//!
//! A string is an envelope only if its first quoted token is exactly
//! `xrtml` and the whole string parses as JSON. Validation returns a
//! [`Validity`] and never logs; callers decide whether an invalid payload is
//! worth reporting.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::domain::foundation::{ErrorCode, XrtmlError};

use super::envelope::{Envelope, TriggerSpec};

/// Root property every wire envelope is nested under.
pub const ENVELOPE_KEY: &str = "xrtml";

/// Why a payload is not an envelope.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidReason {
    #[error("first property is {found:?}, expected \"xrtml\"")]
    WrongRootKey { found: Option<String> },

    #[error("malformed JSON: {0}")]
    MalformedJson(String),

    #[error("missing or falsy \"xrtml\" property")]
    MissingEnvelope,
}

/// Outcome of an envelope check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validity {
    Valid,
    Invalid(InvalidReason),
}

impl Validity {
    pub fn is_valid(&self) -> bool {
        matches!(self, Validity::Valid)
    }

    pub fn into_result(self) -> Result<(), InvalidReason> {
        match self {
            Validity::Valid => Ok(()),
            Validity::Invalid(reason) => Err(reason),
        }
    }
}

/// Errors raised while transcoding envelopes.
#[derive(Debug, Clone, Error)]
pub enum MessageError {
    #[error("invalid message: {0}")]
    Invalid(#[from] InvalidReason),

    #[error("malformed envelope: {0}")]
    Malformed(String),

    #[error("envelope data is not valid JSON: {0}")]
    DataNotJson(String),

    #[error("envelope serialization failed: {0}")]
    Serialization(String),
}

impl From<MessageError> for XrtmlError {
    fn from(err: MessageError) -> Self {
        let code = match &err {
            MessageError::Invalid(_) | MessageError::Malformed(_) => ErrorCode::InvalidMessage,
            MessageError::DataNotJson(_) => ErrorCode::JsonParse,
            MessageError::Serialization(_) => ErrorCode::Unexpected,
        };
        XrtmlError::new(code, err.to_string())
    }
}

#[derive(Serialize)]
struct WireRootRef<'a> {
    xrtml: WireEnvelopeRef<'a>,
}

#[derive(Serialize)]
struct WireEnvelopeRef<'a> {
    #[serde(rename = "s", skip_serializing_if = "Option::is_none")]
    sender_id: Option<&'a str>,
    #[serde(rename = "t", skip_serializing_if = "Option::is_none")]
    trigger: Option<&'a TriggerSpec>,
    #[serde(rename = "a", skip_serializing_if = "Option::is_none")]
    action: Option<&'a str>,
    #[serde(rename = "d", skip_serializing_if = "is_null")]
    data: &'a Value,
}

#[derive(Deserialize)]
struct WireRoot {
    xrtml: WireEnvelope,
}

#[derive(Deserialize)]
struct WireEnvelope {
    #[serde(rename = "s", default)]
    sender_id: Option<String>,
    #[serde(rename = "t", default)]
    trigger: Option<TriggerSpec>,
    #[serde(rename = "a", default)]
    action: Option<String>,
    #[serde(rename = "d", default)]
    data: Value,
}

/// Checks whether a raw string is a wire envelope.
pub fn validate(raw: &str) -> Validity {
    match first_quoted_token(raw) {
        Some(ENVELOPE_KEY) => {}
        found => {
            return Validity::Invalid(InvalidReason::WrongRootKey {
                found: found.map(str::to_string),
            })
        }
    }

    match serde_json::from_str::<Value>(raw) {
        Ok(_) => Validity::Valid,
        Err(err) => Validity::Invalid(InvalidReason::MalformedJson(err.to_string())),
    }
}

/// Checks whether an already-parsed value carries a truthy `xrtml` property.
pub fn validate_value(value: &Value) -> Validity {
    match value.get(ENVELOPE_KEY) {
        Some(inner) if is_truthy(inner) => Validity::Valid,
        _ => Validity::Invalid(InvalidReason::MissingEnvelope),
    }
}

/// Shorthand for `validate(raw).is_valid()`.
pub fn is_valid(raw: &str) -> bool {
    validate(raw).is_valid()
}

/// Expands a wire string into an [`Envelope`].
///
/// The short keys `s/t/a/d` become `sender_id/trigger/action/data`; the
/// payload itself is left untouched. Input that is not an envelope yields
/// `Err` instead of being passed through unchanged.
pub fn decode(raw: &str) -> Result<Envelope, MessageError> {
    validate(raw).into_result()?;

    let root: WireRoot =
        serde_json::from_str(raw).map_err(|err| MessageError::Malformed(err.to_string()))?;
    let wire = root.xrtml;

    Ok(Envelope {
        sender_id: wire.sender_id,
        trigger: wire.trigger,
        action: wire.action,
        data: wire.data,
    })
}

/// Collapses an [`Envelope`] into its wire string.
///
/// String data is parsed as JSON first so that it is embedded as structured
/// data rather than double-encoded.
pub fn encode(envelope: &Envelope) -> Result<String, MessageError> {
    let data = match &envelope.data {
        Value::String(text) => serde_json::from_str::<Value>(text)
            .map_err(|err| MessageError::DataNotJson(err.to_string()))?,
        other => other.clone(),
    };

    let root = WireRootRef {
        xrtml: WireEnvelopeRef {
            sender_id: envelope.sender_id.as_deref(),
            trigger: envelope.trigger.as_ref(),
            action: envelope.action.as_deref(),
            data: &data,
        },
    };

    serde_json::to_string(&root).map_err(|err| MessageError::Serialization(err.to_string()))
}

fn is_null(data: &&Value) -> bool {
    data.is_null()
}

fn first_quoted_token(raw: &str) -> Option<&str> {
    let start = raw.find('"')? + 1;
    let len = raw[start..].find('"')?;
    Some(&raw[start..start + len])
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(true, |f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

//! Send-only sentinel.
//!
//! A connection that sends with `send_only` prefixes the content with
//! `_X_SEND_ONLY_X_<internal id>_X_`. When the backend echoes the message
//! back, the sending connection recognises its own id and drops the copy;
//! every other connection strips the prefix and processes the content.

use crate::domain::foundation::ConnectionInternalId;

pub const SEND_ONLY_PREFIX: &str = "_X_SEND_ONLY_X_";
pub const SEND_ONLY_SUFFIX: &str = "_X_";

/// Width of the sender id between prefix and suffix.
pub const SENDER_ID_LEN: usize = 36;

/// What an inbound payload looks like with respect to the sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sentinel<'a> {
    /// No (well-formed) sentinel; the payload is used as is.
    Plain(&'a str),
    /// Sent with `send_only` by the connection `sender_id`.
    SendOnly { sender_id: &'a str, content: &'a str },
}

/// Prefixes content with the send-only sentinel for `sender`.
pub fn wrap(sender: &ConnectionInternalId, content: &str) -> String {
    format!("{}{}{}{}", SEND_ONLY_PREFIX, sender, SEND_ONLY_SUFFIX, content)
}

/// Splits an inbound payload into sentinel sender and content.
pub fn inspect(raw: &str) -> Sentinel<'_> {
    let Some(rest) = raw.strip_prefix(SEND_ONLY_PREFIX) else {
        return Sentinel::Plain(raw);
    };
    if rest.len() < SENDER_ID_LEN || !rest.is_char_boundary(SENDER_ID_LEN) {
        return Sentinel::Plain(raw);
    }

    let (sender_id, tail) = rest.split_at(SENDER_ID_LEN);
    match tail.strip_prefix(SEND_ONLY_SUFFIX) {
        Some(content) => Sentinel::SendOnly { sender_id, content },
        None => Sentinel::Plain(raw),
    }
}

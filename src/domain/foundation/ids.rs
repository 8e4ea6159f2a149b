//! Strongly-typed identifier value objects.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Internally generated identity of a connection.
///
/// Renders as a 36-character hyphenated UUID, which is the width the
/// send-only sentinel reserves for the sender id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionInternalId(Uuid);

impl ConnectionInternalId {
    /// Creates a new random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an id from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the inner UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ConnectionInternalId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionInternalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for ConnectionInternalId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Internal identity of a message consumer.
///
/// Outbound envelopes carry it as `senderId`, which is what the broker
/// compares against when suppressing a consumer's own messages.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConsumerId(String);

impl ConsumerId {
    /// Creates a new random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ConsumerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConsumerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ConsumerId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ConsumerId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_internal_id_renders_36_chars() {
        let id = ConnectionInternalId::new();
        assert_eq!(id.to_string().len(), 36);
    }

    #[test]
    fn connection_internal_id_parses_its_display() {
        let id = ConnectionInternalId::new();
        let parsed: ConnectionInternalId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn connection_internal_ids_are_unique() {
        assert_ne!(ConnectionInternalId::new(), ConnectionInternalId::new());
    }

    #[test]
    fn consumer_id_from_str_keeps_value() {
        let id = ConsumerId::from("c1");
        assert_eq!(id.as_str(), "c1");
        assert_eq!(id.to_string(), "c1");
    }
}

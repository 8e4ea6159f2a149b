//! The routed message envelope.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::codec::{self, MessageError};

/// Action name that reaches a consumer even while it is inactive.
pub const ACTIVATE_ACTION: &str = "activate";

/// Action name that switches a consumer off.
pub const DEACTIVATE_ACTION: &str = "deactivate";

/// One entry of a multi-trigger envelope.
///
/// Senders write either a bare trigger name or an object with a `name`
/// field; both are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TriggerDescriptor {
    Name(String),
    Named { name: String },
}

impl TriggerDescriptor {
    pub fn name(&self) -> &str {
        match self {
            TriggerDescriptor::Name(name) => name,
            TriggerDescriptor::Named { name } => name,
        }
    }
}

/// The trigger field of an envelope: a single name or an ordered list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TriggerSpec {
    Single(String),
    Many(Vec<TriggerDescriptor>),
}

impl TriggerSpec {
    /// Trigger names in dispatch order. Duplicates are kept.
    pub fn names(&self) -> Vec<&str> {
        match self {
            TriggerSpec::Single(name) => vec![name.as_str()],
            TriggerSpec::Many(descriptors) => descriptors.iter().map(|d| d.name()).collect(),
        }
    }
}

impl From<&str> for TriggerSpec {
    fn from(name: &str) -> Self {
        TriggerSpec::Single(name.to_string())
    }
}

impl From<String> for TriggerSpec {
    fn from(name: String) -> Self {
        TriggerSpec::Single(name)
    }
}

impl From<Vec<&str>> for TriggerSpec {
    fn from(names: Vec<&str>) -> Self {
        TriggerSpec::Many(
            names
                .into_iter()
                .map(|name| TriggerDescriptor::Named {
                    name: name.to_string(),
                })
                .collect(),
        )
    }
}

/// A structured message: who sent it, where it routes, what to do with it.
///
/// On the wire it travels as `{"xrtml":{"s":..,"t":..,"a":..,"d":..}}`; see
/// [`codec`](super::codec).
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub sender_id: Option<String>,
    pub trigger: Option<TriggerSpec>,
    pub action: Option<String>,
    pub data: Value,
}

impl Envelope {
    /// Creates an envelope routed to the given trigger(s), with no payload.
    pub fn new(trigger: impl Into<TriggerSpec>) -> Self {
        Self {
            sender_id: None,
            trigger: Some(trigger.into()),
            action: None,
            data: Value::Null,
        }
    }

    pub fn with_sender(mut self, sender_id: impl Into<String>) -> Self {
        self.sender_id = Some(sender_id.into());
        self
    }

    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }

    /// Trigger names in dispatch order; empty when the envelope has none.
    pub fn trigger_names(&self) -> Vec<&str> {
        self.trigger.as_ref().map(TriggerSpec::names).unwrap_or_default()
    }

    /// True when the action is the activation bypass.
    pub fn is_activation(&self) -> bool {
        self.action.as_deref() == Some(ACTIVATE_ACTION)
    }

    /// Serializes to the wire form.
    pub fn stringify(&self) -> Result<String, MessageError> {
        codec::encode(self)
    }
}

//! Message consumers.
//!
//! A consumer is anything that wants envelopes routed to it by trigger name.
//! Shared lifecycle state lives in a [`TagRuntime`]; the consumer itself only
//! implements [`MessageHandler`] and hands out its runtime.
//!
//! # Example
//!
//! ```ignore
//! struct Ticker {
//!     runtime: TagRuntime,
//! }
//!
//! impl MessageHandler for Ticker {
//!     fn runtime(&self) -> &TagRuntime {
//!         &self.runtime
//!     }
//!
//!     fn process(&self, message: &Envelope) {
//!         println!("tick: {}", message.data);
//!     }
//! }
//!
//! let ticker = Ticker {
//!     runtime: TagRuntime::new()
//!         .with_trigger(TriggerBinding::new("ticker"))
//!         .with_action("reset", |_, _| println!("reset")),
//! };
//! ```

use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

use crate::domain::foundation::{ConsumerId, EventEmitter, ListenerId};
use crate::domain::message::{Envelope, ACTIVATE_ACTION, DEACTIVATE_ACTION};

/// Renames one field of an object payload before dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMapping {
    pub source: String,
    pub target: String,
}

impl FieldMapping {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }
}

/// A trigger a consumer listens on, with its payload mappings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerBinding {
    pub name: String,
    pub mappings: Vec<FieldMapping>,
}

impl TriggerBinding {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mappings: Vec::new(),
        }
    }

    pub fn with_mapping(mut self, source: impl Into<String>, target: impl Into<String>) -> Self {
        self.mappings.push(FieldMapping::new(source, target));
        self
    }
}

/// Applies mappings to a copy of the envelope. Non-object payloads are left
/// untouched, as are fields that are absent.
pub fn apply_mappings(envelope: &Envelope, mappings: &[FieldMapping]) -> Envelope {
    let mut mapped = envelope.clone();
    if let Value::Object(fields) = &mut mapped.data {
        for mapping in mappings {
            if let Some(value) = fields.remove(&mapping.source) {
                fields.insert(mapping.target.clone(), value);
            }
        }
    }
    mapped
}

/// Lifecycle notifications of a consumer.
#[derive(Debug, Clone, PartialEq)]
pub enum TagEvent {
    PreProcess { message: Envelope },
    PostProcess { message: Envelope },
    Activated,
    Deactivated,
    Disposed,
}

/// How an action was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handled {
    /// A handler registered by the consumer ran.
    Registered,
    /// The built-in `activate`/`deactivate` ran.
    Builtin,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("action '{action}' is not defined")]
pub struct ActionNotFound {
    pub action: String,
}

pub type ActionHandler = Arc<dyn Fn(&TagRuntime, &Envelope) + Send + Sync>;

/// Lifecycle state shared by every consumer.
pub struct TagRuntime {
    id: ConsumerId,
    active: AtomicBool,
    disposed: AtomicBool,
    receive_own_messages: bool,
    triggers: Vec<TriggerBinding>,
    actions: RwLock<HashMap<String, ActionHandler>>,
    events: EventEmitter<TagEvent>,
}

impl TagRuntime {
    /// Active consumer with a generated id and no triggers.
    pub fn new() -> Self {
        Self::with_id(ConsumerId::new())
    }

    pub fn with_id(id: impl Into<ConsumerId>) -> Self {
        Self {
            id: id.into(),
            active: AtomicBool::new(true),
            disposed: AtomicBool::new(false),
            receive_own_messages: false,
            triggers: Vec::new(),
            actions: RwLock::new(HashMap::new()),
            events: EventEmitter::new(),
        }
    }

    pub fn with_trigger(mut self, binding: TriggerBinding) -> Self {
        self.triggers.push(binding);
        self
    }

    pub fn with_receive_own_messages(mut self, receive: bool) -> Self {
        self.receive_own_messages = receive;
        self
    }

    pub fn inactive(self) -> Self {
        self.active.store(false, Ordering::SeqCst);
        self
    }

    pub fn with_action<F>(self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&TagRuntime, &Envelope) + Send + Sync + 'static,
    {
        self.define_action(name, handler);
        self
    }

    /// Adds or replaces an action handler.
    pub fn define_action<F>(&self, name: impl Into<String>, handler: F)
    where
        F: Fn(&TagRuntime, &Envelope) + Send + Sync + 'static,
    {
        self.actions.write().insert(name.into(), Arc::new(handler));
    }

    pub fn id(&self) -> &ConsumerId {
        &self.id
    }

    pub fn triggers(&self) -> &[TriggerBinding] {
        &self.triggers
    }

    pub fn receives_own_messages(&self) -> bool {
        self.receive_own_messages
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    pub fn activate(&self) {
        if !self.active.swap(true, Ordering::SeqCst) {
            self.events.emit(&TagEvent::Activated);
        }
    }

    pub fn deactivate(&self) {
        if self.active.swap(false, Ordering::SeqCst) {
            self.events.emit(&TagEvent::Deactivated);
        }
    }

    /// Runs the named action.
    ///
    /// Registered handlers win; otherwise `activate` and `deactivate` fall
    /// back to the built-ins.
    pub fn handle(&self, action: &str, message: &Envelope) -> Result<Handled, ActionNotFound> {
        let handler = self.actions.read().get(action).cloned();
        if let Some(handler) = handler {
            handler(self, message);
            return Ok(Handled::Registered);
        }

        match action {
            ACTIVATE_ACTION => {
                self.activate();
                Ok(Handled::Builtin)
            }
            DEACTIVATE_ACTION => {
                self.deactivate();
                Ok(Handled::Builtin)
            }
            _ => Err(ActionNotFound {
                action: action.to_string(),
            }),
        }
    }

    pub fn on<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&TagEvent) + Send + Sync + 'static,
    {
        self.events.on(listener)
    }

    pub fn events(&self) -> &EventEmitter<TagEvent> {
        &self.events
    }

    pub(crate) fn emit(&self, event: &TagEvent) {
        self.events.emit(event);
    }

    /// Deactivates the consumer for good and notifies observers (the broker
    /// drops its registrations on this).
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.active.store(false, Ordering::SeqCst);
        self.events.emit(&TagEvent::Disposed);
        self.events.clear();
    }
}

impl Default for TagRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TagRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TagRuntime")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .field("receive_own_messages", &self.receive_own_messages)
            .field("triggers", &self.triggers)
            .finish()
    }
}

/// Capability the broker dispatches to.
pub trait MessageHandler: Send + Sync {
    fn runtime(&self) -> &TagRuntime;

    /// Entry point for envelopes that carry no action.
    fn process(&self, message: &Envelope);
}

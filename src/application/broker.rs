//! MessageBroker - trigger-keyed fan-out to consumers.
//!
//! Dispatch rules for each consumer registered under a trigger, in
//! registration order:
//!
//! 1. An inactive consumer only receives `activate` messages; anything else
//!    raises `TAG_INACTIVE` and skips it.
//! 2. Unless it opted in, a consumer never receives a message whose sender
//!    id is its own id.
//! 3. The payload is remapped with the binding's field mappings.
//! 4. `PreProcess` fires, then the named action (or `process` when the
//!    message has none), then `PostProcess`, whatever the outcome.

use parking_lot::RwLock;
use std::sync::Arc;
use tracing::debug;

use super::consumer::{apply_mappings, MessageHandler, TagEvent};
use super::trigger_registry::{Registration, TriggerRegistry};
use crate::domain::foundation::{ConsumerId, ErrorCode, XrtmlError};
use crate::domain::message::Envelope;
use crate::ports::ErrorSink;

/// Cheap to clone; clones share the registry.
#[derive(Clone)]
pub struct MessageBroker {
    inner: Arc<BrokerInner>,
}

struct BrokerInner {
    registry: RwLock<TriggerRegistry>,
    errors: Arc<dyn ErrorSink>,
}

impl MessageBroker {
    pub fn new(errors: Arc<dyn ErrorSink>) -> Self {
        Self {
            inner: Arc::new(BrokerInner {
                registry: RwLock::new(TriggerRegistry::new()),
                errors,
            }),
        }
    }

    /// Registers a consumer under every trigger it declares.
    ///
    /// The consumer is unregistered automatically when its runtime is
    /// disposed.
    pub fn register(&self, handler: Arc<dyn MessageHandler>) -> Result<(), XrtmlError> {
        let runtime = handler.runtime();
        let consumer_id = runtime.id().clone();

        if runtime.is_disposed() {
            return self.inner.errors.raise(
                XrtmlError::new(ErrorCode::TagNotCreated, "Consumer has been disposed")
                    .with_target(consumer_id.to_string()),
            );
        }
        if runtime.triggers().is_empty() {
            return self.inner.errors.raise(
                XrtmlError::new(ErrorCode::TagUnregistered, "Consumer declares no triggers")
                    .with_target(consumer_id.to_string()),
            );
        }

        let already_known = {
            let mut registry = self.inner.registry.write();
            let known = registry.is_registered(&consumer_id);
            for binding in runtime.triggers() {
                registry.register(
                    binding.name.clone(),
                    Registration {
                        consumer_id: consumer_id.clone(),
                        handler: handler.clone(),
                        mappings: binding.mappings.clone(),
                    },
                );
            }
            known
        };

        if !already_known {
            let weak = Arc::downgrade(&self.inner);
            let id = consumer_id.clone();
            runtime.events().once_when(
                |event| matches!(event, TagEvent::Disposed),
                move |_| {
                    if let Some(inner) = weak.upgrade() {
                        inner.registry.write().unregister_all(&id);
                    }
                },
            );
        }

        debug!(consumer_id = %consumer_id, triggers = runtime.triggers().len(), "consumer registered");
        Ok(())
    }

    /// Removes a consumer from every trigger.
    pub fn unregister(&self, consumer_id: &ConsumerId) -> usize {
        self.inner.registry.write().unregister_all(consumer_id)
    }

    /// Removes a consumer from one trigger. Unknown pairs are a no-op.
    pub fn unregister_trigger(&self, trigger: &str, consumer_id: &ConsumerId) -> bool {
        self.inner.registry.write().unregister(trigger, consumer_id)
    }

    pub fn consumers(&self, trigger: &str) -> Vec<ConsumerId> {
        self.inner.registry.read().consumers(trigger)
    }

    pub fn has_trigger(&self, trigger: &str) -> bool {
        self.inner.registry.read().contains(trigger)
    }

    /// Dispatches a message once per trigger it names, in order.
    ///
    /// Returns the number of consumer dispatches performed.
    pub fn trigger_tags(&self, message: &Envelope) -> Result<usize, XrtmlError> {
        let triggers = message.trigger_names();
        if triggers.is_empty() {
            self.inner.errors.raise(XrtmlError::new(
                ErrorCode::InvalidMessage,
                "Message carries no trigger",
            ))?;
            return Ok(0);
        }

        let mut dispatched = 0;
        for trigger in triggers {
            dispatched += self.trigger_call(trigger, message)?;
        }
        Ok(dispatched)
    }

    /// Dispatches a message to every consumer registered under `trigger`.
    ///
    /// A trigger nobody listens on is not an error.
    pub fn trigger_call(&self, trigger: &str, message: &Envelope) -> Result<usize, XrtmlError> {
        let registrations = self.inner.registry.read().registrations(trigger);
        if registrations.is_empty() {
            debug!(trigger, code = %ErrorCode::TriggerUnregistered, "no consumer for trigger");
            return Ok(0);
        }

        let mut dispatched = 0;
        for registration in registrations {
            if self.dispatch(trigger, &registration, message)? {
                dispatched += 1;
            }
        }
        Ok(dispatched)
    }

    fn dispatch(
        &self,
        trigger: &str,
        registration: &Registration,
        message: &Envelope,
    ) -> Result<bool, XrtmlError> {
        let handler = &registration.handler;
        let runtime = handler.runtime();
        let consumer_id = runtime.id();

        if !runtime.is_active() && !message.is_activation() {
            self.inner.errors.raise(
                XrtmlError::new(ErrorCode::TagInactive, "Consumer is inactive")
                    .with_target(consumer_id.to_string())
                    .with_info("trigger", trigger),
            )?;
            return Ok(false);
        }

        if !runtime.receives_own_messages()
            && message.sender_id.as_deref() == Some(consumer_id.as_str())
        {
            debug!(trigger, consumer_id = %consumer_id, "own message suppressed");
            return Ok(false);
        }

        let mapped = apply_mappings(message, &registration.mappings);
        runtime.emit(&TagEvent::PreProcess {
            message: mapped.clone(),
        });
        let outcome = match mapped.action.as_deref() {
            Some(action) => runtime.handle(action, &mapped).map(|_| ()),
            None => {
                handler.process(&mapped);
                Ok(())
            }
        };
        runtime.emit(&TagEvent::PostProcess {
            message: mapped.clone(),
        });

        if let Err(missing) = outcome {
            self.inner.errors.raise(
                XrtmlError::new(ErrorCode::TagActionUndefined, missing.to_string())
                    .with_target(consumer_id.to_string())
                    .with_info("action", missing.action),
            )?;
        }
        Ok(true)
    }
}

impl std::fmt::Debug for MessageBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageBroker")
            .field("triggers", &self.inner.registry.read().trigger_count())
            .finish()
    }
}

//! Trigger registry - which consumers listen on which trigger.
//!
//! Registrations under a trigger keep insertion order, which is the order
//! the broker dispatches in. A trigger whose last registration goes away is
//! removed entirely.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::consumer::{FieldMapping, MessageHandler};
use crate::domain::foundation::ConsumerId;

/// One consumer's interest in one trigger.
#[derive(Clone)]
pub struct Registration {
    pub consumer_id: ConsumerId,
    pub handler: Arc<dyn MessageHandler>,
    pub mappings: Vec<FieldMapping>,
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("consumer_id", &self.consumer_id)
            .field("mappings", &self.mappings)
            .finish()
    }
}

#[derive(Debug, Default)]
pub struct TriggerRegistry {
    triggers: HashMap<String, Vec<Registration>>,
}

impl TriggerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a registration, replacing the consumer's previous one for the
    /// same trigger in place.
    pub fn register(&mut self, trigger: impl Into<String>, registration: Registration) {
        let entries = self.triggers.entry(trigger.into()).or_default();
        match entries
            .iter_mut()
            .find(|entry| entry.consumer_id == registration.consumer_id)
        {
            Some(existing) => *existing = registration,
            None => entries.push(registration),
        }
    }

    /// Removes one consumer from one trigger. Unknown pairs are a no-op.
    pub fn unregister(&mut self, trigger: &str, consumer_id: &ConsumerId) -> bool {
        let Some(entries) = self.triggers.get_mut(trigger) else {
            return false;
        };
        let before = entries.len();
        entries.retain(|entry| &entry.consumer_id != consumer_id);
        let removed = entries.len() != before;
        if entries.is_empty() {
            self.triggers.remove(trigger);
        }
        removed
    }

    /// Removes a consumer from every trigger; returns how many entries went.
    pub fn unregister_all(&mut self, consumer_id: &ConsumerId) -> usize {
        let triggers: Vec<String> = self.triggers.keys().cloned().collect();
        triggers
            .iter()
            .filter(|trigger| self.unregister(trigger, consumer_id))
            .count()
    }

    /// Registrations for a trigger, in dispatch order.
    pub fn registrations(&self, trigger: &str) -> Vec<Registration> {
        self.triggers.get(trigger).cloned().unwrap_or_default()
    }

    pub fn contains(&self, trigger: &str) -> bool {
        self.triggers.contains_key(trigger)
    }

    pub fn is_registered(&self, consumer_id: &ConsumerId) -> bool {
        self.triggers
            .values()
            .flatten()
            .any(|entry| &entry.consumer_id == consumer_id)
    }

    pub fn consumers(&self, trigger: &str) -> Vec<ConsumerId> {
        self.triggers
            .get(trigger)
            .map(|entries| entries.iter().map(|entry| entry.consumer_id.clone()).collect())
            .unwrap_or_default()
    }

    pub fn trigger_count(&self) -> usize {
        self.triggers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::consumer::TagRuntime;
    use crate::domain::message::Envelope;

    struct Noop {
        runtime: TagRuntime,
    }

    impl MessageHandler for Noop {
        fn runtime(&self) -> &TagRuntime {
            &self.runtime
        }

        fn process(&self, _message: &Envelope) {}
    }

    fn registration(id: &str) -> Registration {
        Registration {
            consumer_id: ConsumerId::from(id),
            handler: Arc::new(Noop {
                runtime: TagRuntime::with_id(id),
            }),
            mappings: Vec::new(),
        }
    }

    #[test]
    fn registrations_keep_insertion_order() {
        let mut registry = TriggerRegistry::new();
        registry.register("T", registration("c2"));
        registry.register("T", registration("c1"));

        assert_eq!(
            registry.consumers("T"),
            vec![ConsumerId::from("c2"), ConsumerId::from("c1")]
        );
    }

    #[test]
    fn reregistering_replaces_in_place() {
        let mut registry = TriggerRegistry::new();
        registry.register("T", registration("c1"));
        registry.register("T", registration("c2"));
        let mut again = registration("c1");
        again.mappings.push(FieldMapping::new("a", "b"));
        registry.register("T", again);

        let entries = registry.registrations("T");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].consumer_id, ConsumerId::from("c1"));
        assert_eq!(entries[0].mappings.len(), 1);
    }

    #[test]
    fn last_unregister_removes_trigger() {
        let mut registry = TriggerRegistry::new();
        registry.register("T", registration("c1"));

        assert!(registry.unregister("T", &ConsumerId::from("c1")));
        assert!(!registry.contains("T"));
        assert_eq!(registry.trigger_count(), 0);
    }

    #[test]
    fn unregister_unknown_is_noop() {
        let mut registry = TriggerRegistry::new();
        registry.register("T", registration("c1"));

        assert!(!registry.unregister("T", &ConsumerId::from("ghost")));
        assert!(!registry.unregister("U", &ConsumerId::from("c1")));
        assert_eq!(registry.consumers("T"), vec![ConsumerId::from("c1")]);
    }

    #[test]
    fn unregister_all_sweeps_every_trigger() {
        let mut registry = TriggerRegistry::new();
        registry.register("T", registration("c1"));
        registry.register("U", registration("c1"));
        registry.register("U", registration("c2"));

        assert_eq!(registry.unregister_all(&ConsumerId::from("c1")), 2);
        assert!(!registry.contains("T"));
        assert_eq!(registry.consumers("U"), vec![ConsumerId::from("c2")]);
        assert!(!registry.is_registered(&ConsumerId::from("c1")));
    }
}

//! Synchronous event emitter.
//!
//! Every observable object in the crate (connections, the connection
//! manager, consumers, the error reporter) exposes its notifications through
//! an `EventEmitter`. Delivery is synchronous and in registration order,
//! which keeps dispatch deterministic for tests and matches the single
//! event-loop model the routing protocol is defined against.
//!
//! # Reentrancy
//!
//! Listeners are cloned out of the registry before they are invoked, so a
//! listener may register or remove listeners (including itself) on the
//! emitter that is calling it.

use parking_lot::RwLock;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Handle returned on registration, used to remove a listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener<E> = Arc<dyn Fn(&E) + Send + Sync>;
type Filter<E> = Arc<dyn Fn(&E) -> bool + Send + Sync>;

struct Entry<E> {
    id: ListenerId,
    listener: Listener<E>,
    filter: Option<Filter<E>>,
    once: bool,
}

impl<E> Entry<E> {
    fn accepts(&self, event: &E) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }
}

/// Registry of listeners for one event type.
pub struct EventEmitter<E> {
    next_id: AtomicU64,
    entries: RwLock<Vec<Entry<E>>>,
}

impl<E> EventEmitter<E> {
    /// Creates an emitter with no listeners.
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            entries: RwLock::new(Vec::new()),
        }
    }

    /// Registers a listener for every event.
    pub fn on<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        self.insert(Arc::new(listener), None, false)
    }

    /// Registers a listener that fires on the first event accepted by
    /// `filter` and is then removed.
    pub fn once_when<P, F>(&self, filter: P, listener: F) -> ListenerId
    where
        P: Fn(&E) -> bool + Send + Sync + 'static,
        F: Fn(&E) + Send + Sync + 'static,
    {
        self.insert(Arc::new(listener), Some(Arc::new(filter)), true)
    }

    /// Removes a listener. Returns false if it was not registered.
    pub fn off(&self, id: ListenerId) -> bool {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|entry| entry.id != id);
        entries.len() != before
    }

    /// Delivers an event to every accepting listener, in registration order.
    ///
    /// Returns the number of listeners invoked.
    pub fn emit(&self, event: &E) -> usize {
        // Collect under the lock, invoke after releasing it
        let targets: Vec<Listener<E>> = {
            let mut entries = self.entries.write();
            let mut targets = Vec::new();
            entries.retain(|entry| {
                if !entry.accepts(event) {
                    return true;
                }
                targets.push(Arc::clone(&entry.listener));
                !entry.once
            });
            targets
        };

        for listener in &targets {
            listener(event);
        }
        targets.len()
    }

    /// Removes every listener.
    pub fn clear(&self) {
        self.entries.write().clear();
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.entries.read().len()
    }

    fn insert(&self, listener: Listener<E>, filter: Option<Filter<E>>, once: bool) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.entries.write().push(Entry {
            id,
            listener,
            filter,
            once,
        });
        id
    }
}

impl<E> Default for EventEmitter<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for EventEmitter<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventEmitter")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

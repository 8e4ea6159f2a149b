//! In-memory pub/sub backend.
//!
//! A loopback hub standing in for the real-time messaging service. Every
//! transport created by an [`InMemoryTransportFactory`] is a client of one
//! shared [`InMemoryHub`]. Published messages go to every connected client
//! subscribed to the channel, the publisher included, which is what the
//! send-only sentinel exists to deal with.
//!
//! The hub can be taken offline (connects stay pending until it comes back)
//! and can interrupt live sessions to exercise reconnect handling.
//!
//! # Example
//!
//! ```ignore
//! let hub = InMemoryHub::new();
//! let factory = InMemoryTransportFactory::new(hub.clone());
//!
//! hub.set_online(false);
//! let connection = manager.create(&config);   // connect stays pending
//! hub.set_online(true);                       // now `Connected` is signalled
//!
//! hub.interrupt();                            // `Reconnecting` to everyone
//! hub.restore();                              // `Reconnected`
//! ```

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tracing::debug;

use crate::ports::{
    ConnectRequest, Transport, TransportError, TransportFactory, TransportListener,
    TransportSignal,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ClientStatus {
    Idle,
    Pending,
    Connected,
    Interrupted,
}

struct Client {
    listener: Weak<dyn TransportListener>,
    status: ClientStatus,
    /// Channel name to subscribe-on-reconnect flag.
    subscriptions: HashMap<String, bool>,
}

struct HubState {
    online: bool,
    next_client: u64,
    clients: HashMap<u64, Client>,
}

type Delivery = (Weak<dyn TransportListener>, TransportSignal);

/// Shared loopback backend.
pub struct InMemoryHub {
    state: Mutex<HubState>,
}

impl InMemoryHub {
    /// Creates an online hub with no clients.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(HubState {
                online: true,
                next_client: 1,
                clients: HashMap::new(),
            }),
        })
    }

    pub fn is_online(&self) -> bool {
        self.state.lock().online
    }

    /// Going online completes every pending connect.
    pub fn set_online(&self, online: bool) {
        let deliveries = {
            let mut state = self.state.lock();
            state.online = online;
            if !online {
                return;
            }
            state
                .clients
                .values_mut()
                .filter(|client| client.status == ClientStatus::Pending)
                .map(|client| {
                    client.status = ClientStatus::Connected;
                    (client.listener.clone(), TransportSignal::Connected)
                })
                .collect::<Vec<_>>()
        };
        deliver(deliveries);
    }

    /// Drops every live session; each affected client is told it is
    /// reconnecting. Calling again counts as another failed attempt.
    pub fn interrupt(&self) {
        let deliveries = {
            let mut state = self.state.lock();
            state
                .clients
                .values_mut()
                .filter(|client| {
                    matches!(
                        client.status,
                        ClientStatus::Connected | ClientStatus::Interrupted
                    )
                })
                .map(|client| {
                    client.status = ClientStatus::Interrupted;
                    (client.listener.clone(), TransportSignal::Reconnecting)
                })
                .collect::<Vec<_>>()
        };
        deliver(deliveries);
    }

    /// Brings interrupted sessions back. Only subscriptions flagged
    /// subscribe-on-reconnect survive.
    pub fn restore(&self) {
        let deliveries = {
            let mut state = self.state.lock();
            let mut deliveries = Vec::new();
            for client in state
                .clients
                .values_mut()
                .filter(|client| client.status == ClientStatus::Interrupted)
            {
                client.status = ClientStatus::Connected;
                client.subscriptions.retain(|_, on_reconnect| *on_reconnect);
                deliveries.push((client.listener.clone(), TransportSignal::Reconnected));
                for channel in client.subscriptions.keys() {
                    deliveries.push((
                        client.listener.clone(),
                        TransportSignal::Subscribed {
                            channel: channel.clone(),
                        },
                    ));
                }
            }
            deliveries
        };
        deliver(deliveries);
    }

    /// Number of live clients.
    pub fn client_count(&self) -> usize {
        self.state.lock().clients.len()
    }

    /// Number of connected clients subscribed to `channel`.
    pub fn subscriber_count(&self, channel: &str) -> usize {
        self.state
            .lock()
            .clients
            .values()
            .filter(|client| {
                client.status == ClientStatus::Connected
                    && client.subscriptions.contains_key(channel)
            })
            .count()
    }

    fn add_client(&self, listener: Weak<dyn TransportListener>) -> u64 {
        let mut state = self.state.lock();
        let id = state.next_client;
        state.next_client += 1;
        state.clients.insert(
            id,
            Client {
                listener,
                status: ClientStatus::Idle,
                subscriptions: HashMap::new(),
            },
        );
        id
    }

    fn remove_client(&self, id: u64) {
        self.state.lock().clients.remove(&id);
    }

    /// Runs `op` on a connected client and delivers what it returns.
    fn with_connected<F>(&self, id: u64, op: F) -> Result<(), TransportError>
    where
        F: FnOnce(&mut HubState, u64) -> Vec<Delivery>,
    {
        let deliveries = {
            let mut state = self.state.lock();
            match state.clients.get(&id) {
                Some(client) if client.status == ClientStatus::Connected => {}
                _ => return Err(TransportError::NotConnected),
            }
            op(&mut *state, id)
        };
        deliver(deliveries);
        Ok(())
    }
}

fn deliver(deliveries: Vec<Delivery>) {
    for (listener, signal) in deliveries {
        if let Some(listener) = listener.upgrade() {
            listener.on_signal(signal);
        }
    }
}

/// One client session on the hub.
pub struct InMemoryTransport {
    hub: Arc<InMemoryHub>,
    client: u64,
}

impl Transport for InMemoryTransport {
    fn connect(&self, request: &ConnectRequest) -> Result<(), TransportError> {
        if request.url.is_empty() {
            return Err(TransportError::Rejected("empty url".to_string()));
        }

        let deliveries = {
            let mut state = self.hub.state.lock();
            let online = state.online;
            let Some(client) = state.clients.get_mut(&self.client) else {
                return Err(TransportError::Unavailable("client closed".to_string()));
            };
            if online {
                client.status = ClientStatus::Connected;
                vec![(client.listener.clone(), TransportSignal::Connected)]
            } else {
                debug!(client = self.client, "hub offline, connect pending");
                client.status = ClientStatus::Pending;
                Vec::new()
            }
        };
        deliver(deliveries);
        Ok(())
    }

    fn disconnect(&self) -> Result<(), TransportError> {
        let deliveries = {
            let mut state = self.hub.state.lock();
            let Some(client) = state.clients.get_mut(&self.client) else {
                return Err(TransportError::Unavailable("client closed".to_string()));
            };
            client.status = ClientStatus::Idle;
            client.subscriptions.clear();
            vec![(client.listener.clone(), TransportSignal::Disconnected)]
        };
        deliver(deliveries);
        Ok(())
    }

    fn subscribe(&self, channel: &str, subscribe_on_reconnect: bool) -> Result<(), TransportError> {
        self.hub.with_connected(self.client, |state, id| {
            let Some(client) = state.clients.get_mut(&id) else {
                return Vec::new();
            };
            client
                .subscriptions
                .insert(channel.to_string(), subscribe_on_reconnect);
            vec![(
                client.listener.clone(),
                TransportSignal::Subscribed {
                    channel: channel.to_string(),
                },
            )]
        })
    }

    fn unsubscribe(&self, channel: &str) -> Result<(), TransportError> {
        self.hub.with_connected(self.client, |state, id| {
            let Some(client) = state.clients.get_mut(&id) else {
                return Vec::new();
            };
            client.subscriptions.remove(channel);
            vec![(
                client.listener.clone(),
                TransportSignal::Unsubscribed {
                    channel: channel.to_string(),
                },
            )]
        })
    }

    fn send(&self, channel: &str, message: &str) -> Result<(), TransportError> {
        self.hub.with_connected(self.client, |state, _| {
            let mut recipients: Vec<(u64, Weak<dyn TransportListener>)> = state
                .clients
                .iter()
                .filter(|(_, client)| {
                    client.status == ClientStatus::Connected
                        && client.subscriptions.contains_key(channel)
                })
                .map(|(id, client)| (*id, client.listener.clone()))
                .collect();
            recipients.sort_by_key(|(id, _)| *id);

            recipients
                .into_iter()
                .map(|(_, listener)| {
                    (
                        listener,
                        TransportSignal::Message {
                            channel: channel.to_string(),
                            message: message.to_string(),
                        },
                    )
                })
                .collect()
        })
    }

    fn is_connected(&self) -> bool {
        self.hub
            .state
            .lock()
            .clients
            .get(&self.client)
            .map_or(false, |client| client.status == ClientStatus::Connected)
    }
}

impl Drop for InMemoryTransport {
    fn drop(&mut self) {
        self.hub.remove_client(self.client);
    }
}

/// Creates hub clients.
#[derive(Clone)]
pub struct InMemoryTransportFactory {
    hub: Arc<InMemoryHub>,
}

impl InMemoryTransportFactory {
    pub fn new(hub: Arc<InMemoryHub>) -> Self {
        Self { hub }
    }

    pub fn hub(&self) -> &Arc<InMemoryHub> {
        &self.hub
    }
}

impl TransportFactory for InMemoryTransportFactory {
    fn create(
        &self,
        listener: Weak<dyn TransportListener>,
    ) -> Result<Arc<dyn Transport>, TransportError> {
        let client = self.hub.add_client(listener);
        Ok(Arc::new(InMemoryTransport {
            hub: self.hub.clone(),
            client,
        }))
    }
}

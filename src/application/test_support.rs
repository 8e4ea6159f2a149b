//! Test doubles shared by the application-layer unit tests.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use crate::domain::foundation::{ErrorCode, XrtmlError};
use crate::ports::{
    ConnectRequest, ErrorSink, Transport, TransportError, TransportFactory, TransportListener,
    TransportSignal,
};

/// Transport that records requests and lets the test drive signals.
#[derive(Default)]
pub struct FakeTransport {
    listener: Mutex<Option<Weak<dyn TransportListener>>>,
    connected: AtomicBool,
    /// Confirm `connect` from inside the call.
    confirm_connect: bool,
    pub sent: Mutex<Vec<(String, String)>>,
    pub subscribed: Mutex<Vec<String>>,
    pub connect_requests: Mutex<Vec<ConnectRequest>>,
    pub disconnects: Mutex<usize>,
}

impl FakeTransport {
    /// Confirms connects immediately.
    pub fn online() -> Arc<Self> {
        Arc::new(Self {
            confirm_connect: true,
            ..Default::default()
        })
    }

    /// Leaves connects pending until [`FakeTransport::confirm`] is called.
    pub fn pending() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn confirm(&self) {
        self.connected.store(true, Ordering::SeqCst);
        self.signal(TransportSignal::Connected);
    }

    pub fn signal(&self, signal: TransportSignal) {
        let listener = self.listener.lock().clone().and_then(|weak| weak.upgrade());
        if let Some(listener) = listener {
            listener.on_signal(signal);
        }
    }

    pub fn sent_contents(&self) -> Vec<String> {
        self.sent.lock().iter().map(|(_, content)| content.clone()).collect()
    }
}

impl Transport for FakeTransport {
    fn connect(&self, request: &ConnectRequest) -> Result<(), TransportError> {
        self.connect_requests.lock().push(request.clone());
        if self.confirm_connect {
            self.confirm();
        }
        Ok(())
    }

    fn disconnect(&self) -> Result<(), TransportError> {
        *self.disconnects.lock() += 1;
        self.connected.store(false, Ordering::SeqCst);
        self.signal(TransportSignal::Disconnected);
        Ok(())
    }

    fn subscribe(&self, channel: &str, _subscribe_on_reconnect: bool) -> Result<(), TransportError> {
        self.subscribed.lock().push(channel.to_string());
        self.signal(TransportSignal::Subscribed {
            channel: channel.to_string(),
        });
        Ok(())
    }

    fn unsubscribe(&self, channel: &str) -> Result<(), TransportError> {
        self.signal(TransportSignal::Unsubscribed {
            channel: channel.to_string(),
        });
        Ok(())
    }

    fn send(&self, channel: &str, message: &str) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }
        self.sent.lock().push((channel.to_string(), message.to_string()));
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

/// Hands out one pre-built transport.
pub struct FakeFactory {
    pub transport: Arc<FakeTransport>,
}

impl FakeFactory {
    pub fn new(transport: Arc<FakeTransport>) -> Self {
        Self { transport }
    }
}

impl TransportFactory for FakeFactory {
    fn create(
        &self,
        listener: Weak<dyn TransportListener>,
    ) -> Result<Arc<dyn Transport>, TransportError> {
        *self.transport.listener.lock() = Some(listener);
        Ok(self.transport.clone())
    }
}

/// Factory that never produces a client.
pub struct MissingFactory;

impl TransportFactory for MissingFactory {
    fn create(
        &self,
        _listener: Weak<dyn TransportListener>,
    ) -> Result<Arc<dyn Transport>, TransportError> {
        Err(TransportError::Unavailable("no client library".to_string()))
    }
}

/// Sink that keeps every reported error.
#[derive(Default)]
pub struct RecordingSink {
    pub errors: Mutex<Vec<XrtmlError>>,
    pub throws: bool,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn throwing() -> Arc<Self> {
        Arc::new(Self {
            throws: true,
            ..Default::default()
        })
    }

    pub fn codes(&self) -> Vec<ErrorCode> {
        self.errors.lock().iter().map(|error| error.code).collect()
    }
}

impl ErrorSink for RecordingSink {
    fn report(&self, error: &XrtmlError) {
        self.errors.lock().push(error.clone());
    }

    fn throws(&self) -> bool {
        self.throws
    }
}

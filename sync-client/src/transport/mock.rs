//! Mock transport for testing.
//!
//! Captures every call made against it and lets tests inject the events a
//! real connectivity framework would report.

use super::{
    DiscoveryEvent, EncryptionPreference, ResourceEvent, SendMode, SessionDelegate, Transport,
    TransportError,
};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use todo_sync_core::ConnectionState;
use todo_sync_types::{PeerId, PeerIdentity, ServiceType};

/// A message handed to [`Transport::send`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    /// Payload bytes.
    pub data: Vec<u8>,
    /// Addressed peers.
    pub peers: Vec<PeerId>,
    /// Requested delivery semantics.
    pub mode: SendMode,
}

/// Mock transport for testing.
///
/// Clones share state, so a test can keep a handle after giving one to the
/// session.
#[derive(Default, Clone)]
pub struct MockTransport {
    inner: Arc<Mutex<MockTransportInner>>,
}

#[derive(Default)]
struct MockTransportInner {
    local: Option<PeerIdentity>,
    encryption: Option<EncryptionPreference>,
    delegate: Option<Arc<dyn SessionDelegate>>,
    advertising: Option<ServiceType>,
    advertise_calls: usize,
    discovery: Option<mpsc::UnboundedSender<DiscoveryEvent>>,
    browsing: Option<ServiceType>,
    connect_requests: Vec<PeerIdentity>,
    sent_messages: Vec<SentMessage>,
    disconnected: bool,
    fail_next_open: Option<String>,
    fail_next_advertise: Option<String>,
    fail_next_connect: Option<String>,
    fail_next_send: Option<String>,
}

impl MockTransportInner {
    fn check_open(&self) -> Result<(), TransportError> {
        if self.local.is_none() {
            Err(TransportError::NotOpen)
        } else if self.disconnected {
            Err(TransportError::Closed)
        } else {
            Ok(())
        }
    }
}

impl std::fmt::Debug for MockTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock().unwrap();
        f.debug_struct("MockTransport")
            .field("local", &inner.local)
            .field("advertising", &inner.advertising)
            .field("browsing", &inner.browsing)
            .field("sent_messages", &inner.sent_messages.len())
            .finish_non_exhaustive()
    }
}

impl MockTransport {
    /// Create a new mock transport.
    pub fn new() -> Self {
        Self::default()
    }

    fn delegate(&self) -> Arc<dyn SessionDelegate> {
        let inner = self.inner.lock().unwrap();
        inner
            .delegate
            .clone()
            .expect("open_session must be called before injecting events")
    }

    /// Report a state change for `peer` to the session delegate.
    pub fn emit_state(&self, peer: &PeerIdentity, state: ConnectionState) {
        self.delegate().peer_state_changed(peer, state);
    }

    /// Report `Connecting` then `Connected` for `peer`.
    pub fn connect_peer(&self, peer: &PeerIdentity) {
        self.emit_state(peer, ConnectionState::Connecting);
        self.emit_state(peer, ConnectionState::Connected);
    }

    /// Deliver bytes from `peer` to the session delegate.
    pub fn emit_data(&self, from: &PeerIdentity, data: &[u8]) {
        self.delegate().data_received(data.to_vec(), from);
    }

    /// Report a resource event to the session delegate.
    pub fn emit_resource(&self, event: ResourceEvent) {
        self.delegate().resource_event(event);
    }

    /// Push a discovery event to the active browser, if any.
    pub fn discover(&self, event: DiscoveryEvent) {
        let inner = self.inner.lock().unwrap();
        if let Some(tx) = &inner.discovery {
            let _ = tx.send(event);
        }
    }

    /// Get all messages that were sent.
    pub fn sent_messages(&self) -> Vec<SentMessage> {
        self.inner.lock().unwrap().sent_messages.clone()
    }

    /// Get the last message that was sent.
    pub fn last_sent(&self) -> Option<SentMessage> {
        self.inner.lock().unwrap().sent_messages.last().cloned()
    }

    /// Peers passed to `connect()`, in call order.
    pub fn connect_requests(&self) -> Vec<PeerIdentity> {
        self.inner.lock().unwrap().connect_requests.clone()
    }

    /// Identity the session was opened with.
    pub fn local_identity(&self) -> Option<PeerIdentity> {
        self.inner.lock().unwrap().local.clone()
    }

    /// Encryption requested when the session was opened.
    pub fn encryption(&self) -> Option<EncryptionPreference> {
        self.inner.lock().unwrap().encryption
    }

    /// Service type currently advertised.
    pub fn advertising(&self) -> Option<ServiceType> {
        self.inner.lock().unwrap().advertising.clone()
    }

    /// Number of successful `start_advertising()` calls.
    pub fn advertise_calls(&self) -> usize {
        self.inner.lock().unwrap().advertise_calls
    }

    /// Service type currently browsed.
    pub fn browsing(&self) -> Option<ServiceType> {
        self.inner.lock().unwrap().browsing.clone()
    }

    /// Whether `disconnect()` was called.
    pub fn is_disconnected(&self) -> bool {
        self.inner.lock().unwrap().disconnected
    }

    /// Cause the next open_session() to fail with the given error.
    pub fn fail_next_open(&self, error: &str) {
        self.inner.lock().unwrap().fail_next_open = Some(error.to_string());
    }

    /// Cause the next start_advertising() to fail with the given error.
    pub fn fail_next_advertise(&self, error: &str) {
        self.inner.lock().unwrap().fail_next_advertise = Some(error.to_string());
    }

    /// Cause the next connect() to fail with the given error.
    pub fn fail_next_connect(&self, error: &str) {
        self.inner.lock().unwrap().fail_next_connect = Some(error.to_string());
    }

    /// Cause the next send() to fail with the given error.
    pub fn fail_next_send(&self, error: &str) {
        self.inner.lock().unwrap().fail_next_send = Some(error.to_string());
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn open_session(
        &self,
        local: &PeerIdentity,
        encryption: EncryptionPreference,
        delegate: Arc<dyn SessionDelegate>,
    ) -> Result<(), TransportError> {
        let mut inner = self.inner.lock().unwrap();

        // Check for forced failure
        if let Some(error) = inner.fail_next_open.take() {
            return Err(TransportError::Unavailable(error));
        }

        inner.local = Some(local.clone());
        inner.encryption = Some(encryption);
        inner.delegate = Some(delegate);
        inner.disconnected = false;
        Ok(())
    }

    async fn start_advertising(&self, service: &ServiceType) -> Result<(), TransportError> {
        let mut inner = self.inner.lock().unwrap();

        inner.check_open()?;
        if let Some(error) = inner.fail_next_advertise.take() {
            return Err(TransportError::Unavailable(error));
        }

        inner.advertising = Some(service.clone());
        inner.advertise_calls += 1;
        Ok(())
    }

    async fn stop_advertising(&self) -> Result<(), TransportError> {
        self.inner.lock().unwrap().advertising = None;
        Ok(())
    }

    async fn start_browsing(
        &self,
        service: &ServiceType,
    ) -> Result<mpsc::UnboundedReceiver<DiscoveryEvent>, TransportError> {
        let mut inner = self.inner.lock().unwrap();
        inner.check_open()?;

        let (tx, rx) = mpsc::unbounded_channel();
        inner.discovery = Some(tx);
        inner.browsing = Some(service.clone());
        Ok(rx)
    }

    fn stop_browsing(&self) -> Result<(), TransportError> {
        let mut inner = self.inner.lock().unwrap();
        inner.discovery = None;
        inner.browsing = None;
        Ok(())
    }

    async fn connect(&self, peer: &PeerIdentity) -> Result<(), TransportError> {
        let mut inner = self.inner.lock().unwrap();

        if let Some(error) = inner.fail_next_connect.take() {
            return Err(TransportError::ConnectFailed(error));
        }

        inner.connect_requests.push(peer.clone());
        Ok(())
    }

    async fn send(
        &self,
        data: &[u8],
        peers: &[PeerId],
        mode: SendMode,
    ) -> Result<(), TransportError> {
        let mut inner = self.inner.lock().unwrap();

        inner.check_open()?;

        // Check for forced failure
        if let Some(error) = inner.fail_next_send.take() {
            return Err(TransportError::SendFailed(error));
        }

        inner.sent_messages.push(SentMessage {
            data: data.to_vec(),
            peers: peers.to_vec(),
            mode,
        });
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        let mut inner = self.inner.lock().unwrap();
        inner.disconnected = true;
        inner.advertising = None;
        inner.discovery = None;
        inner.browsing = None;
        Ok(())
    }
}

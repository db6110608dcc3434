//! PeerSession - owner of the local identity and the session's peer set.
//!
//! # Architecture
//!
//! The transport reports events through [`SessionDelegate`], which
//! `PeerSession` implements on a shared inner value. State reports go
//! through the pure peer table (from sync-core); received bytes are pushed
//! onto the registered receive queue without blocking the caller. When that
//! bounded queue is full the payload is dropped and counted.
//!
//! ```text
//! Transport ──delegate──► PeerSession ──inbound queue──► TransferChannel
//!                              │
//!                              └──broadcast──► state observers
//! ```

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{broadcast, mpsc};
use todo_sync_core::{ConnectionState, PeerEvent, PeerTable, Transition};
use todo_sync_types::{PeerId, PeerIdentity, ServiceType};

use crate::config::ExchangeConfig;
use crate::error::ExchangeError;
use crate::transport::{EncryptionPreference, ResourceEvent, SessionDelegate, Transport};

/// Capacity of the state-change broadcast channel.
const STATE_CHANGE_CAPACITY: usize = 64;

/// A peer's state changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerStateChange {
    /// The remote peer.
    pub peer: PeerIdentity,
    /// State before the change.
    pub from: ConnectionState,
    /// State after the change.
    pub to: ConnectionState,
    /// Lifecycle event.
    pub event: PeerEvent,
}

/// Bytes received from a peer, not yet decoded.
#[derive(Clone)]
pub struct InboundPayload {
    /// Sending peer.
    pub from: PeerIdentity,
    /// Raw message bytes, exactly as delivered.
    pub data: Vec<u8>,
}

impl std::fmt::Debug for InboundPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InboundPayload")
            .field("from", &self.from)
            .field("data", &format!("[{} bytes]", self.data.len()))
            .finish()
    }
}

/// Where received bytes go.
struct InboundSink {
    tx: mpsc::Sender<InboundPayload>,
    overflowed: Arc<AtomicU64>,
}

/// The session event sink shared with the transport.
struct SessionShared {
    peers: Mutex<PeerTable>,
    receiver: Mutex<Option<InboundSink>>,
    changes: broadcast::Sender<PeerStateChange>,
    open: AtomicBool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SessionDelegate for SessionShared {
    fn peer_state_changed(&self, peer: &PeerIdentity, state: ConnectionState) {
        let transition = lock(&self.peers).apply(peer, state);

        match transition {
            Transition::Changed { from, to, event } => {
                match event {
                    PeerEvent::Connecting => tracing::info!("Connecting: {}", peer),
                    PeerEvent::Connected => tracing::info!("Connected: {}", peer),
                    PeerEvent::ConnectFailed => {
                        tracing::info!("Not connected: {} (handshake failed)", peer)
                    }
                    PeerEvent::Disconnected => tracing::info!("Not connected: {}", peer),
                }
                // No subscribers is fine
                let _ = self.changes.send(PeerStateChange {
                    peer: peer.clone(),
                    from,
                    to,
                    event,
                });
            }
            Transition::Ignored { current, reported } => {
                tracing::warn!(
                    "Ignoring out-of-order state for {}: {} -> {}",
                    peer,
                    current,
                    reported
                );
            }
        }
    }

    fn data_received(&self, data: Vec<u8>, from: &PeerIdentity) {
        let receiver = lock(&self.receiver);
        match receiver.as_ref() {
            Some(sink) => {
                tracing::debug!("Received {} bytes from {}", data.len(), from);
                let payload = InboundPayload {
                    from: from.clone(),
                    data,
                };
                match sink.tx.try_send(payload) {
                    Ok(()) => {}
                    Err(mpsc::error::TrySendError::Full(payload)) => {
                        sink.overflowed.fetch_add(1, Ordering::Relaxed);
                        tracing::warn!(
                            "Receive queue full; dropping {} bytes from {}",
                            payload.data.len(),
                            from
                        );
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => {
                        tracing::debug!("Receive handler gone; dropping payload from {}", from);
                    }
                }
            }
            None => {
                tracing::debug!("No receive handler; dropping payload from {}", from);
            }
        }
    }

    fn resource_event(&self, event: ResourceEvent) {
        tracing::debug!("Ignoring resource event: {:?}", event);
    }
}

/// The local peer's session.
///
/// Cheap to clone; clones share the same session.
pub struct PeerSession<T: Transport> {
    identity: PeerIdentity,
    service_type: ServiceType,
    transport: Arc<T>,
    shared: Arc<SessionShared>,
}

impl<T: Transport> Clone for PeerSession<T> {
    fn clone(&self) -> Self {
        Self {
            identity: self.identity.clone(),
            service_type: self.service_type.clone(),
            transport: Arc::clone(&self.transport),
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: Transport> PeerSession<T> {
    /// Create the local identity from the configured display name and open
    /// an encrypted session on `transport`.
    ///
    /// # Errors
    ///
    /// `Config`/`Identity` if the configuration is invalid;
    /// `TransportUnavailable` if the transport cannot open a session. Both
    /// are recoverable; the caller may retry.
    pub async fn initialize(config: &ExchangeConfig, transport: T) -> Result<Self, ExchangeError> {
        config.validate()?;
        let identity = PeerIdentity::new(&config.display_name)?;
        Self::with_identity(identity, config.service_type.clone(), transport).await
    }

    /// Open a session with an explicit identity.
    pub async fn with_identity(
        identity: PeerIdentity,
        service_type: ServiceType,
        transport: T,
    ) -> Result<Self, ExchangeError> {
        let (changes, _) = broadcast::channel(STATE_CHANGE_CAPACITY);
        let shared = Arc::new(SessionShared {
            peers: Mutex::new(PeerTable::new()),
            receiver: Mutex::new(None),
            changes,
            open: AtomicBool::new(true),
        });

        transport
            .open_session(&identity, EncryptionPreference::Required, shared.clone())
            .await
            .map_err(ExchangeError::TransportUnavailable)?;

        tracing::info!(
            "Session open as {} ({}), service {}",
            identity,
            identity.peer_id(),
            service_type
        );

        Ok(Self {
            identity,
            service_type,
            transport: Arc::new(transport),
            shared,
        })
    }

    /// The local identity.
    pub fn identity(&self) -> &PeerIdentity {
        &self.identity
    }

    /// The service type this session advertises and browses under.
    pub fn service_type(&self) -> &ServiceType {
        &self.service_type
    }

    /// Peers currently in the `Connected` state.
    pub fn connected_peers(&self) -> Vec<PeerIdentity> {
        lock(&self.shared.peers).connected()
    }

    /// Current state of a remote peer.
    pub fn peer_state(&self, peer_id: &PeerId) -> ConnectionState {
        lock(&self.shared.peers).state_of(peer_id)
    }

    /// Check if at least one peer is connected.
    pub fn is_connected(&self) -> bool {
        lock(&self.shared.peers).connected_count() > 0
    }

    /// Check if the session is still open, i.e. not yet disconnected.
    pub fn is_open(&self) -> bool {
        self.shared.open.load(Ordering::Acquire)
    }

    /// Subscribe to peer state changes.
    pub fn subscribe(&self) -> broadcast::Receiver<PeerStateChange> {
        self.shared.changes.subscribe()
    }

    /// Register the receive handler, replacing any previous one.
    ///
    /// Every message delivered by the transport is forwarded unmodified to
    /// the returned queue, which holds at most `capacity` payloads. Payloads
    /// arriving while it is full are dropped and counted in `overflowed`.
    pub fn register_receiver(
        &self,
        capacity: usize,
        overflowed: Arc<AtomicU64>,
    ) -> mpsc::Receiver<InboundPayload> {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        *lock(&self.shared.receiver) = Some(InboundSink { tx, overflowed });
        rx
    }

    /// Leave the session. Every tracked peer ends up `NotConnected`.
    pub async fn disconnect(&self) -> Result<(), ExchangeError> {
        self.transport
            .disconnect()
            .await
            .map_err(ExchangeError::TransportUnavailable)?;
        self.shared.open.store(false, Ordering::Release);

        // Peers the transport did not report on
        let remaining = lock(&self.shared.peers).tracked();
        for peer in remaining {
            self.shared
                .peer_state_changed(&peer, ConnectionState::NotConnected);
        }
        tracing::info!("Session closed");
        Ok(())
    }

    /// The underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }
}

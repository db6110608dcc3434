//! Transport abstraction for todo-sync.
//!
//! This module provides a pluggable transport layer that abstracts the
//! platform's peer-to-peer connectivity framework (loopback for local runs,
//! mock for testing).
//!
//! # Design
//!
//! The transport is a capability interface:
//! - `open_session()` joins a session and registers the event sink
//! - `start_advertising()` / `stop_advertising()` publish availability
//! - `start_browsing()` / `stop_browsing()` stream discovered peers
//! - `connect()` asks a discovered peer to join the session
//! - `send()` delivers bytes to a set of connected peers
//!
//! Everything the transport observes flows back through [`SessionDelegate`],
//! whose methods may be invoked from any thread and must not block.

mod loopback;
mod mock;

pub use loopback::{LoopbackHub, LoopbackTransport};
pub use mock::{MockTransport, SentMessage};

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use todo_sync_core::ConnectionState;
use todo_sync_types::{PeerId, PeerIdentity, ServiceType};

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The connectivity layer could not be used.
    #[error("transport unavailable: {0}")]
    Unavailable(String),

    /// No session has been opened.
    #[error("session not open")]
    NotOpen,

    /// Connect request could not be issued.
    #[error("connect failed: {0}")]
    ConnectFailed(String),

    /// Send was refused.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// The session was opened and has since been left.
    #[error("session closed")]
    Closed,
}

/// Encryption requirement for the session.
///
/// Sessions are always opened encrypted; peers that cannot encrypt are
/// refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncryptionPreference {
    /// Peers that cannot encrypt are refused.
    Required,
}

/// Delivery semantics requested for a send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendMode {
    /// Ordered and retransmitted; arrives exactly once or the send fails.
    Reliable,
    /// Best effort.
    Unreliable,
}

/// Discovery events delivered while browsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryEvent {
    /// A peer is advertising the browsed service type.
    Found(PeerIdentity),
    /// A previously found peer stopped advertising.
    Lost(PeerId),
}

/// Resource and stream transfer notifications.
///
/// todo-sync exchanges records as plain messages only; these are reported
/// so a delegate can log them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceEvent {
    /// A peer opened a byte stream.
    StreamOpened {
        /// Stream name chosen by the sender.
        name: String,
        /// Sending peer.
        from: PeerIdentity,
    },
    /// A resource transfer started.
    Started {
        /// Resource name chosen by the sender.
        name: String,
        /// Sending peer.
        from: PeerIdentity,
    },
    /// A resource transfer finished.
    Finished {
        /// Resource name chosen by the sender.
        name: String,
        /// Sending peer.
        from: PeerIdentity,
        /// Failure description, if the transfer failed.
        error: Option<String>,
    },
}

/// Session event sink.
///
/// Invoked by the transport, possibly from a background thread. Implementors
/// must return quickly; any real work belongs on another task.
pub trait SessionDelegate: Send + Sync {
    /// A remote peer's connection state changed.
    fn peer_state_changed(&self, peer: &PeerIdentity, state: ConnectionState);

    /// A complete message arrived from a connected peer.
    fn data_received(&self, data: Vec<u8>, from: &PeerIdentity);

    /// A stream or resource transfer event occurred.
    fn resource_event(&self, event: ResourceEvent);
}

/// Transport trait for peer discovery and message delivery.
///
/// Implementations wrap the underlying connectivity framework.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Join a session as `local`, reporting events to `delegate`.
    async fn open_session(
        &self,
        local: &PeerIdentity,
        encryption: EncryptionPreference,
        delegate: Arc<dyn SessionDelegate>,
    ) -> Result<(), TransportError>;

    /// Advertise the local peer under `service`, with no discovery metadata.
    async fn start_advertising(&self, service: &ServiceType) -> Result<(), TransportError>;

    /// Stop advertising.
    async fn stop_advertising(&self) -> Result<(), TransportError>;

    /// Browse for peers advertising `service`.
    async fn start_browsing(
        &self,
        service: &ServiceType,
    ) -> Result<mpsc::UnboundedReceiver<DiscoveryEvent>, TransportError>;

    /// Stop browsing; the discovery stream ends.
    ///
    /// Synchronous so a browser can stop from its `Drop`.
    fn stop_browsing(&self) -> Result<(), TransportError>;

    /// Invite a discovered peer into the session.
    ///
    /// Returns once the request is issued; the outcome arrives through
    /// [`SessionDelegate::peer_state_changed`].
    async fn connect(&self, peer: &PeerIdentity) -> Result<(), TransportError>;

    /// Send `data` to every peer in `peers`.
    async fn send(&self, data: &[u8], peers: &[PeerId], mode: SendMode)
        -> Result<(), TransportError>;

    /// Leave the session.
    async fn disconnect(&self) -> Result<(), TransportError>;
}

//! Error types for the exchange layer.

use thiserror::Error;
use todo_sync_types::{CodecError, IdentityError, PeerId};

use crate::config::ConfigError;
use crate::store::StoreError;
use crate::transport::TransportError;

/// Errors surfaced to the application.
///
/// Every variant is recoverable: none of them tear down the session or
/// disconnect peers.
#[derive(Debug, Error)]
pub enum ExchangeError {
    /// The session or advertiser could not be started.
    #[error("session not ready: {0}")]
    TransportUnavailable(#[source] TransportError),

    /// A send was attempted with nobody connected.
    #[error("no connected peers")]
    NoConnectedPeers,

    /// The transport refused to enqueue a send.
    #[error("send rejected: {0}")]
    SendRejected(#[source] TransportError),

    /// Received bytes did not decode to a record.
    #[error("malformed payload: {0}")]
    DecodeFailure(#[source] CodecError),

    /// A record could not be encoded.
    #[error("encode failed: {0}")]
    Encode(#[source] CodecError),

    /// The peer is not in the discovered list.
    #[error("unknown peer: {0}")]
    UnknownPeer(PeerId),

    /// A connect request could not be issued.
    #[error("connect failed: {0}")]
    ConnectFailed(#[source] TransportError),

    /// Browsing could not be started or stopped.
    #[error("discovery failed: {0}")]
    Discovery(#[source] TransportError),

    /// Invalid local identity.
    #[error("invalid identity: {0}")]
    Identity(#[from] IdentityError),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Item store failure.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        assert_eq!(
            ExchangeError::NoConnectedPeers.to_string(),
            "no connected peers"
        );
        let err = ExchangeError::SendRejected(TransportError::SendFailed("queue full".into()));
        assert_eq!(err.to_string(), "send rejected: send failed: queue full");
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ExchangeError>();
    }

    #[test]
    fn identity_error_converts() {
        let err: ExchangeError = IdentityError::EmptyDisplayName.into();
        assert!(matches!(err, ExchangeError::Identity(_)));
    }
}

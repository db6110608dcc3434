//! Browser - finds nearby peers and invites them into the session.
//!
//! The browser presents discovered peers to the caller and completes with a
//! [`BrowserOutcome`] exactly once: `Finished` when the caller is done
//! choosing, `Cancelled` when it backs out or drops the browser. Either way
//! the transport stops browsing.

use tokio::sync::{mpsc, oneshot};
use todo_sync_core::DiscoveredPeers;
use todo_sync_types::{PeerId, PeerIdentity};

use crate::error::ExchangeError;
use crate::session::PeerSession;
use crate::transport::{DiscoveryEvent, Transport};

/// How a browse ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrowserOutcome {
    /// The user finished choosing peers.
    Finished,
    /// The user dismissed the browser.
    Cancelled,
}

/// A discovery session.
pub struct Browser<T: Transport> {
    session: PeerSession<T>,
    events: mpsc::UnboundedReceiver<DiscoveryEvent>,
    discovered: DiscoveredPeers,
    outcome: Option<oneshot::Sender<BrowserOutcome>>,
}

impl<T: Transport> Browser<T> {
    /// Start browsing for peers under the session's service type.
    ///
    /// Returns the browser and a receiver that resolves once the browse
    /// ends.
    pub async fn start(
        session: PeerSession<T>,
    ) -> Result<(Self, oneshot::Receiver<BrowserOutcome>), ExchangeError> {
        let events = session
            .transport()
            .start_browsing(session.service_type())
            .await
            .map_err(ExchangeError::Discovery)?;
        let (tx, rx) = oneshot::channel();

        tracing::info!("Browsing for {}", session.service_type());

        let local = session.identity().peer_id();
        Ok((
            Self {
                session,
                events,
                discovered: DiscoveredPeers::new(local),
                outcome: Some(tx),
            },
            rx,
        ))
    }

    /// Wait for the next change to the discovered set.
    ///
    /// Duplicate announcements and the local peer are filtered out. Returns
    /// `None` once the transport stops reporting.
    pub async fn next_event(&mut self) -> Option<DiscoveryEvent> {
        while let Some(event) = self.events.recv().await {
            match &event {
                DiscoveryEvent::Found(peer) => {
                    if self.discovered.found(peer.clone()) {
                        tracing::debug!("Found peer {}", peer);
                        return Some(event);
                    }
                }
                DiscoveryEvent::Lost(id) => {
                    if let Some(peer) = self.discovered.lost(id) {
                        tracing::debug!("Lost peer {}", peer);
                        return Some(event);
                    }
                }
            }
        }
        None
    }

    /// Peers currently discovered, in discovery order.
    pub fn peers(&self) -> &[PeerIdentity] {
        self.discovered.as_slice()
    }

    /// Invite a discovered peer into the session.
    ///
    /// The result of the handshake arrives as a state change on the session.
    pub async fn invite(&self, peer_id: &PeerId) -> Result<(), ExchangeError> {
        let peer = self
            .discovered
            .get(peer_id)
            .ok_or(ExchangeError::UnknownPeer(*peer_id))?;

        tracing::info!("Inviting {}", peer);
        self.session
            .transport()
            .connect(peer)
            .await
            .map_err(ExchangeError::ConnectFailed)
    }

    /// Stop browsing and report [`BrowserOutcome::Finished`].
    pub async fn finish(mut self) -> Result<(), ExchangeError> {
        self.close(BrowserOutcome::Finished)
    }

    /// Stop browsing and report [`BrowserOutcome::Cancelled`].
    pub async fn cancel(mut self) -> Result<(), ExchangeError> {
        self.close(BrowserOutcome::Cancelled)
    }

    /// Signal `outcome` and stop browsing. Only the first call has effect.
    fn close(&mut self, outcome: BrowserOutcome) -> Result<(), ExchangeError> {
        let Some(tx) = self.outcome.take() else {
            return Ok(());
        };
        tracing::info!("Browser {:?}", outcome);
        // Receiver may already be gone
        let _ = tx.send(outcome);

        self.session
            .transport()
            .stop_browsing()
            .map_err(ExchangeError::Discovery)
    }
}

impl<T: Transport> Drop for Browser<T> {
    fn drop(&mut self) {
        if let Err(e) = self.close(BrowserOutcome::Cancelled) {
            tracing::debug!("Stopping dropped browser: {}", e);
        }
    }
}

//! Discovered-peer list for the browser.
//!
//! Peers appear in the order their discovery events arrived. The local
//! peer is never listed, and a peer found twice keeps its first position.

use todo_sync_types::{PeerId, PeerIdentity};

/// Peers currently visible under the browsed service type.
#[derive(Debug, Clone)]
pub struct DiscoveredPeers {
    local: PeerId,
    peers: Vec<PeerIdentity>,
}

impl DiscoveredPeers {
    /// Create an empty list that ignores the local peer.
    pub fn new(local: PeerId) -> Self {
        Self {
            local,
            peers: Vec::new(),
        }
    }

    /// Record a found peer. Returns `false` if it was ours or already listed.
    pub fn found(&mut self, peer: PeerIdentity) -> bool {
        if peer.peer_id() == self.local || self.contains(&peer.peer_id()) {
            return false;
        }
        self.peers.push(peer);
        true
    }

    /// Remove a peer that is no longer visible.
    pub fn lost(&mut self, peer_id: &PeerId) -> Option<PeerIdentity> {
        let pos = self.peers.iter().position(|p| p.peer_id() == *peer_id)?;
        Some(self.peers.remove(pos))
    }

    /// Look up a listed peer.
    pub fn get(&self, peer_id: &PeerId) -> Option<&PeerIdentity> {
        self.peers.iter().find(|p| p.peer_id() == *peer_id)
    }

    /// Check whether a peer is listed.
    pub fn contains(&self, peer_id: &PeerId) -> bool {
        self.get(peer_id).is_some()
    }

    /// Listed peers in arrival order.
    pub fn as_slice(&self) -> &[PeerIdentity] {
        &self.peers
    }

    /// Number of listed peers.
    pub fn len(&self) -> usize {
        self.peers.len()
    }

    /// Check if nothing has been discovered.
    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}

//! The session's peer table.
//!
//! Tracks every remote peer the transport has reported on, keyed by
//! [`PeerId`], and applies reported states through the per-peer
//! [`ConnectionState`] machine. Peers that fall back to `NotConnected` are
//! removed.

use std::collections::HashMap;
use todo_sync_types::{PeerId, PeerIdentity};

use crate::state::{Action, ConnectionState, PeerEvent};

/// Result of applying one reported state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The report advanced the peer's lifecycle.
    Changed {
        /// State before the report.
        from: ConnectionState,
        /// State after the report.
        to: ConnectionState,
        /// Event to surface to observers.
        event: PeerEvent,
    },
    /// The report did not fit the lifecycle and was dropped.
    Ignored {
        /// The peer's state, unchanged.
        current: ConnectionState,
        /// What the transport reported.
        reported: ConnectionState,
    },
}

#[derive(Debug, Clone)]
struct PeerEntry {
    identity: PeerIdentity,
    state: ConnectionState,
}

/// Remote peers and their connection state.
#[derive(Debug, Default)]
pub struct PeerTable {
    peers: HashMap<PeerId, PeerEntry>,
}

impl PeerTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a state reported by the transport for `peer`.
    pub fn apply(&mut self, peer: &PeerIdentity, reported: ConnectionState) -> Transition {
        let current = self.state_of(&peer.peer_id());
        let (next, actions) = current.on_report(reported);

        let mut event = None;
        for action in actions {
            match action {
                Action::Track => {
                    self.peers.insert(
                        peer.peer_id(),
                        PeerEntry {
                            identity: peer.clone(),
                            state: next,
                        },
                    );
                }
                Action::Forget => {
                    self.peers.remove(&peer.peer_id());
                }
                Action::Emit(e) => event = Some(e),
            }
        }

        match event {
            Some(event) => Transition::Changed {
                from: current,
                to: next,
                event,
            },
            None => Transition::Ignored { current, reported },
        }
    }

    /// Current state of a peer (`NotConnected` if unknown).
    pub fn state_of(&self, peer_id: &PeerId) -> ConnectionState {
        self.peers
            .get(peer_id)
            .map(|e| e.state)
            .unwrap_or_default()
    }

    /// Peers in the `Connected` state, ordered by id.
    pub fn connected(&self) -> Vec<PeerIdentity> {
        let mut peers: Vec<PeerIdentity> = self
            .peers
            .values()
            .filter(|e| e.state.is_connected())
            .map(|e| e.identity.clone())
            .collect();
        peers.sort_by_key(|p| p.peer_id());
        peers
    }

    /// Number of peers in the `Connected` state.
    pub fn connected_count(&self) -> usize {
        self.peers.values().filter(|e| e.state.is_connected()).count()
    }

    /// Whether a peer is currently connected.
    pub fn is_connected(&self, peer_id: &PeerId) -> bool {
        self.state_of(peer_id).is_connected()
    }

    /// Number of tracked peers (connecting or connected).
    pub fn len(&self) -> usize {
        self.peers.len()
    }

    /// Check if no peers are tracked.
    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// Every tracked peer (connecting or connected), ordered by id.
    pub fn tracked(&self) -> Vec<PeerIdentity> {
        let mut peers: Vec<PeerIdentity> =
            self.peers.values().map(|e| e.identity.clone()).collect();
        peers.sort_by_key(|p| p.peer_id());
        peers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ConnectionState::*;

    fn peer(name: &str) -> PeerIdentity {
        PeerIdentity::new(name).unwrap()
    }

    #[test]
    fn unknown_peer_is_not_connected() {
        let table = PeerTable::new();
        assert_eq!(table.state_of(&PeerId::random()), NotConnected);
        assert!(table.is_empty());
    }

    #[test]
    fn connect_sequence_tracks_peer() {
        let mut table = PeerTable::new();
        let bob = peer("Bob");

        let t = table.apply(&bob, Connecting);
        assert_eq!(
            t,
            Transition::Changed {
                from: NotConnected,
                to: Connecting,
                event: PeerEvent::Connecting
            }
        );
        assert_eq!(table.len(), 1);
        assert_eq!(table.connected_count(), 0);

        table.apply(&bob, Connected);
        assert!(table.is_connected(&bob.peer_id()));
        assert_eq!(table.connected(), vec![bob]);
    }

    #[test]
    fn failed_handshake_removes_peer() {
        let mut table = PeerTable::new();
        let bob = peer("Bob");

        table.apply(&bob, Connecting);
        let t = table.apply(&bob, NotConnected);

        assert!(matches!(
            t,
            Transition::Changed {
                event: PeerEvent::ConnectFailed,
                ..
            }
        ));
        assert!(table.is_empty());
    }

    #[test]
    fn lost_link_removes_peer() {
        let mut table = PeerTable::new();
        let bob = peer("Bob");
        table.apply(&bob, Connecting);
        table.apply(&bob, Connected);

        table.apply(&bob, NotConnected);
        assert!(table.is_empty());
        assert!(table.connected().is_empty());
    }

    #[test]
    fn out_of_order_report_is_ignored() {
        let mut table = PeerTable::new();
        let bob = peer("Bob");
        table.apply(&bob, Connecting);
        table.apply(&bob, Connected);

        let t = table.apply(&bob, Connecting);
        assert_eq!(
            t,
            Transition::Ignored {
                current: Connected,
                reported: Connecting
            }
        );
        assert!(table.is_connected(&bob.peer_id()));
    }

    #[test]
    fn not_connected_for_unknown_peer_is_ignored() {
        let mut table = PeerTable::new();
        let t = table.apply(&peer("Ghost"), NotConnected);
        assert!(matches!(t, Transition::Ignored { .. }));
        assert!(table.is_empty());
    }

    #[test]
    fn peers_are_independent() {
        let mut table = PeerTable::new();
        let bob = peer("Bob");
        let carol = peer("Carol");

        table.apply(&bob, Connecting);
        table.apply(&carol, Connecting);
        table.apply(&carol, Connected);
        table.apply(&bob, NotConnected);

        assert_eq!(table.connected(), vec![carol.clone()]);
        assert_eq!(table.state_of(&bob.peer_id()), NotConnected);
        assert_eq!(table.state_of(&carol.peer_id()), Connected);
    }

    #[test]
    fn connected_list_is_ordered_by_id() {
        let mut table = PeerTable::new();
        let mut all: Vec<PeerIdentity> = (0..5).map(|i| peer(&format!("peer-{i}"))).collect();
        for p in &all {
            table.apply(p, Connecting);
            table.apply(p, Connected);
        }
        all.sort_by_key(|p| p.peer_id());
        assert_eq!(table.connected(), all);
    }

    #[test]
    fn tracked_includes_connecting_peers() {
        let mut table = PeerTable::new();
        let bob = peer("Bob");
        table.apply(&bob, Connecting);

        assert_eq!(table.tracked(), vec![bob]);
        assert!(table.connected().is_empty());
    }
}

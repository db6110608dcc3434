//! Per-peer connection state machine for todo-sync.
//!
//! This module provides a pure, side-effect-free state machine for one remote
//! peer's connection lifecycle. The transport reports the state it observed;
//! the machine validates that report against the current state and produces
//! a new state plus a list of actions to execute.
//!
//! ```text
//!  NotConnected --(connect accepted)--> Connecting --(handshake complete)--> Connected
//!  Connecting --(handshake failed/timeout)--> NotConnected
//!  Connected --(link lost)--> NotConnected
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Connection state of one remote peer - NO I/O, just state transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ConnectionState {
    /// Not connected (initial and final state).
    #[default]
    NotConnected,
    /// Connect request accepted, handshake in progress.
    Connecting,
    /// Handshake complete; data may flow.
    Connected,
}

impl ConnectionState {
    /// Create a new state machine in the NotConnected state.
    pub fn new() -> Self {
        Self::NotConnected
    }

    /// Process a state reported by the transport and return the new state
    /// plus actions to execute.
    ///
    /// Reports that do not follow the lifecycle (for example `Connected`
    /// followed by `Connecting`) leave the state unchanged and produce no
    /// actions.
    pub fn on_report(self, reported: ConnectionState) -> (Self, Vec<Action>) {
        match (self, reported) {
            // From NotConnected
            (Self::NotConnected, Self::Connecting) => (
                Self::Connecting,
                vec![Action::Track, Action::Emit(PeerEvent::Connecting)],
            ),

            // From Connecting
            (Self::Connecting, Self::Connected) => (
                Self::Connected,
                vec![Action::Track, Action::Emit(PeerEvent::Connected)],
            ),
            (Self::Connecting, Self::NotConnected) => (
                Self::NotConnected,
                vec![Action::Forget, Action::Emit(PeerEvent::ConnectFailed)],
            ),

            // From Connected
            (Self::Connected, Self::NotConnected) => (
                Self::NotConnected,
                vec![Action::Forget, Action::Emit(PeerEvent::Disconnected)],
            ),

            // Invalid transitions - stay in current state
            (state, _) => (state, vec![]),
        }
    }

    /// Check if data may be sent to this peer.
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NotConnected => "not-connected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
        };
        f.write_str(s)
    }
}

/// Actions to be executed by the owner of the peer table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Record the new state for this peer.
    Track,
    /// Remove the peer; nothing is kept after `NotConnected`.
    Forget,
    /// Notify observers.
    Emit(PeerEvent),
}

/// Lifecycle events reported to observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PeerEvent {
    /// A connect request was accepted.
    Connecting,
    /// The handshake completed.
    Connected,
    /// The handshake failed or timed out.
    ConnectFailed,
    /// An established link was lost.
    Disconnected,
}

#[cfg(test)]
mod tests {
    use super::*;

    use ConnectionState::*;

    #[test]
    fn starts_not_connected() {
        assert_eq!(ConnectionState::new(), NotConnected);
        assert_eq!(ConnectionState::default(), NotConnected);
    }

    #[test]
    fn accepted_connect_transitions_to_connecting() {
        let (state, actions) = NotConnected.on_report(Connecting);
        assert_eq!(state, Connecting);
        assert!(actions.contains(&Action::Emit(PeerEvent::Connecting)));
        assert!(actions.contains(&Action::Track));
    }

    #[test]
    fn handshake_complete_transitions_to_connected() {
        let (state, actions) = Connecting.on_report(Connected);
        assert_eq!(state, Connected);
        assert!(actions.contains(&Action::Emit(PeerEvent::Connected)));
    }

    #[test]
    fn handshake_failure_forgets_peer() {
        let (state, actions) = Connecting.on_report(NotConnected);
        assert_eq!(state, NotConnected);
        assert!(actions.contains(&Action::Forget));
        assert!(actions.contains(&Action::Emit(PeerEvent::ConnectFailed)));
    }

    #[test]
    fn link_lost_forgets_peer() {
        let (state, actions) = Connected.on_report(NotConnected);
        assert_eq!(state, NotConnected);
        assert!(actions.contains(&Action::Forget));
        assert!(actions.contains(&Action::Emit(PeerEvent::Disconnected)));
    }

    #[test]
    fn connected_never_goes_back_to_connecting() {
        let (state, actions) = Connected.on_report(Connecting);
        assert_eq!(state, Connected);
        assert!(actions.is_empty());
    }

    #[test]
    fn skipping_connecting_is_ignored() {
        let (state, actions) = NotConnected.on_report(Connected);
        assert_eq!(state, NotConnected);
        assert!(actions.is_empty());
    }

    #[test]
    fn repeated_reports_are_ignored() {
        for s in [NotConnected, Connecting, Connected] {
            let (state, actions) = s.on_report(s);
            assert_eq!(state, s);
            assert!(actions.is_empty(), "{s} -> {s} should be a no-op");
        }
    }

    #[test]
    fn full_lifecycle() {
        let (s, _) = NotConnected.on_report(Connecting);
        let (s, _) = s.on_report(Connected);
        assert!(s.is_connected());
        let (s, _) = s.on_report(NotConnected);
        assert_eq!(s, NotConnected);

        // Reconnect after loss
        let (s, _) = s.on_report(Connecting);
        assert_eq!(s, Connecting);
    }

    #[test]
    fn display_matches_serde_names() {
        for s in [NotConnected, Connecting, Connected] {
            let json = serde_json::to_string(&s).unwrap();
            assert_eq!(json, format!("\"{s}\""));
        }
    }
}

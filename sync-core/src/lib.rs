//! # sync-core
//!
//! Pure logic for todo-sync (no I/O, instant tests).
//!
//! This crate implements the state machines and bookkeeping for peer
//! sessions without any network or disk I/O, enabling fast unit tests.
//!
//! ## Design Philosophy
//!
//! All modules in this crate are **pure** - they take input and produce output
//! without side effects. This enables:
//! - Instant unit tests (no mocks, no async)
//! - Deterministic behavior (same input → same output)
//! - Easy reasoning about state transitions
//!
//! The actual I/O (transport, disk) is performed by `sync-client`, which
//! interprets the results produced here.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod discovery;
pub mod peers;
pub mod policy;
pub mod state;

pub use discovery::DiscoveredPeers;
pub use peers::{PeerTable, Transition};
pub use policy::{DuplicatePolicy, Resolution};
pub use state::{Action, ConnectionState, PeerEvent};

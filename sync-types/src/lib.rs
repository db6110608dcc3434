//! # sync-types
//!
//! Wire format types for todo-sync peer-to-peer item exchange.
//!
//! This crate provides the foundational types used across all todo-sync crates:
//! - [`PeerId`], [`PeerIdentity`], [`ServiceType`] - Session identity and discovery
//! - [`RecordId`], [`Timestamp`] - Record identity and ordering
//! - [`TodoRecord`] - The record exchanged between peers
//! - [`CodecError`], [`IdentityError`] - Error types

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod ids;
mod record;

pub use error::{CodecError, IdentityError};
pub use ids::{PeerId, PeerIdentity, RecordId, ServiceType, Timestamp};
pub use record::{TodoRecord, MAX_RECORD_SIZE};

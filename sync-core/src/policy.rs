//! Duplicate handling for received records.
//!
//! A received record whose identifier is already stored is resolved by the
//! configured [`DuplicatePolicy`]. No field-level merging is attempted.

use serde::{Deserialize, Serialize};
use todo_sync_types::TodoRecord;

/// How to treat a record whose identifier is already stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum DuplicatePolicy {
    /// Insert unknown records; replace differing ones (last write wins);
    /// identical ones are a no-op.
    #[default]
    Upsert,
    /// Insert unknown records; refuse any record whose id is already stored.
    RejectDuplicate,
}

/// What the store should do with an incoming record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Id not stored yet.
    Insert,
    /// Overwrite the stored record.
    Replace,
    /// Stored record is identical; nothing to do.
    Unchanged,
    /// Refuse the incoming record.
    Reject,
}

impl Resolution {
    /// Whether the store must be written.
    pub fn writes(&self) -> bool {
        matches!(self, Self::Insert | Self::Replace)
    }
}

impl DuplicatePolicy {
    /// Decide what to do with `incoming` given what is stored under its id.
    pub fn resolve(&self, existing: Option<&TodoRecord>, incoming: &TodoRecord) -> Resolution {
        match (self, existing) {
            (_, None) => Resolution::Insert,
            (Self::Upsert, Some(stored)) if stored == incoming => Resolution::Unchanged,
            (Self::Upsert, Some(_)) => Resolution::Replace,
            (Self::RejectDuplicate, Some(_)) => Resolution::Reject,
        }
    }
}

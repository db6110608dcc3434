//! Error types for todo-sync.

use thiserror::Error;

/// Errors produced while encoding or decoding a record.
#[derive(Debug, Error)]
pub enum CodecError {
    /// JSON serialization failed
    #[error("serialization failed: {0}")]
    Serialization(#[source] serde_json::Error),

    /// JSON deserialization failed
    #[error("deserialization failed: {0}")]
    Deserialization(#[source] serde_json::Error),

    /// Payload exceeds the maximum record size
    #[error("payload too large: {size} bytes (max {max})")]
    TooLarge {
        /// Actual payload size in bytes.
        size: usize,
        /// Maximum allowed size in bytes.
        max: usize,
    },
}

/// Errors produced while validating identity and discovery names.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdentityError {
    /// Display name is empty
    #[error("display name must not be empty")]
    EmptyDisplayName,

    /// Display name exceeds the byte limit
    #[error("display name is {0} bytes (max 63)")]
    DisplayNameTooLong(usize),

    /// Service type does not follow the naming rules
    #[error("invalid service type {name:?}: {reason}")]
    InvalidServiceType {
        /// The rejected name.
        name: String,
        /// Which rule it broke.
        reason: &'static str,
    },
}

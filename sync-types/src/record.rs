//! The todo record exchanged between peers.
//!
//! Records travel as a self-describing JSON object, the same encoding the
//! item store writes to disk, so a stored payload can be sent unchanged.

use serde::{Deserialize, Serialize};

use crate::{CodecError, RecordId, Timestamp};

/// Maximum encoded record size (64 KiB).
pub const MAX_RECORD_SIZE: usize = 64 * 1024;

/// A single todo item.
///
/// Immutable once created apart from the `completed` flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TodoRecord {
    /// Item title
    pub title: String,
    /// Whether the item has been completed
    pub completed: bool,
    /// Creation time
    pub created_at: Timestamp,
    /// Globally unique identifier, stable across encode/decode
    pub identifier: RecordId,
}

impl TodoRecord {
    /// Create a new, uncompleted record stamped with the current time.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            completed: false,
            created_at: Timestamp::now(),
            identifier: RecordId::new(),
        }
    }

    /// Mark the record as completed.
    pub fn mark_completed(&mut self) {
        self.completed = true;
    }

    /// The key this record is stored under.
    pub fn key(&self) -> String {
        self.identifier.key()
    }

    /// Serialize to JSON bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, CodecError> {
        let bytes = serde_json::to_vec(self).map_err(CodecError::Serialization)?;
        if bytes.len() > MAX_RECORD_SIZE {
            return Err(CodecError::TooLarge {
                size: bytes.len(),
                max: MAX_RECORD_SIZE,
            });
        }
        Ok(bytes)
    }

    /// Deserialize from JSON bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CodecError> {
        if bytes.len() > MAX_RECORD_SIZE {
            return Err(CodecError::TooLarge {
                size: bytes.len(),
                max: MAX_RECORD_SIZE,
            });
        }
        serde_json::from_slice(bytes).map_err(CodecError::Deserialization)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> TodoRecord {
        TodoRecord {
            title: "Buy milk".into(),
            completed: false,
            created_at: Timestamp::from_micros(1_705_000_000_123_456),
            identifier: RecordId::new(),
        }
    }

    #[test]
    fn record_roundtrip_preserves_all_fields() {
        let record = sample();
        let restored = TodoRecord::from_bytes(&record.to_bytes().unwrap()).unwrap();
        assert_eq!(record, restored);
        assert_eq!(record.identifier, restored.identifier);
        assert_eq!(record.created_at.as_micros(), 1_705_000_000_123_456);
    }

    #[test]
    fn record_roundtrip_unicode_and_completed() {
        let mut record = sample();
        record.title = "Caf\u{e9} \u{2615} \"quoted\"\nline".into();
        record.mark_completed();
        let restored = TodoRecord::from_bytes(&record.to_bytes().unwrap()).unwrap();
        assert_eq!(record, restored);
        assert!(restored.completed);
    }

    #[test]
    fn encoding_is_self_describing_json() {
        let record = sample();
        let value: serde_json::Value = serde_json::from_slice(&record.to_bytes().unwrap()).unwrap();
        assert_eq!(value["title"], "Buy milk");
        assert_eq!(value["completed"], false);
        assert_eq!(value["createdAt"], 1_705_000_000_123_456i64);
        assert_eq!(value["identifier"], record.identifier.to_string());
    }

    #[test]
    fn new_record_is_not_completed() {
        let record = TodoRecord::new("Walk dog");
        assert!(!record.completed);
        assert_eq!(record.title, "Walk dog");
        assert_eq!(record.key(), record.identifier.key());
    }

    #[test]
    fn malformed_bytes_fail_to_decode() {
        assert!(matches!(
            TodoRecord::from_bytes(b"not json"),
            Err(CodecError::Deserialization(_))
        ));
        assert!(matches!(
            TodoRecord::from_bytes(br#"{"title":"x","completed":false}"#),
            Err(CodecError::Deserialization(_))
        ));
        assert!(matches!(
            TodoRecord::from_bytes(
                br#"{"title":"x","completed":false,"createdAt":1,"identifier":"not-a-uuid"}"#
            ),
            Err(CodecError::Deserialization(_))
        ));
    }

    #[test]
    fn oversized_title_rejected_on_encode() {
        let mut record = sample();
        record.title = "x".repeat(MAX_RECORD_SIZE);
        assert!(matches!(
            record.to_bytes(),
            Err(CodecError::TooLarge { .. })
        ));
    }

    #[test]
    fn oversized_payload_rejected_on_decode() {
        let bytes = vec![b' '; MAX_RECORD_SIZE + 1];
        assert!(matches!(
            TodoRecord::from_bytes(&bytes),
            Err(CodecError::TooLarge { .. })
        ));
    }
}

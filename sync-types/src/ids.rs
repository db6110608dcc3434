//! Identity and ordering types for todo-sync.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use crate::IdentityError;

/// Maximum display name length in UTF-8 bytes.
const MAX_DISPLAY_NAME_BYTES: usize = 63;

/// Maximum service type length in characters.
const MAX_SERVICE_TYPE_LEN: usize = 15;

/// A session-scoped unique identifier for a running peer.
///
/// UUID v4, generated once per process.
///
/// Never leaves the process: peers learn each other's ids from the
/// transport, not from the wire.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerId(uuid::Uuid);

impl PeerId {
    /// Create a new random PeerId.
    pub fn random() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PeerId({})", &self.to_string()[..8])
    }
}

/// The identity a peer presents to the session: a human-readable name plus
/// a unique [`PeerId`].
///
/// Two identities are equal when their ids are equal; the display name is
/// informational only.
#[derive(Clone)]
pub struct PeerIdentity {
    display_name: String,
    peer_id: PeerId,
}

impl PeerIdentity {
    /// Create an identity with a fresh random id.
    pub fn new(display_name: &str) -> Result<Self, IdentityError> {
        Self::with_id(display_name, PeerId::random())
    }

    /// Create an identity with an explicit id.
    pub fn with_id(display_name: &str, peer_id: PeerId) -> Result<Self, IdentityError> {
        if display_name.is_empty() {
            return Err(IdentityError::EmptyDisplayName);
        }
        if display_name.len() > MAX_DISPLAY_NAME_BYTES {
            return Err(IdentityError::DisplayNameTooLong(display_name.len()));
        }
        Ok(Self {
            display_name: display_name.to_string(),
            peer_id,
        })
    }

    /// The human-readable name.
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// The unique id.
    pub fn peer_id(&self) -> PeerId {
        self.peer_id
    }
}

impl PartialEq for PeerIdentity {
    fn eq(&self, other: &Self) -> bool {
        self.peer_id == other.peer_id
    }
}

impl Eq for PeerIdentity {}

impl Hash for PeerIdentity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.peer_id.hash(state);
    }
}

impl fmt::Display for PeerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name)
    }
}

impl fmt::Debug for PeerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PeerIdentity({:?}, {:?})", self.display_name, self.peer_id)
    }
}

/// The name peers advertise and browse under.
///
/// 1-15 characters: lowercase ASCII letters, digits and hyphens, at least
/// one letter, no leading, trailing or adjacent hyphens.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ServiceType(String);

impl ServiceType {
    /// Validate and wrap a service type name.
    pub fn new(name: &str) -> Result<Self, IdentityError> {
        let invalid = |reason| IdentityError::InvalidServiceType {
            name: name.to_string(),
            reason,
        };

        if name.is_empty() || name.len() > MAX_SERVICE_TYPE_LEN {
            return Err(invalid("must be 1-15 characters"));
        }
        if !name
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
        {
            return Err(invalid("only lowercase letters, digits and hyphens allowed"));
        }
        if !name.bytes().any(|b| b.is_ascii_lowercase()) {
            return Err(invalid("must contain at least one letter"));
        }
        if name.starts_with('-') || name.ends_with('-') || name.contains("--") {
            return Err(invalid("hyphens must separate characters"));
        }
        Ok(Self(name.to_string()))
    }

    /// The name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ServiceType {
    fn default() -> Self {
        Self("todo-sync".to_string())
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ServiceType {
    type Error = IdentityError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<ServiceType> for String {
    fn from(value: ServiceType) -> Self {
        value.0
    }
}

/// A globally unique identifier for a record.
///
/// UUID format; the hyphenated string form is the store key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordId(uuid::Uuid);

impl RecordId {
    /// Create a new random RecordId.
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// The key this record is stored under.
    pub fn key(&self) -> String {
        self.0.hyphenated().to_string()
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl FromStr for RecordId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        uuid::Uuid::parse_str(s).map(Self)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RecordId({})", self.0)
    }
}

/// Microseconds since the Unix epoch.
///
/// Stored as an integer so it survives the wire encoding exactly.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Create a Timestamp from microseconds since the epoch.
    pub fn from_micros(micros: i64) -> Self {
        Self(micros)
    }

    /// The current wall-clock time.
    pub fn now() -> Self {
        let micros = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| i64::try_from(d.as_micros()).unwrap_or(i64::MAX))
            .unwrap_or(0);
        Self(micros)
    }

    /// Microseconds since the epoch.
    pub fn as_micros(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peer_id_is_unique() {
        assert_ne!(PeerId::random(), PeerId::random());
    }

    #[test]
    fn identity_rejects_empty_name() {
        assert_eq!(
            PeerIdentity::new("").unwrap_err(),
            IdentityError::EmptyDisplayName
        );
    }

    #[test]
    fn identity_rejects_long_name() {
        let name = "x".repeat(64);
        assert_eq!(
            PeerIdentity::new(&name).unwrap_err(),
            IdentityError::DisplayNameTooLong(64)
        );
        assert!(PeerIdentity::new(&"x".repeat(63)).is_ok());
    }

    #[test]
    fn identity_name_limit_counts_bytes() {
        // 22 three-byte characters = 66 bytes
        let name = "\u{20ac}".repeat(22);
        assert!(name.len() > 63);
        assert!(PeerIdentity::new(&name).is_err());
    }

    #[test]
    fn identity_equality_is_by_id() {
        let id = PeerId::random();
        let a = PeerIdentity::with_id("Alice's iPhone", id).unwrap();
        let b = PeerIdentity::with_id("renamed", id).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, PeerIdentity::new("Alice's iPhone").unwrap());
    }

    #[test]
    fn service_type_accepts_valid_names() {
        for name in ["todo-sync", "foobar", "a", "x1-y2", "abcdefghijklmno"] {
            assert!(ServiceType::new(name).is_ok(), "{name} should be valid");
        }
    }

    #[test]
    fn service_type_rejects_invalid_names() {
        for name in [
            "",
            "abcdefghijklmnop",
            "Todo",
            "todo_sync",
            "123",
            "-todo",
            "todo-",
            "to--do",
        ] {
            assert!(ServiceType::new(name).is_err(), "{name} should be invalid");
        }
    }

    #[test]
    fn service_type_deserialize_validates() {
        let ok: ServiceType = serde_json::from_str("\"foobar\"").unwrap();
        assert_eq!(ok.as_str(), "foobar");
        assert!(serde_json::from_str::<ServiceType>("\"NOPE\"").is_err());
    }

    #[test]
    fn record_id_key_parses_back() {
        let id = RecordId::new();
        let parsed: RecordId = id.key().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn timestamp_ordering() {
        let t1 = Timestamp::from_micros(100);
        let t2 = Timestamp::from_micros(200);
        assert!(t1 < t2);
    }

    #[test]
    fn timestamp_now_is_recent() {
        let now = Timestamp::now();
        // after 2020-01-01
        assert!(now.as_micros() > 1_577_836_800_000_000);
    }
}

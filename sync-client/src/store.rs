//! Item storage and applying received records.
//!
//! Stores are keyed by the record's identifier string. [`RecordApplier`]
//! sits between a [`TransferChannel`](crate::TransferChannel) receiver and a
//! store, resolving records whose identifier is already present according
//! to the configured [`DuplicatePolicy`].

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::Mutex;
use todo_sync_core::{DuplicatePolicy, Resolution};
use todo_sync_types::{CodecError, RecordId, TodoRecord};

use crate::error::ExchangeError;

/// Storage errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem failure.
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A stored record could not be encoded or decoded.
    #[error("storage codec error: {0}")]
    Codec(#[from] CodecError),

    /// Key is not a record identifier.
    #[error("invalid key: {0:?}")]
    InvalidKey(String),

    /// No record stored under the key.
    #[error("no record for key {0}")]
    NotFound(String),
}

/// Persistent storage for todo records.
#[async_trait]
pub trait ItemStore: Send + Sync {
    /// Store `record` under `key`, replacing any previous value.
    async fn save(&self, record: &TodoRecord, key: &str) -> Result<(), StoreError>;

    /// Load the record stored under `key`.
    async fn load(&self, key: &str) -> Result<Option<TodoRecord>, StoreError>;

    /// Load every record, oldest first.
    async fn load_all(&self) -> Result<Vec<TodoRecord>, StoreError>;

    /// Remove the record stored under `key`.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;
}

fn sort_by_creation(records: &mut [TodoRecord]) {
    records.sort_by(|a, b| {
        a.created_at
            .cmp(&b.created_at)
            .then_with(|| a.identifier.cmp(&b.identifier))
    });
}

/// In-memory store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<String, TodoRecord>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ItemStore for MemoryStore {
    async fn save(&self, record: &TodoRecord, key: &str) -> Result<(), StoreError> {
        self.records
            .lock()
            .await
            .insert(key.to_string(), record.clone());
        Ok(())
    }

    async fn load(&self, key: &str) -> Result<Option<TodoRecord>, StoreError> {
        Ok(self.records.lock().await.get(key).cloned())
    }

    async fn load_all(&self) -> Result<Vec<TodoRecord>, StoreError> {
        let mut records: Vec<TodoRecord> = self.records.lock().await.values().cloned().collect();
        sort_by_creation(&mut records);
        Ok(records)
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        match self.records.lock().await.remove(key) {
            Some(_) => Ok(()),
            None => Err(StoreError::NotFound(key.to_string())),
        }
    }
}

/// Directory-backed store: one `<key>.json` file per record.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    /// Open (creating if needed) a store in `dir`.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        tracing::debug!("Item store at {}", dir.display());
        Ok(Self { dir })
    }

    /// Directory holding the record files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        // Only identifier-shaped keys, so a key can never escape the directory
        key.parse::<RecordId>()
            .map_err(|_| StoreError::InvalidKey(key.to_string()))?;
        Ok(self.dir.join(format!("{key}.json")))
    }
}

#[async_trait]
impl ItemStore for JsonFileStore {
    async fn save(&self, record: &TodoRecord, key: &str) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        let bytes = record.to_bytes()?;

        // Write then rename so a crash never leaves a torn file
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn load(&self, key: &str) -> Result<Option<TodoRecord>, StoreError> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(TodoRecord::from_bytes(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn load_all(&self) -> Result<Vec<TodoRecord>, StoreError> {
        let mut records = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let bytes = tokio::fs::read(&path).await?;
            match TodoRecord::from_bytes(&bytes) {
                Ok(record) => records.push(record),
                Err(e) => {
                    tracing::warn!("Skipping unreadable record {}: {}", path.display(), e);
                }
            }
        }

        sort_by_creation(&mut records);
        Ok(records)
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Result of applying a received record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// New record stored.
    Inserted,
    /// Existing record overwritten.
    Replaced,
    /// Identical record already stored.
    Unchanged,
    /// Known identifier, refused by policy.
    Rejected,
}

/// Applies received records to a store under a [`DuplicatePolicy`].
pub struct RecordApplier<S> {
    store: S,
    policy: DuplicatePolicy,
}

impl<S: ItemStore> RecordApplier<S> {
    /// Create an applier writing to `store`.
    pub fn new(store: S, policy: DuplicatePolicy) -> Self {
        Self { store, policy }
    }

    /// Resolve `record` against the store and write it if the policy allows.
    ///
    /// # Errors
    ///
    /// `Store` if the store cannot be read or written.
    pub async fn apply(&self, record: &TodoRecord) -> Result<ApplyOutcome, ExchangeError> {
        let key = record.key();
        let existing = self.store.load(&key).await?;
        let resolution = self.policy.resolve(existing.as_ref(), record);

        if resolution.writes() {
            self.store.save(record, &key).await?;
        }

        let outcome = match resolution {
            Resolution::Insert => ApplyOutcome::Inserted,
            Resolution::Replace => ApplyOutcome::Replaced,
            Resolution::Unchanged => ApplyOutcome::Unchanged,
            Resolution::Reject => {
                tracing::info!("Rejected duplicate record {}", record.identifier);
                ApplyOutcome::Rejected
            }
        };
        tracing::debug!("Applied {}: {:?}", record.identifier, outcome);
        Ok(outcome)
    }

    /// The policy in force.
    pub fn policy(&self) -> DuplicatePolicy {
        self.policy
    }

    /// The underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }
}

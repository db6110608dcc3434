//! Configuration loading for the exchange layer.
//!
//! Configuration is loaded from a TOML file; every field has a default.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use todo_sync_core::DuplicatePolicy;
use todo_sync_types::{IdentityError, PeerIdentity, ServiceType};

/// Exchange configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExchangeConfig {
    /// Human-readable name shown to other peers.
    pub display_name: String,
    /// Service type to advertise and browse under (default: `todo-sync`).
    pub service_type: ServiceType,
    /// Capacity of the channel delivering received records (default: 64).
    pub receive_buffer: usize,
    /// How received records with a known id are handled (default: upsert).
    pub duplicate_policy: DuplicatePolicy,
}

// Default value functions
fn default_display_name() -> String {
    "todo-sync device".to_string()
}

fn default_receive_buffer() -> usize {
    64
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            display_name: default_display_name(),
            service_type: ServiceType::default(),
            receive_buffer: default_receive_buffer(),
            duplicate_policy: DuplicatePolicy::default(),
        }
    }
}

impl ExchangeConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check values that serde cannot.
    pub fn validate(&self) -> Result<(), ConfigError> {
        PeerIdentity::new(&self.display_name).map_err(ConfigError::Identity)?;
        if self.receive_buffer == 0 {
            return Err(ConfigError::Invalid(
                "receive_buffer must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Set the display name.
    pub fn with_display_name(mut self, name: &str) -> Self {
        self.display_name = name.to_string();
        self
    }

    /// Set the service type.
    pub fn with_service_type(mut self, service_type: ServiceType) -> Self {
        self.service_type = service_type;
        self
    }

    /// Set the receive channel capacity.
    pub fn with_receive_buffer(mut self, capacity: usize) -> Self {
        self.receive_buffer = capacity;
        self
    }

    /// Set the duplicate policy.
    pub fn with_duplicate_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.duplicate_policy = policy;
        self
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
    /// Display name rejected.
    #[error("{0}")]
    Identity(#[source] IdentityError),
    /// Value out of range.
    #[error("{0}")]
    Invalid(String),
}

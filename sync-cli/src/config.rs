//! Configuration and store helpers for todo-sync.

use anyhow::{Context, Result};
use std::path::Path;
use todo_sync_client::{ExchangeConfig, ItemStore, JsonFileStore};
use todo_sync_types::TodoRecord;

/// Name of the optional config file in the data directory.
const CONFIG_FILE: &str = "config.toml";

/// Load the exchange configuration.
///
/// An explicit path must exist. Without one, `<data_dir>/config.toml` is
/// used if present, otherwise defaults.
pub fn load(data_dir: &Path, explicit: Option<&Path>) -> Result<ExchangeConfig> {
    if let Some(path) = explicit {
        return ExchangeConfig::from_file(path).context("Invalid configuration");
    }

    let path = data_dir.join(CONFIG_FILE);
    if path.exists() {
        ExchangeConfig::from_file(&path).context("Invalid configuration")
    } else {
        Ok(ExchangeConfig::default())
    }
}

/// Open the item store in `data_dir`.
pub async fn open_store(data_dir: &Path) -> Result<JsonFileStore> {
    JsonFileStore::open(crate::items_dir(data_dir))
        .await
        .context("Failed to open item store")
}

/// Find the single stored record whose id starts with `prefix`.
pub async fn find(store: &JsonFileStore, prefix: &str) -> Result<TodoRecord> {
    let prefix = prefix.to_ascii_lowercase();
    let mut matches: Vec<TodoRecord> = store
        .load_all()
        .await?
        .into_iter()
        .filter(|r| r.key().starts_with(&prefix))
        .collect();

    match matches.len() {
        0 => anyhow::bail!("No item matches '{}'", prefix),
        1 => Ok(matches.remove(0)),
        n => anyhow::bail!("'{}' matches {} items; use a longer prefix", prefix, n),
    }
}

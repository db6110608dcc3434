//! Remove an item.

use anyhow::{Context, Result};
use std::path::Path;
use todo_sync_client::ItemStore;

use crate::config::{find, open_store};

/// Run the delete command.
pub async fn run(data_dir: &Path, id: &str) -> Result<()> {
    let store = open_store(data_dir).await?;
    let record = find(&store, id).await?;
    store
        .delete(&record.key())
        .await
        .context("Failed to delete item")?;

    println!("Deleted: {}", record.title);
    Ok(())
}

//! Mark an item completed.

use anyhow::{Context, Result};
use std::path::Path;
use todo_sync_client::ItemStore;

use crate::config::{find, open_store};

/// Run the complete command.
pub async fn run(data_dir: &Path, id: &str) -> Result<()> {
    let store = open_store(data_dir).await?;
    let mut record = find(&store, id).await?;

    if record.completed {
        println!("Already completed: {}", record.title);
        return Ok(());
    }
    record.mark_completed();
    store
        .save(&record, &record.key())
        .await
        .context("Failed to save item")?;

    println!("Completed: {}", record.title);
    Ok(())
}

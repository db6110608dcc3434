//! Create a todo item.

use anyhow::{Context, Result};
use std::path::Path;
use todo_sync_client::ItemStore;
use todo_sync_types::TodoRecord;

use crate::config::open_store;

/// Run the add command.
pub async fn run(data_dir: &Path, title: &str) -> Result<TodoRecord> {
    let store = open_store(data_dir).await?;
    let record = TodoRecord::new(title);
    store
        .save(&record, &record.key())
        .await
        .context("Failed to save item")?;

    println!("Added {} {}", &record.key()[..8], record.title);
    Ok(record)
}

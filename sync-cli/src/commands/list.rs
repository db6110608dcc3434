//! List stored items.

use anyhow::Result;
use std::path::Path;
use todo_sync_client::ItemStore;
use todo_sync_types::TodoRecord;

use crate::config::open_store;

/// Run the list command.
pub async fn run(data_dir: &Path, json: bool) -> Result<()> {
    let store = open_store(data_dir).await?;
    let records = store.load_all().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    if records.is_empty() {
        println!("No items. Add one with: todo-sync add <title>");
        return Ok(());
    }
    for record in &records {
        println!("{}", format_line(record));
    }
    Ok(())
}

/// One line per record: short id, checkbox, title.
pub fn format_line(record: &TodoRecord) -> String {
    let mark = if record.completed { "x" } else { " " };
    format!("{} [{}] {}", &record.key()[..8], mark, record.title)
}

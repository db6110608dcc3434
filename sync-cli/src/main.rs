//! # todo-sync
//!
//! Local todo store and peer exchange demo.
//!
//! ## Commands
//!
//! - `add`: Create a todo item
//! - `list`: List stored items
//! - `complete`: Mark an item completed
//! - `delete`: Remove an item
//! - `demo`: Exchange items between two peers on a loopback network
//!
//! ## Example
//!
//! ```bash
//! todo-sync add "Buy milk"
//! todo-sync list
//! todo-sync complete 3f2a
//!
//! # Send every stored item from a host peer to a joining peer
//! todo-sync -v demo
//!
//! # Share a single item
//! todo-sync demo --id 3f2a
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;
mod config;

use commands::{add, complete, delete, demo, list};

/// Local todo store and peer exchange demo.
#[derive(Parser, Debug)]
#[command(name = "todo-sync")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Data directory holding the item store
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Exchange configuration file (default: <data-dir>/config.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a todo item
    Add {
        /// Item title
        title: String,
    },

    /// List stored items, oldest first
    List {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Mark an item completed
    Complete {
        /// Item id or a unique prefix of it
        id: String,
    },

    /// Remove an item
    Delete {
        /// Item id or a unique prefix of it
        id: String,
    },

    /// Exchange items between two peers on a loopback network
    Demo {
        /// Title to send (repeatable; default: every stored item)
        #[arg(long = "title", short)]
        titles: Vec<String>,

        /// Send only the stored item with this id or unique id prefix
        #[arg(long, conflicts_with = "titles")]
        id: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    // Determine data directory
    let data_dir = match cli.data_dir {
        Some(dir) => dir,
        None => default_data_dir()?,
    };

    tokio::fs::create_dir_all(&data_dir)
        .await
        .context("Failed to create data directory")?;

    match cli.command {
        Commands::Add { title } => {
            add::run(&data_dir, &title).await?;
        }
        Commands::List { json } => {
            list::run(&data_dir, json).await?;
        }
        Commands::Complete { id } => {
            complete::run(&data_dir, &id).await?;
        }
        Commands::Delete { id } => {
            delete::run(&data_dir, &id).await?;
        }
        Commands::Demo { titles, id } => {
            let config = config::load(&data_dir, cli.config.as_deref())?;
            let outgoing = match id {
                Some(prefix) => demo::Outgoing::Item(prefix),
                None if titles.is_empty() => demo::Outgoing::Stored,
                None => demo::Outgoing::Titles(titles),
            };
            demo::run(&data_dir, &config, outgoing).await?;
        }
    }

    Ok(())
}

/// Install the tracing subscriber. `RUST_LOG` applies unless `-v` is given.
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Get the default data directory for todo-sync.
fn default_data_dir() -> Result<PathBuf> {
    let dirs = directories::ProjectDirs::from("io", "todo-sync", "todo-sync")
        .context("Could not determine home directory")?;
    Ok(dirs.data_dir().to_path_buf())
}

/// Directory of the item store within the data directory.
pub(crate) fn items_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("items")
}

//! Exchange items between two peers on a loopback network.
//!
//! The host advertises; the joiner browses, invites the host, and applies
//! everything it receives to an in-memory store.

use anyhow::{Context, Result};
use std::path::Path;
use std::time::Duration;
use todo_sync_client::{
    Advertiser, ApplyOutcome, Browser, DiscoveryEvent, ExchangeConfig, ItemStore, LoopbackHub,
    MemoryStore, PeerSession, RecordApplier, TransferChannel,
};
use todo_sync_core::PeerEvent;
use todo_sync_types::TodoRecord;

use crate::commands::list::format_line;
use crate::config::{find, open_store};

const JOINER_NAME: &str = "todo-sync joiner";
const STEP_TIMEOUT: Duration = Duration::from_secs(5);

/// What the host sends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outgoing {
    /// Every stored item.
    Stored,
    /// The stored item matching an id prefix.
    Item(String),
    /// New records with these titles.
    Titles(Vec<String>),
}

/// Run the demo command.
pub async fn run(
    data_dir: &Path,
    config: &ExchangeConfig,
    outgoing: Outgoing,
) -> Result<Vec<TodoRecord>> {
    let records: Vec<TodoRecord> = match outgoing {
        Outgoing::Stored => open_store(data_dir).await?.load_all().await?,
        Outgoing::Item(prefix) => vec![find(&open_store(data_dir).await?, &prefix).await?],
        Outgoing::Titles(titles) => titles.iter().map(TodoRecord::new).collect(),
    };
    if records.is_empty() {
        println!("Nothing to send. Add items or pass --title.");
        return Ok(Vec::new());
    }

    let hub = LoopbackHub::new();
    let host = PeerSession::initialize(config, hub.transport())
        .await
        .context("Failed to start host session")?;
    let joiner_config = config.clone().with_display_name(JOINER_NAME);
    let joiner = PeerSession::initialize(&joiner_config, hub.transport())
        .await
        .context("Failed to start joiner session")?;

    let (host_channel, _host_received) =
        TransferChannel::open(host.clone(), config.receive_buffer);
    let (_joiner_channel, mut joiner_received) =
        TransferChannel::open(joiner.clone(), config.receive_buffer);
    let mut host_changes = host.subscribe();

    // Host advertises
    let advertiser = Advertiser::new(host.clone());
    advertiser.start().await?;
    println!("{} advertising on '{}'", host.identity(), host.service_type());

    // Joiner browses and invites
    let (mut browser, outcome) = Browser::start(joiner.clone()).await?;
    let host_id = host.identity().peer_id();
    loop {
        match tokio::time::timeout(STEP_TIMEOUT, browser.next_event())
            .await
            .context("Timed out browsing for host")?
        {
            Some(DiscoveryEvent::Found(peer)) if peer.peer_id() == host_id => {
                println!("{} found {}", joiner.identity(), peer);
                break;
            }
            Some(_) => continue,
            None => anyhow::bail!("Browsing ended before the host was found"),
        }
    }
    browser.invite(&host_id).await?;
    browser.finish().await?;
    tracing::debug!("Browser outcome: {:?}", outcome.await);

    while !host.is_connected() {
        let change = tokio::time::timeout(STEP_TIMEOUT, host_changes.recv())
            .await
            .context("Timed out waiting for connection")??;
        if change.event == PeerEvent::ConnectFailed {
            anyhow::bail!("{} declined the invitation", change.peer);
        }
    }
    println!("{} connected to {}", host.identity(), joiner.identity());

    // Host sends
    for record in &records {
        let report = host_channel.send(record).await?;
        println!(
            "Sent '{}' ({} bytes) to {} peer(s)",
            record.title,
            report.bytes,
            report.peers.len()
        );
    }

    // Joiner applies
    let applier = RecordApplier::new(MemoryStore::new(), config.duplicate_policy);
    for _ in 0..records.len() {
        let received = tokio::time::timeout(STEP_TIMEOUT, joiner_received.recv())
            .await
            .context("Timed out waiting for records")?
            .context("Receive channel closed")?;
        let applied = applier.apply(&received.record).await?;
        if applied == ApplyOutcome::Rejected {
            println!("Rejected duplicate '{}'", received.record.title);
        }
    }

    let stored = applier.store().load_all().await?;
    println!();
    println!("{} now has {} item(s):", joiner.identity(), stored.len());
    for record in &stored {
        println!("  {}", format_line(record));
    }

    advertiser.stop().await?;
    joiner.disconnect().await?;
    host.disconnect().await?;
    Ok(stored)
}

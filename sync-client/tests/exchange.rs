//! End-to-end exchange over the loopback network.
//!
//! Each test runs two or more full peers (session, advertiser or browser,
//! transfer channel) against one in-process hub.

use std::time::Duration;
use tokio::sync::mpsc;
use todo_sync_client::{
    Advertiser, ApplyOutcome, Browser, BrowserOutcome, DiscoveryEvent, ExchangeConfig,
    ExchangeError, ItemStore, LoopbackHub, LoopbackTransport, MemoryStore, PeerSession,
    PeerStateChange, ReceivedRecord, RecordApplier, SendMode, TransferChannel, Transport,
};
use todo_sync_core::{ConnectionState, DuplicatePolicy, PeerEvent};
use todo_sync_types::{PeerIdentity, TodoRecord};

const WAIT: Duration = Duration::from_secs(2);

struct Peer {
    session: PeerSession<LoopbackTransport>,
    channel: TransferChannel<LoopbackTransport>,
    received: mpsc::Receiver<ReceivedRecord>,
}

async fn peer(hub: &LoopbackHub, name: &str) -> Peer {
    let config = ExchangeConfig::default().with_display_name(name);
    let session = PeerSession::initialize(&config, hub.transport())
        .await
        .unwrap();
    let (channel, received) = TransferChannel::open(session.clone(), config.receive_buffer);
    Peer {
        session,
        channel,
        received,
    }
}

/// `host` advertises, `guest` browses for it and invites it.
async fn pair(host: &Peer, guest: &Peer) -> Advertiser<LoopbackTransport> {
    let advertiser = Advertiser::new(host.session.clone());
    advertiser.start().await.unwrap();

    let (mut browser, _outcome) = Browser::start(guest.session.clone()).await.unwrap();
    let host_id = host.session.identity().peer_id();
    loop {
        match tokio::time::timeout(WAIT, browser.next_event()).await.unwrap() {
            Some(DiscoveryEvent::Found(p)) if p.peer_id() == host_id => break,
            Some(_) => continue,
            None => panic!("discovery ended before host was found"),
        }
    }
    browser.invite(&host_id).await.unwrap();
    browser.finish().await.unwrap();
    advertiser
}

async fn recv(peer: &mut Peer) -> ReceivedRecord {
    tokio::time::timeout(WAIT, peer.received.recv())
        .await
        .expect("timed out waiting for record")
        .expect("channel closed")
}

async fn next_change(
    rx: &mut tokio::sync::broadcast::Receiver<PeerStateChange>,
) -> PeerStateChange {
    tokio::time::timeout(WAIT, rx.recv()).await.unwrap().unwrap()
}

// ===========================================
// Send / Receive
// ===========================================

#[tokio::test]
async fn buy_milk_reaches_connected_peer() {
    let hub = LoopbackHub::new();
    let a = peer(&hub, "Alice").await;
    let mut b = peer(&hub, "Bob").await;
    let _adv = pair(&b, &a).await;

    let record = TodoRecord::new("Buy milk");
    let report = a.channel.send(&record).await.unwrap();
    assert_eq!(report.peers, vec![b.session.identity().peer_id()]);

    let received = recv(&mut b).await;
    assert_eq!(received.record.title, "Buy milk");
    assert!(!received.record.completed);
    assert_eq!(received.record.identifier, record.identifier);
    assert_eq!(received.record.created_at, record.created_at);
    assert_eq!(received.from, *a.session.identity());
}

#[tokio::test]
async fn send_is_bidirectional() {
    let hub = LoopbackHub::new();
    let mut a = peer(&hub, "Alice").await;
    let mut b = peer(&hub, "Bob").await;
    let _adv = pair(&b, &a).await;

    b.channel.send(&TodoRecord::new("from bob")).await.unwrap();
    a.channel.send(&TodoRecord::new("from alice")).await.unwrap();

    assert_eq!(recv(&mut a).await.record.title, "from bob");
    assert_eq!(recv(&mut b).await.record.title, "from alice");
}

#[tokio::test]
async fn send_without_peers_fails() {
    let hub = LoopbackHub::new();
    let a = peer(&hub, "Alice").await;
    let _b = peer(&hub, "Bob").await;

    let result = a.channel.send(&TodoRecord::new("lonely")).await;
    assert!(matches!(result, Err(ExchangeError::NoConnectedPeers)));
    assert_eq!(a.channel.stats().sent(), 0);
}

#[tokio::test]
async fn one_send_reaches_every_connected_peer() {
    let hub = LoopbackHub::new();
    let host = peer(&hub, "Host").await;
    let mut guests = Vec::new();
    let mut advertisers = Vec::new();
    for name in ["G1", "G2", "G3"] {
        let guest = peer(&hub, name).await;
        advertisers.push(pair(&guest, &host).await);
        guests.push(guest);
    }
    assert_eq!(host.session.connected_peers().len(), 3);

    let record = TodoRecord::new("Team standup");
    let report = host.channel.send(&record).await.unwrap();
    assert_eq!(report.peers.len(), 3);
    assert_eq!(host.channel.stats().sent(), 1);

    for guest in &mut guests {
        assert_eq!(recv(guest).await.record, record);
    }
}

#[tokio::test]
async fn malformed_then_valid_delivers_only_valid() {
    let hub = LoopbackHub::new();
    let a = peer(&hub, "Alice").await;
    let mut b = peer(&hub, "Bob").await;
    let _adv = pair(&b, &a).await;
    let to_b = [b.session.identity().peer_id()];

    // Hand-crafted payloads straight onto the wire
    let bad = serde_json::json!({ "title": "no id", "completed": false });
    a.session
        .transport()
        .send(
            &serde_json::to_vec(&bad).unwrap(),
            &to_b,
            SendMode::Reliable,
        )
        .await
        .unwrap();
    a.channel.send(&TodoRecord::new("valid")).await.unwrap();

    assert_eq!(recv(&mut b).await.record.title, "valid");
    assert_eq!(b.channel.stats().malformed(), 1);
    assert_eq!(b.channel.stats().received(), 1);
    assert!(b.session.is_connected());
}

// ===========================================
// Connection Lifecycle
// ===========================================

#[tokio::test]
async fn invite_produces_connecting_then_connected() {
    let hub = LoopbackHub::new();
    let a = peer(&hub, "Alice").await;
    let b = peer(&hub, "Bob").await;
    let mut changes = a.session.subscribe();

    let _adv = pair(&b, &a).await;

    let first = next_change(&mut changes).await;
    let second = next_change(&mut changes).await;
    assert_eq!(first.to, ConnectionState::Connecting);
    assert_eq!(second.to, ConnectionState::Connected);
    assert_eq!(second.peer, *b.session.identity());
}

#[tokio::test]
async fn declined_invite_reports_not_connected() {
    let hub = LoopbackHub::new();
    let a = peer(&hub, "Alice").await;
    let config = ExchangeConfig::default().with_display_name("Shy");
    let shy = PeerSession::initialize(&config, hub.declining_transport())
        .await
        .unwrap();
    let adv = Advertiser::new(shy.clone());
    adv.start().await.unwrap();
    let mut changes = a.session.subscribe();

    let (mut browser, _outcome) = Browser::start(a.session.clone()).await.unwrap();
    tokio::time::timeout(WAIT, browser.next_event()).await.unwrap();
    browser.invite(&shy.identity().peer_id()).await.unwrap();

    assert_eq!(next_change(&mut changes).await.to, ConnectionState::Connecting);
    let failed = next_change(&mut changes).await;
    assert_eq!(failed.to, ConnectionState::NotConnected);
    assert_eq!(failed.event, PeerEvent::ConnectFailed);
    assert!(a.session.connected_peers().is_empty());
}

#[tokio::test]
async fn link_loss_disconnects_and_send_fails() {
    let hub = LoopbackHub::new();
    let a = peer(&hub, "Alice").await;
    let b = peer(&hub, "Bob").await;
    let _adv = pair(&b, &a).await;
    let mut changes = b.session.subscribe();

    hub.drop_link(&a.session.identity().peer_id(), &b.session.identity().peer_id());

    let lost = next_change(&mut changes).await;
    assert_eq!(lost.event, PeerEvent::Disconnected);
    assert!(!a.session.is_connected());
    assert!(matches!(
        a.channel.send(&TodoRecord::new("too late")).await,
        Err(ExchangeError::NoConnectedPeers)
    ));
}

#[tokio::test]
async fn disconnect_leaves_network() {
    let hub = LoopbackHub::new();
    let a = peer(&hub, "Alice").await;
    let b = peer(&hub, "Bob").await;
    let _adv = pair(&b, &a).await;
    assert_eq!(hub.node_count(), 2);

    a.session.disconnect().await.unwrap();

    assert_eq!(hub.node_count(), 1);
    assert!(!a.session.is_connected());
    assert!(!b.session.is_connected());
}

#[tokio::test]
async fn advertiser_stop_is_seen_by_browser() {
    let hub = LoopbackHub::new();
    let a = peer(&hub, "Alice").await;
    let b = peer(&hub, "Bob").await;
    let adv = Advertiser::new(b.session.clone());
    adv.start().await.unwrap();

    let (mut browser, outcome) = Browser::start(a.session.clone()).await.unwrap();
    let found = tokio::time::timeout(WAIT, browser.next_event()).await.unwrap();
    assert_eq!(found, Some(DiscoveryEvent::Found(b.session.identity().clone())));

    adv.stop().await.unwrap();
    let lost = tokio::time::timeout(WAIT, browser.next_event()).await.unwrap();
    assert_eq!(lost, Some(DiscoveryEvent::Lost(b.session.identity().peer_id())));
    assert!(browser.peers().is_empty());

    browser.cancel().await.unwrap();
    assert_eq!(outcome.await.unwrap(), BrowserOutcome::Cancelled);
}

// ===========================================
// Duplicate Handling
// ===========================================

async fn apply_twice(policy: DuplicatePolicy) -> (Vec<ApplyOutcome>, TodoRecord) {
    let hub = LoopbackHub::new();
    let a = peer(&hub, "Alice").await;
    let mut b = peer(&hub, "Bob").await;
    let _adv = pair(&b, &a).await;
    let applier = RecordApplier::new(MemoryStore::new(), policy);

    let mut record = TodoRecord::new("Buy milk");
    a.channel.send(&record).await.unwrap();
    record.mark_completed();
    a.channel.send(&record).await.unwrap();

    let mut outcomes = Vec::new();
    for _ in 0..2 {
        let received = recv(&mut b).await;
        outcomes.push(applier.apply(&received.record).await.unwrap());
    }
    let stored = applier
        .store()
        .load(&record.key())
        .await
        .unwrap()
        .unwrap();
    (outcomes, stored)
}

#[tokio::test]
async fn upsert_policy_keeps_latest() {
    let (outcomes, stored) = apply_twice(DuplicatePolicy::Upsert).await;
    assert_eq!(outcomes, vec![ApplyOutcome::Inserted, ApplyOutcome::Replaced]);
    assert!(stored.completed);
}

#[tokio::test]
async fn reject_policy_keeps_first() {
    let (outcomes, stored) = apply_twice(DuplicatePolicy::RejectDuplicate).await;
    assert_eq!(outcomes, vec![ApplyOutcome::Inserted, ApplyOutcome::Rejected]);
    assert!(!stored.completed);
}

#[tokio::test]
async fn duplicate_identity_cannot_join() {
    let hub = LoopbackHub::new();
    let identity = PeerIdentity::new("Twin").unwrap();
    PeerSession::with_identity(identity.clone(), Default::default(), hub.transport())
        .await
        .unwrap();

    let result = PeerSession::with_identity(identity, Default::default(), hub.transport()).await;
    assert!(matches!(
        result,
        Err(ExchangeError::TransportUnavailable(_))
    ));
}

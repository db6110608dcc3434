//! TransferChannel - moves todo records between connected peers.
//!
//! # Architecture
//!
//! ```text
//! send(record) ──encode──► Transport::send(all connected, Reliable)
//!
//! SessionDelegate::data_received ──► inbound queue ──► decoder task
//!                                      │                 │
//!                          full: warn + drop   malformed: warn + drop
//!                                                        ▼
//!                                         mpsc::Receiver<ReceivedRecord>
//! ```
//!
//! The decoder runs on its own task so the transport's callback never waits
//! on the application. If the application stops draining, the inbound queue
//! fills to [`INBOUND_QUEUE_CAPACITY`] and further messages are dropped.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use todo_sync_types::{PeerId, PeerIdentity, TodoRecord};

use crate::error::ExchangeError;
use crate::session::{InboundPayload, PeerSession};
use crate::transport::{SendMode, Transport};

/// Undecoded messages held while the decoder is waiting on the application.
pub const INBOUND_QUEUE_CAPACITY: usize = 1024;

/// A record decoded from a peer's message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedRecord {
    /// Sending peer.
    pub from: PeerIdentity,
    /// Decoded record.
    pub record: TodoRecord,
}

/// What a successful send reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendReport {
    /// Peers the record was addressed to.
    pub peers: Vec<PeerId>,
    /// Encoded size in bytes.
    pub bytes: usize,
}

/// Counters for a channel.
#[derive(Debug, Default)]
pub struct ChannelStats {
    sent: AtomicU64,
    received: AtomicU64,
    malformed: AtomicU64,
    overflowed: Arc<AtomicU64>,
}

impl ChannelStats {
    /// Records sent successfully.
    pub fn sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    /// Records decoded and delivered.
    pub fn received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }

    /// Inbound messages dropped as undecodable.
    pub fn malformed(&self) -> u64 {
        self.malformed.load(Ordering::Relaxed)
    }

    /// Inbound messages dropped because the receive queue was full.
    pub fn overflowed(&self) -> u64 {
        self.overflowed.load(Ordering::Relaxed)
    }
}

/// Sends and receives [`TodoRecord`]s over a session.
pub struct TransferChannel<T: Transport> {
    session: PeerSession<T>,
    stats: Arc<ChannelStats>,
    decoder: JoinHandle<()>,
}

impl<T: Transport> TransferChannel<T> {
    /// Register as the session's receive handler and start decoding.
    ///
    /// Decoded records are delivered on the returned receiver, which holds
    /// at most `capacity` undelivered records before the decoder waits.
    /// Must be called from within a tokio runtime.
    pub fn open(
        session: PeerSession<T>,
        capacity: usize,
    ) -> (Self, mpsc::Receiver<ReceivedRecord>) {
        let stats = Arc::new(ChannelStats::default());
        let inbound = session.register_receiver(INBOUND_QUEUE_CAPACITY, stats.overflowed.clone());
        let (tx, rx) = mpsc::channel(capacity.max(1));

        let decoder = tokio::spawn(run_decoder(inbound, tx, stats.clone()));

        (
            Self {
                session,
                stats,
                decoder,
            },
            rx,
        )
    }

    /// Send `record` to every connected peer with reliable delivery.
    ///
    /// # Errors
    ///
    /// - `NoConnectedPeers` if nobody is connected; nothing is sent.
    /// - `Encode` if the record cannot be serialized.
    /// - `SendRejected` if the transport refuses the message.
    pub async fn send(&self, record: &TodoRecord) -> Result<SendReport, ExchangeError> {
        let peers: Vec<PeerId> = self
            .session
            .connected_peers()
            .iter()
            .map(|p| p.peer_id())
            .collect();
        if peers.is_empty() {
            tracing::debug!("Not sending {}: no connected peers", record.identifier);
            return Err(ExchangeError::NoConnectedPeers);
        }

        let data = record.to_bytes().map_err(ExchangeError::Encode)?;

        self.session
            .transport()
            .send(&data, &peers, SendMode::Reliable)
            .await
            .map_err(|e| {
                tracing::warn!("Send of {} rejected: {}", record.identifier, e);
                ExchangeError::SendRejected(e)
            })?;

        self.stats.sent.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(
            "Sent {} ({} bytes) to {} peer(s)",
            record.identifier,
            data.len(),
            peers.len()
        );

        Ok(SendReport {
            bytes: data.len(),
            peers,
        })
    }

    /// Channel counters.
    pub fn stats(&self) -> &ChannelStats {
        &self.stats
    }

    /// The session this channel sends over.
    pub fn session(&self) -> &PeerSession<T> {
        &self.session
    }
}

impl<T: Transport> Drop for TransferChannel<T> {
    fn drop(&mut self) {
        self.decoder.abort();
    }
}

/// Decode one inbound message.
pub fn decode_inbound(data: &[u8]) -> Result<TodoRecord, ExchangeError> {
    TodoRecord::from_bytes(data).map_err(ExchangeError::DecodeFailure)
}

async fn run_decoder(
    mut inbound: mpsc::Receiver<InboundPayload>,
    out: mpsc::Sender<ReceivedRecord>,
    stats: Arc<ChannelStats>,
) {
    while let Some(payload) = inbound.recv().await {
        let record = match decode_inbound(&payload.data) {
            Ok(record) => record,
            Err(e) => {
                stats.malformed.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    "Dropping {} byte message from {}: {}",
                    payload.data.len(),
                    payload.from,
                    e
                );
                continue;
            }
        };

        tracing::debug!("Received {} from {}", record.identifier, payload.from);
        stats.received.fetch_add(1, Ordering::Relaxed);
        if out
            .send(ReceivedRecord {
                from: payload.from,
                record,
            })
            .await
            .is_err()
        {
            tracing::debug!("Record receiver closed; decoder stopping");
            break;
        }
    }
}

//! # sync-client
//!
//! Peer-to-peer todo item exchange for todo-sync.
//!
//! Applications use this crate to join a local session, find nearby peers
//! and trade [`TodoRecord`](todo_sync_types::TodoRecord)s with them.
//!
//! ## Features
//!
//! - **Session**: Local identity and connected-peer tracking ([`PeerSession`])
//! - **Discovery**: Advertise ([`Advertiser`]) and browse/invite ([`Browser`])
//! - **Transfer**: Send to every connected peer, decode inbound ([`TransferChannel`])
//! - **Storage**: Keyed record stores with duplicate handling ([`ItemStore`])
//! - **Transport Abstraction**: Pluggable transport layer (loopback, mock)
//! - **Pure State Machine**: Uses sync-core for side-effect-free logic
//!
//! ## Example
//!
//! ```ignore
//! use todo_sync_client::{ExchangeConfig, LoopbackHub, PeerSession, TransferChannel};
//!
//! let hub = LoopbackHub::new();
//! let session = PeerSession::initialize(&ExchangeConfig::default(), hub.transport()).await?;
//! let (channel, mut received) = TransferChannel::open(session.clone(), 64);
//!
//! channel.send(&TodoRecord::new("Buy milk")).await?;
//! while let Some(item) = received.recv().await {
//!     println!("{} sent {}", item.from, item.record.title);
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod advertiser;
pub mod browser;
pub mod channel;
pub mod config;
pub mod error;
pub mod session;
pub mod store;
pub mod transport;

pub use advertiser::Advertiser;
pub use browser::{Browser, BrowserOutcome};
pub use channel::{
    decode_inbound, ChannelStats, ReceivedRecord, SendReport, TransferChannel,
    INBOUND_QUEUE_CAPACITY,
};
pub use config::{ConfigError, ExchangeConfig};
pub use error::ExchangeError;
pub use session::{InboundPayload, PeerSession, PeerStateChange};
pub use store::{ApplyOutcome, ItemStore, JsonFileStore, MemoryStore, RecordApplier, StoreError};
pub use transport::{
    DiscoveryEvent, EncryptionPreference, LoopbackHub, LoopbackTransport, MockTransport,
    ResourceEvent, SendMode, SentMessage, SessionDelegate, Transport, TransportError,
};

//! In-process loopback network.
//!
//! A [`LoopbackHub`] stands in for the local radio: every
//! [`LoopbackTransport`] created from the same hub can discover, connect to
//! and message the others. Advertising peers accept every invitation.
//!
//! Delegate callbacks are made after the hub lock is released, in the order
//! the hub produced them. Callback batches from different operations never
//! interleave, so a peer never sees data after it was reported
//! `NotConnected`. Delegates must not call back into the hub.

use super::{
    DiscoveryEvent, EncryptionPreference, SendMode, SessionDelegate, Transport, TransportError,
};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use todo_sync_core::ConnectionState;
use todo_sync_types::{PeerId, PeerIdentity, ServiceType};

/// Shared in-memory network.
#[derive(Clone, Default)]
pub struct LoopbackHub {
    inner: Arc<Mutex<HubInner>>,
    // Held from state change until its callbacks have run
    dispatch: Arc<Mutex<()>>,
}

#[derive(Default)]
struct HubInner {
    nodes: HashMap<PeerId, Node>,
    links: HashSet<Link>,
}

struct Node {
    identity: PeerIdentity,
    delegate: Arc<dyn SessionDelegate>,
    advertising: Option<ServiceType>,
    browser: Option<(ServiceType, mpsc::UnboundedSender<DiscoveryEvent>)>,
    accepts_invitations: bool,
}

/// Unordered pair of linked peers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct Link(PeerId, PeerId);

impl Link {
    fn new(a: PeerId, b: PeerId) -> Self {
        if a <= b {
            Self(a, b)
        } else {
            Self(b, a)
        }
    }

    fn other(&self, id: &PeerId) -> Option<PeerId> {
        if self.0 == *id {
            Some(self.1)
        } else if self.1 == *id {
            Some(self.0)
        } else {
            None
        }
    }
}

/// A delegate call deferred until the hub lock is released.
enum Callback {
    State(Arc<dyn SessionDelegate>, PeerIdentity, ConnectionState),
    Data(Arc<dyn SessionDelegate>, Vec<u8>, PeerIdentity),
}

fn dispatch(callbacks: Vec<Callback>) {
    for callback in callbacks {
        match callback {
            Callback::State(delegate, peer, state) => delegate.peer_state_changed(&peer, state),
            Callback::Data(delegate, data, from) => delegate.data_received(data, &from),
        }
    }
}

impl HubInner {
    fn node(&self, id: &PeerId) -> Result<&Node, TransportError> {
        self.nodes.get(id).ok_or(TransportError::NotOpen)
    }

    /// Notify every browser of `service` except `except`.
    fn announce(&self, service: &ServiceType, except: &PeerId, event: DiscoveryEvent) {
        for (id, node) in &self.nodes {
            if id == except {
                continue;
            }
            if let Some((browsed, tx)) = &node.browser {
                if browsed == service {
                    let _ = tx.send(event.clone());
                }
            }
        }
    }

    /// Report `state` to both ends of the pair.
    fn report_pair(&self, a: &PeerId, b: &PeerId, state: ConnectionState, out: &mut Vec<Callback>) {
        if let (Some(na), Some(nb)) = (self.nodes.get(a), self.nodes.get(b)) {
            out.push(Callback::State(na.delegate.clone(), nb.identity.clone(), state));
            out.push(Callback::State(nb.delegate.clone(), na.identity.clone(), state));
        }
    }

    fn drop_links_of(&mut self, id: &PeerId, out: &mut Vec<Callback>) {
        let dropped: Vec<Link> = self
            .links
            .iter()
            .filter(|l| l.other(id).is_some())
            .copied()
            .collect();
        for link in dropped {
            self.links.remove(&link);
            self.report_pair(&link.0, &link.1, ConnectionState::NotConnected, out);
        }
    }
}

impl LoopbackHub {
    /// Create an empty network.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HubInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `op` under the hub lock, then deliver the callbacks it queued.
    fn update<R>(
        &self,
        op: impl FnOnce(&mut HubInner, &mut Vec<Callback>) -> Result<R, TransportError>,
    ) -> Result<R, TransportError> {
        let _dispatching = self
            .dispatch
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let mut callbacks = Vec::new();
        let result = op(&mut self.lock(), &mut callbacks);
        dispatch(callbacks);
        result
    }

    /// Create a transport attached to this network that accepts invitations.
    pub fn transport(&self) -> LoopbackTransport {
        LoopbackTransport {
            hub: self.clone(),
            attachment: Mutex::new(Attachment::Detached),
            accepts_invitations: true,
        }
    }

    /// Create a transport that declines every invitation it receives.
    pub fn declining_transport(&self) -> LoopbackTransport {
        LoopbackTransport {
            accepts_invitations: false,
            ..self.transport()
        }
    }

    /// Sever the link between two peers, as if they walked out of range.
    pub fn drop_link(&self, a: &PeerId, b: &PeerId) {
        let _ = self.update(|hub, callbacks| {
            if hub.links.remove(&Link::new(*a, *b)) {
                hub.report_pair(a, b, ConnectionState::NotConnected, callbacks);
            }
            Ok(())
        });
    }

    /// Number of peers with an open session.
    pub fn node_count(&self) -> usize {
        self.lock().nodes.len()
    }
}

/// One peer's attachment to a [`LoopbackHub`].
pub struct LoopbackTransport {
    hub: LoopbackHub,
    attachment: Mutex<Attachment>,
    accepts_invitations: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Attachment {
    Detached,
    Open(PeerId),
    Closed,
}

impl LoopbackTransport {
    fn attachment(&self) -> MutexGuard<'_, Attachment> {
        self.attachment
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn local_id(&self) -> Result<PeerId, TransportError> {
        match *self.attachment() {
            Attachment::Open(id) => Ok(id),
            Attachment::Detached => Err(TransportError::NotOpen),
            Attachment::Closed => Err(TransportError::Closed),
        }
    }
}

#[async_trait]
impl Transport for LoopbackTransport {
    async fn open_session(
        &self,
        local: &PeerIdentity,
        _encryption: EncryptionPreference,
        delegate: Arc<dyn SessionDelegate>,
    ) -> Result<(), TransportError> {
        let mut slot = self.attachment();
        if let Attachment::Open(_) = *slot {
            return Err(TransportError::Unavailable("session already open".into()));
        }

        let mut hub = self.hub.lock();
        if hub.nodes.contains_key(&local.peer_id()) {
            return Err(TransportError::Unavailable(format!(
                "peer id {} already on this network",
                local.peer_id()
            )));
        }
        hub.nodes.insert(
            local.peer_id(),
            Node {
                identity: local.clone(),
                delegate,
                advertising: None,
                browser: None,
                accepts_invitations: self.accepts_invitations,
            },
        );
        *slot = Attachment::Open(local.peer_id());
        Ok(())
    }

    async fn start_advertising(&self, service: &ServiceType) -> Result<(), TransportError> {
        let id = self.local_id()?;
        let mut hub = self.hub.lock();
        let identity = {
            let node = hub.nodes.get_mut(&id).ok_or(TransportError::NotOpen)?;
            node.advertising = Some(service.clone());
            node.identity.clone()
        };
        hub.announce(service, &id, DiscoveryEvent::Found(identity));
        Ok(())
    }

    async fn stop_advertising(&self) -> Result<(), TransportError> {
        let id = self.local_id()?;
        let mut hub = self.hub.lock();
        let previous = match hub.nodes.get_mut(&id) {
            Some(node) => node.advertising.take(),
            None => None,
        };
        if let Some(service) = previous {
            hub.announce(&service, &id, DiscoveryEvent::Lost(id));
        }
        Ok(())
    }

    async fn start_browsing(
        &self,
        service: &ServiceType,
    ) -> Result<mpsc::UnboundedReceiver<DiscoveryEvent>, TransportError> {
        let id = self.local_id()?;
        let mut hub = self.hub.lock();
        let (tx, rx) = mpsc::unbounded_channel();

        for (other, node) in &hub.nodes {
            if *other != id && node.advertising.as_ref() == Some(service) {
                let _ = tx.send(DiscoveryEvent::Found(node.identity.clone()));
            }
        }

        let node = hub.nodes.get_mut(&id).ok_or(TransportError::NotOpen)?;
        node.browser = Some((service.clone(), tx));
        Ok(rx)
    }

    fn stop_browsing(&self) -> Result<(), TransportError> {
        let id = self.local_id()?;
        if let Some(node) = self.hub.lock().nodes.get_mut(&id) {
            node.browser = None;
        }
        Ok(())
    }

    async fn connect(&self, peer: &PeerIdentity) -> Result<(), TransportError> {
        let id = self.local_id()?;
        let target = peer.peer_id();
        self.hub.update(|hub, callbacks| {
            hub.node(&id)?;
            let accepted = match hub.nodes.get(&target) {
                Some(node) => node.advertising.is_some() && node.accepts_invitations,
                None => {
                    return Err(TransportError::ConnectFailed(format!(
                        "{} is not reachable",
                        peer.display_name()
                    )))
                }
            };

            let link = Link::new(id, target);
            if target == id || hub.links.contains(&link) {
                return Ok(());
            }

            hub.report_pair(&id, &target, ConnectionState::Connecting, callbacks);
            if accepted {
                hub.links.insert(link);
                hub.report_pair(&id, &target, ConnectionState::Connected, callbacks);
            } else {
                hub.report_pair(&id, &target, ConnectionState::NotConnected, callbacks);
            }
            Ok(())
        })
    }

    async fn send(
        &self,
        data: &[u8],
        peers: &[PeerId],
        _mode: SendMode,
    ) -> Result<(), TransportError> {
        let id = self.local_id()?;
        self.hub.update(|hub, callbacks| {
            let from = hub.node(&id)?.identity.clone();

            // All-or-nothing: refuse before delivering anything
            for peer in peers {
                if !hub.links.contains(&Link::new(id, *peer)) {
                    return Err(TransportError::SendFailed(format!(
                        "peer {peer} is not connected"
                    )));
                }
            }

            for peer in peers {
                let node = hub.node(peer)?;
                callbacks.push(Callback::Data(
                    node.delegate.clone(),
                    data.to_vec(),
                    from.clone(),
                ));
            }
            Ok(())
        })
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        let id = {
            let mut slot = self.attachment();
            match *slot {
                Attachment::Open(id) => {
                    *slot = Attachment::Closed;
                    id
                }
                Attachment::Detached | Attachment::Closed => return Ok(()),
            }
        };

        self.hub.update(|hub, callbacks| {
            hub.drop_links_of(&id, callbacks);
            if let Some(node) = hub.nodes.remove(&id) {
                if let Some(service) = node.advertising {
                    hub.announce(&service, &id, DiscoveryEvent::Lost(id));
                }
            }
            Ok(())
        })
    }
}

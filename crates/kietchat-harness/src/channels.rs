//! Channel-backed links between simulated nodes
//!
//! Every node owns an unbounded inbox of [`TransportEvent`]s. The
//! [`Switchboard`] records which inboxes are linked, and a node's
//! [`ChannelTransport`] pushes payloads into its neighbours' inboxes.
//! Sends never block; a missing link is reported back into the sender's own
//! inbox as [`TransportEvent::SendFailed`].

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use kietchat_core::{EndpointId, MeshTransport, TransportError, TransportEvent};
use smallvec::SmallVec;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::debug;

pub type InboxSender = UnboundedSender<TransportEvent>;
pub type InboxReceiver = UnboundedReceiver<TransportEvent>;

pub fn create_inbox() -> (InboxSender, InboxReceiver) {
    mpsc::unbounded_channel()
}

// ----------------------------------------------------------------------------
// In-Flight Tracking
// ----------------------------------------------------------------------------

/// Count of events queued in any inbox but not yet handled
#[derive(Debug, Clone, Default)]
pub struct InFlight(Arc<AtomicUsize>);

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    pub fn decrement(&self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

// ----------------------------------------------------------------------------
// Switchboard
// ----------------------------------------------------------------------------

#[derive(Debug)]
struct Port {
    inbox: InboxSender,
    neighbours: BTreeSet<EndpointId>,
}

#[derive(Debug, Default)]
struct Ports(HashMap<EndpointId, Port>);

/// Shared wiring between simulated nodes
#[derive(Debug, Clone, Default)]
pub struct Switchboard {
    ports: Arc<Mutex<Ports>>,
    in_flight: InFlight,
}

impl Switchboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn in_flight(&self) -> &InFlight {
        &self.in_flight
    }

    fn lock(&self) -> MutexGuard<'_, Ports> {
        self.ports.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Attach an inbox for `endpoint`
    pub fn register(&self, endpoint: EndpointId, inbox: InboxSender) {
        self.lock().0.insert(
            endpoint,
            Port {
                inbox,
                neighbours: BTreeSet::new(),
            },
        );
    }

    /// Queue an event into `endpoint`'s inbox
    pub fn deliver(&self, endpoint: &EndpointId, event: TransportEvent) -> bool {
        let ports = self.lock();
        Self::deliver_locked(&ports, &self.in_flight, endpoint, event)
    }

    fn deliver_locked(
        ports: &Ports,
        in_flight: &InFlight,
        endpoint: &EndpointId,
        event: TransportEvent,
    ) -> bool {
        let Some(port) = ports.0.get(endpoint) else {
            return false;
        };
        in_flight.increment();
        if port.inbox.send(event).is_err() {
            in_flight.decrement();
            return false;
        }
        true
    }

    /// Link two endpoints; returns false if either is unknown or already linked
    pub fn link(&self, a: &EndpointId, b: &EndpointId) -> bool {
        let mut ports = self.lock();
        if a == b || !ports.0.contains_key(a) || !ports.0.contains_key(b) {
            return false;
        }

        let mut added = false;
        if let Some(port) = ports.0.get_mut(a) {
            added |= port.neighbours.insert(b.clone());
        }
        if let Some(port) = ports.0.get_mut(b) {
            added |= port.neighbours.insert(a.clone());
        }
        added
    }

    /// Remove the link between two endpoints; returns false if there was none
    pub fn unlink(&self, a: &EndpointId, b: &EndpointId) -> bool {
        let mut ports = self.lock();
        let mut removed = false;
        if let Some(port) = ports.0.get_mut(a) {
            removed |= port.neighbours.remove(b);
        }
        if let Some(port) = ports.0.get_mut(b) {
            removed |= port.neighbours.remove(a);
        }
        removed
    }

    pub fn neighbours(&self, endpoint: &EndpointId) -> SmallVec<[EndpointId; 8]> {
        self.lock()
            .0
            .get(endpoint)
            .map(|port| port.neighbours.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn is_linked(&self, a: &EndpointId, b: &EndpointId) -> bool {
        self.lock()
            .0
            .get(a)
            .is_some_and(|port| port.neighbours.contains(b))
    }
}

// ----------------------------------------------------------------------------
// Channel Transport
// ----------------------------------------------------------------------------

/// [`MeshTransport`] for one simulated node
#[derive(Debug, Clone)]
pub struct ChannelTransport {
    local: EndpointId,
    switchboard: Switchboard,
}

impl ChannelTransport {
    pub fn new(local: EndpointId, switchboard: Switchboard) -> Self {
        Self { local, switchboard }
    }

    pub fn local_endpoint(&self) -> &EndpointId {
        &self.local
    }

    fn report_failure(&self, peer: Option<&EndpointId>, error: TransportError) {
        debug!("{} send failed: {}", self.local, error);
        self.switchboard.deliver(
            &self.local,
            TransportEvent::SendFailed {
                peer: peer.cloned(),
                error,
            },
        );
    }
}

impl MeshTransport for ChannelTransport {
    fn send_to_peer(&self, peer: &EndpointId, payload: &[u8]) {
        let failure = {
            let ports = self.switchboard.lock();
            let linked = ports
                .0
                .get(&self.local)
                .is_some_and(|port| port.neighbours.contains(peer));
            if !linked {
                Some(TransportError::PeerNotConnected { peer: peer.clone() })
            } else if !Switchboard::deliver_locked(
                &ports,
                &self.switchboard.in_flight,
                peer,
                TransportEvent::BytesReceived {
                    peer: self.local.clone(),
                    payload: payload.to_vec(),
                },
            ) {
                Some(TransportError::send_failed(peer.clone(), "inbox closed"))
            } else {
                None
            }
        };

        if let Some(error) = failure {
            self.report_failure(Some(peer), error);
        }
    }

    fn send_to_all_except(&self, exclude: Option<&EndpointId>, payload: &[u8]) {
        let failed: Vec<EndpointId> = {
            let ports = self.switchboard.lock();
            let Some(port) = ports.0.get(&self.local) else {
                return;
            };

            port.neighbours
                .iter()
                .filter(|neighbour| Some(*neighbour) != exclude)
                .filter(|neighbour| {
                    !Switchboard::deliver_locked(
                        &ports,
                        &self.switchboard.in_flight,
                        neighbour,
                        TransportEvent::BytesReceived {
                            peer: self.local.clone(),
                            payload: payload.to_vec(),
                        },
                    )
                })
                .cloned()
                .collect()
        };

        for neighbour in failed {
            let error = TransportError::send_failed(neighbour.clone(), "inbox closed");
            self.report_failure(Some(&neighbour), error);
        }
    }

    fn connected_peers(&self) -> SmallVec<[EndpointId; 8]> {
        self.switchboard.neighbours(&self.local)
    }
}

//! Message deduplication and relay engine
//!
//! The engine accepts inbound payloads from a [`MeshTransport`], suppresses
//! duplicates by (source, sequence), relays new envelopes onward in a flood
//! mesh, and publishes accepted messages to observers.
//!
//! Every entry point runs under one mutex, so the dedup check and insert are
//! atomic across concurrent transport workers and local sends. Observer events
//! are queued on unbounded channels inside the critical section; transport
//! calls are issued after it is released.

use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::composer::OutboundComposer;
use crate::config::{MeshConfig, RelayTopology};
use crate::envelope::MessageEnvelope;
use crate::errors::{DecodeError, MeshError, Result, TransportError};
use crate::events::{AcceptedMessage, ChatEvent, EventBus, Subscription, SubscriptionId};
use crate::log::{LogEntry, MessageLog, MessageOrigin};
use crate::node::LocalNode;
use crate::registry::{PeerRecord, PeerRegistry};
use crate::seen::{SeenSet, SeenSetStats};
use crate::transport::{MeshTransport, TransportEvent};
use crate::types::{DedupKey, EndpointId, NodeAddress, Timestamp};
use crate::wire::WireFormat;

// ----------------------------------------------------------------------------
// Outcomes and Statistics
// ----------------------------------------------------------------------------

/// What the engine did with an inbound payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundOutcome {
    /// New envelope: logged and published
    Delivered { relayed: bool },
    /// Already seen: dropped without relay or notification
    Duplicate,
}

impl InboundOutcome {
    pub fn was_relayed(&self) -> bool {
        matches!(self, InboundOutcome::Delivered { relayed: true })
    }
}

/// Counters kept by the relay engine
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineStats {
    /// Inbound envelopes surfaced to observers
    pub messages_accepted: u64,
    /// Local envelopes handed to the transport
    pub local_sends: u64,
    /// Inbound envelopes dropped as duplicates
    pub duplicates_suppressed: u64,
    /// Fan-outs issued on behalf of other nodes
    pub relays: u64,
    /// Malformed inbound payloads
    pub decode_failures: u64,
    /// Local sends with no route
    pub send_failures: u64,
    /// Failures reported by the transport
    pub transport_failures: u64,
    /// Seen-set counters at the time of the snapshot
    pub seen: SeenSetStats,
}

enum Route {
    Everyone,
    Peer(EndpointId),
    LocalOnly,
}

// ----------------------------------------------------------------------------
// Engine State
// ----------------------------------------------------------------------------

struct EngineState {
    seen: SeenSet,
    registry: PeerRegistry,
    log: MessageLog,
    bus: EventBus,
    composer: OutboundComposer,
    stats: EngineStats,
}

impl EngineState {
    /// Register `endpoint` on first sight, announcing it to observers
    fn register(&mut self, endpoint: &EndpointId) {
        if self.registry.on_peer_connected(endpoint) {
            let display_name = self.registry.display_name_of(endpoint);
            info!("Peer {} connected as {}", endpoint, display_name);
            self.bus.publish(ChatEvent::PeerJoined {
                endpoint: endpoint.clone(),
                display_name,
            });
        }
    }
}

// ----------------------------------------------------------------------------
// Relay Engine
// ----------------------------------------------------------------------------

pub struct RelayEngine<T: MeshTransport> {
    transport: T,
    local_node: LocalNode,
    topology: RelayTopology,
    max_payload_size: usize,
    self_display_name: String,
    state: Mutex<EngineState>,
}

impl<T: MeshTransport> RelayEngine<T> {
    /// Create an engine drawing names and sequences from the OS RNG
    pub fn new(config: MeshConfig, local_node: LocalNode, transport: T) -> Result<Self> {
        let registry = PeerRegistry::new(config.naming, config.reconnect);
        Self::with_parts(config, local_node, transport, registry, OutboundComposer::new())
    }

    /// Create an engine with a caller-supplied registry and composer
    pub fn with_parts(
        config: MeshConfig,
        local_node: LocalNode,
        transport: T,
        registry: PeerRegistry,
        composer: OutboundComposer,
    ) -> Result<Self> {
        config.validate()?;

        if local_node.address.is_broadcast() {
            return Err(MeshError::config_error(
                "local node address cannot be the broadcast sentinel",
            ));
        }

        Ok(Self {
            transport,
            local_node,
            topology: config.topology,
            max_payload_size: config.max_payload_size,
            self_display_name: config.self_display_name,
            state: Mutex::new(EngineState {
                seen: SeenSet::new(config.seen_capacity),
                registry,
                log: MessageLog::new(),
                bus: EventBus::new(),
                composer,
                stats: EngineStats::default(),
            }),
        })
    }

    fn lock_state(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn decode(&self, payload: &[u8]) -> core::result::Result<MessageEnvelope, DecodeError> {
        if payload.len() > self.max_payload_size {
            return Err(DecodeError::PayloadTooLarge {
                max: self.max_payload_size,
                actual: payload.len(),
            });
        }
        WireFormat::decode(payload)
    }

    // ------------------------------------------------------------------------
    // Inbound
    // ------------------------------------------------------------------------

    /// Handle raw bytes received from a directly connected peer
    ///
    /// An unregistered sender is named only if the transport still lists it
    /// as connected; bytes that outlive their link are shown as
    /// [`UNKNOWN_PEER_NAME`](crate::registry::UNKNOWN_PEER_NAME).
    pub fn on_inbound_bytes(&self, sender: &EndpointId, payload: &[u8]) -> Result<InboundOutcome> {
        let linked = self.transport.connected_peers().contains(sender);

        let relayed = {
            let mut state = self.lock_state();
            if linked {
                state.register(sender);
            }

            let envelope = match self.decode(payload) {
                Ok(envelope) => envelope,
                Err(err) => {
                    state.stats.decode_failures += 1;
                    let display_name = state.registry.display_name_of(sender);
                    warn!("Dropping malformed payload from {}: {}", sender, err);
                    state.bus.publish(ChatEvent::PayloadRejected {
                        endpoint: sender.clone(),
                        display_name,
                        reason: err.to_string(),
                    });
                    return Err(err.into());
                }
            };

            let key = envelope.dedup_key();
            if state.seen.check_and_add(key) {
                state.stats.duplicates_suppressed += 1;
                debug!("Suppressed duplicate {} from {}", key, sender);
                return Ok(InboundOutcome::Duplicate);
            }

            let display_name = state.registry.display_name_of(sender);
            state.stats.messages_accepted += 1;
            state.bus.publish(ChatEvent::MessageAccepted(AcceptedMessage {
                display_name: display_name.clone(),
                text: envelope.text().to_string(),
                self_originated: false,
                source: envelope.source(),
                destination: envelope.destination(),
                sequence: envelope.sequence(),
            }));
            state.log.append(LogEntry {
                envelope,
                sender: display_name,
                origin: MessageOrigin::Remote {
                    endpoint: sender.clone(),
                },
                accepted_at: Timestamp::now(),
            });

            let relayed = self.topology.relays();
            if relayed {
                state.stats.relays += 1;
                debug!("Relaying {} to all peers except {}", key, sender);
            }

            relayed
        };

        if relayed {
            self.transport.send_to_all_except(Some(sender), payload);
        }

        Ok(InboundOutcome::Delivered { relayed })
    }

    // ------------------------------------------------------------------------
    // Outbound
    // ------------------------------------------------------------------------

    /// Deliver a locally composed envelope
    pub fn on_local_send(&self, envelope: MessageEnvelope) -> Result<()> {
        let bytes = WireFormat::encode(&envelope)?;
        if bytes.len() > self.max_payload_size {
            return Err(MeshError::MessageTooLarge {
                size: bytes.len(),
                max: self.max_payload_size,
            });
        }

        let route = {
            let mut state = self.lock_state();

            let key = envelope.dedup_key();
            if state.seen.check_and_add(key) {
                return Err(MeshError::DuplicateEnvelope {
                    source_address: key.source,
                    sequence: key.sequence,
                });
            }

            state.stats.local_sends += 1;
            state.bus.publish(ChatEvent::MessageAccepted(AcceptedMessage {
                display_name: self.self_display_name.clone(),
                text: envelope.text().to_string(),
                self_originated: true,
                source: envelope.source(),
                destination: envelope.destination(),
                sequence: envelope.sequence(),
            }));

            let destination = envelope.destination();
            let route = if envelope.is_broadcast() {
                Route::Everyone
            } else if destination == self.local_node.address {
                Route::LocalOnly
            } else {
                match state.registry.endpoint_for(destination) {
                    Some(endpoint) => Route::Peer(endpoint.clone()),
                    None => {
                        let err = MeshError::no_route(destination);
                        state.stats.send_failures += 1;
                        warn!("Direct message to {} has no route", destination);
                        state.bus.publish(ChatEvent::SendFailed {
                            destination,
                            text: envelope.text().to_string(),
                            reason: err.to_string(),
                        });
                        state.log.append(LogEntry {
                            envelope,
                            sender: self.self_display_name.clone(),
                            origin: MessageOrigin::Local,
                            accepted_at: Timestamp::now(),
                        });
                        return Err(err);
                    }
                }
            };

            state.log.append(LogEntry {
                envelope,
                sender: self.self_display_name.clone(),
                origin: MessageOrigin::Local,
                accepted_at: Timestamp::now(),
            });
            route
        };

        match route {
            Route::Everyone => self.transport.send_to_all_except(None, &bytes),
            Route::Peer(endpoint) => self.transport.send_to_peer(&endpoint, &bytes),
            Route::LocalOnly => {}
        }
        Ok(())
    }

    /// Compose and send a message to every node
    pub fn send_broadcast<S: Into<String>>(&self, text: S) -> Result<MessageEnvelope> {
        let envelope = self
            .lock_state()
            .composer
            .compose_broadcast(&self.local_node, text);
        self.on_local_send(envelope.clone())?;
        Ok(envelope)
    }

    /// Compose and send a message to one node
    pub fn send_direct<S: Into<String>>(
        &self,
        target: NodeAddress,
        text: S,
    ) -> Result<MessageEnvelope> {
        let envelope = self
            .lock_state()
            .composer
            .compose_direct(&self.local_node, target, text);
        self.on_local_send(envelope.clone())?;
        Ok(envelope)
    }

    // ------------------------------------------------------------------------
    // Link Changes
    // ------------------------------------------------------------------------

    pub fn on_peer_connected(&self, endpoint: &EndpointId) {
        self.lock_state().register(endpoint);
    }

    pub fn on_peer_disconnected(&self, endpoint: &EndpointId) {
        let mut state = self.lock_state();
        if let Some(record) = state.registry.on_peer_disconnected(endpoint) {
            info!("Peer {} ({}) disconnected", endpoint, record.display_name);
            state.bus.publish(ChatEvent::PeerLeft {
                endpoint: endpoint.clone(),
                display_name: record.display_name,
            });
        }
    }

    /// Record which logical node sits behind `endpoint`
    pub fn bind_peer_address(&self, endpoint: &EndpointId, address: NodeAddress) {
        let mut state = self.lock_state();
        state.register(endpoint);
        state.registry.bind_address(endpoint, address);
        debug!("Bound {} to node {}", endpoint, address);
    }

    /// Record an asynchronous send failure; dedup state is left untouched
    pub fn on_transport_failure(&self, endpoint: Option<&EndpointId>, error: TransportError) {
        let mut state = self.lock_state();
        state.stats.transport_failures += 1;
        debug!("Transport failure: {}", error);
        state.bus.publish(ChatEvent::TransportFailed {
            endpoint: endpoint.cloned(),
            error,
        });
    }

    /// Single dispatch point for transport notifications
    pub fn handle_transport_event(&self, event: TransportEvent) -> Result<()> {
        match event {
            TransportEvent::Connected { peer } => self.on_peer_connected(&peer),
            TransportEvent::Disconnected { peer } => self.on_peer_disconnected(&peer),
            TransportEvent::AddressLearned { peer, address } => {
                self.bind_peer_address(&peer, address)
            }
            TransportEvent::BytesReceived { peer, payload } => {
                self.on_inbound_bytes(&peer, &payload)?;
            }
            TransportEvent::SendFailed { peer, error } => {
                self.on_transport_failure(peer.as_ref(), error)
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Observers
    // ------------------------------------------------------------------------

    pub fn subscribe(&self) -> Subscription {
        self.lock_state().bus.subscribe()
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.lock_state().bus.unsubscribe(id)
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    pub fn local_node(&self) -> &LocalNode {
        &self.local_node
    }

    pub fn topology(&self) -> RelayTopology {
        self.topology
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn display_name_of(&self, endpoint: &EndpointId) -> String {
        self.lock_state().registry.display_name_of(endpoint)
    }

    pub fn connected_peers(&self) -> Vec<PeerRecord> {
        self.lock_state().registry.connected_peers()
    }

    /// Snapshot of the ordered message log
    pub fn message_log(&self) -> Vec<LogEntry> {
        self.lock_state().log.entries().to_vec()
    }

    pub fn has_seen(&self, key: &DedupKey) -> bool {
        self.lock_state().seen.contains(key)
    }

    pub fn stats(&self) -> EngineStats {
        let state = self.lock_state();
        EngineStats {
            seen: *state.seen.stats(),
            ..state.stats
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

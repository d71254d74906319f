//! Multi-node mesh simulator
//!
//! Runs one relay engine per simulated node, each fed by its own tokio task
//! that drains the node's inbox into [`RelayEngine::handle_transport_event`].
//! Links are created through the shared [`Switchboard`], and
//! [`MeshSimulator::settle`] waits until no event is left in flight.

use std::sync::Arc;
use std::time::Duration;

use kietchat_core::{
    EndpointId, LocalNode, MeshConfig, MessageEnvelope, NodeAddress, RelayEngine, TransportEvent,
};
use rand_chacha::ChaCha8Rng;
use rand_core::SeedableRng;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::channels::{create_inbox, ChannelTransport, InFlight, InboxReceiver, Switchboard};
use crate::errors::{HarnessError, Result};

pub type SimEngine = RelayEngine<ChannelTransport>;

const SETTLE_POLL_INTERVAL: Duration = Duration::from_millis(1);

// ----------------------------------------------------------------------------
// Topology
// ----------------------------------------------------------------------------

/// Link layout for a freshly built mesh
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topology {
    /// Every node linked to every other node
    #[default]
    Full,
    /// Node i linked to node i + 1
    Line,
    /// Line plus a link closing the loop
    Ring,
}

impl Topology {
    /// Index pairs to link for `count` nodes
    pub fn links(&self, count: usize) -> Vec<(usize, usize)> {
        match self {
            Topology::Full => (0..count)
                .flat_map(|a| (a + 1..count).map(move |b| (a, b)))
                .collect(),
            Topology::Line => (1..count).map(|b| (b - 1, b)).collect(),
            Topology::Ring => {
                let mut links = Topology::Line.links(count);
                if count > 2 {
                    links.push((count - 1, 0));
                }
                links
            }
        }
    }
}

// ----------------------------------------------------------------------------
// Simulated Node
// ----------------------------------------------------------------------------

pub struct SimNode {
    endpoint: EndpointId,
    engine: Arc<SimEngine>,
    pump: JoinHandle<()>,
}

impl SimNode {
    pub fn endpoint(&self) -> &EndpointId {
        &self.endpoint
    }

    pub fn engine(&self) -> &Arc<SimEngine> {
        &self.engine
    }

    pub fn address(&self) -> NodeAddress {
        self.engine.local_node().address
    }
}

async fn pump(engine: Arc<SimEngine>, mut inbox: InboxReceiver, in_flight: InFlight) {
    while let Some(event) = inbox.recv().await {
        if let Err(err) = engine.handle_transport_event(event) {
            warn!("Node {} rejected event: {}", engine.local_node().address, err);
        }
        in_flight.decrement();
    }
}

// ----------------------------------------------------------------------------
// Mesh Simulator
// ----------------------------------------------------------------------------

pub struct MeshSimulator {
    config: MeshConfig,
    switchboard: Switchboard,
    nodes: Vec<SimNode>,
    rng: ChaCha8Rng,
}

impl MeshSimulator {
    /// Create an empty simulator; node addresses are drawn from `seed`
    pub fn new(config: MeshConfig, seed: u64) -> Self {
        Self {
            config,
            switchboard: Switchboard::new(),
            nodes: Vec::new(),
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Build `count` nodes linked in `topology`
    ///
    /// Must be called from within a tokio runtime.
    pub fn with_topology(
        config: MeshConfig,
        seed: u64,
        count: usize,
        topology: Topology,
    ) -> Result<Self> {
        let mut simulator = Self::new(config, seed);
        for index in 0..count {
            simulator.add_node(format!("node{index}"))?;
        }
        simulator.connect_topology(topology)?;
        Ok(simulator)
    }

    /// Link the current nodes in `topology`
    pub fn connect_topology(&self, topology: Topology) -> Result<()> {
        for (a, b) in topology.links(self.nodes.len()) {
            self.connect(a, b)?;
        }
        Ok(())
    }

    /// Spawn a node with a fresh address and return its index
    ///
    /// Must be called from within a tokio runtime.
    pub fn add_node<T: Into<String>>(&mut self, username: T) -> Result<usize> {
        let username = username.into();
        let local_node = loop {
            let candidate = LocalNode::generate_with(username.clone(), &mut self.rng);
            if !self.address_in_use(candidate.address) {
                break candidate;
            }
        };
        self.add_node_with(local_node)
    }

    /// Spawn a node with a caller-chosen identity and return its index
    ///
    /// Must be called from within a tokio runtime.
    pub fn add_node_with(&mut self, local_node: LocalNode) -> Result<usize> {
        if self.address_in_use(local_node.address) {
            return Err(HarnessError::AddressInUse {
                address: local_node.address,
            });
        }

        let index = self.nodes.len();
        let endpoint = EndpointId::new(format!("02:00:00:00:{:02X}:{:02X}", index >> 8, index & 0xFF));
        let (inbox_sender, inbox) = create_inbox();
        self.switchboard.register(endpoint.clone(), inbox_sender);

        let transport = ChannelTransport::new(endpoint.clone(), self.switchboard.clone());
        let engine = Arc::new(RelayEngine::new(self.config.clone(), local_node, transport)?);
        let pump = tokio::spawn(pump(
            Arc::clone(&engine),
            inbox,
            self.switchboard.in_flight().clone(),
        ));

        debug!(
            "Added node {} ({}) at {}",
            index,
            engine.local_node().address,
            endpoint
        );
        self.nodes.push(SimNode {
            endpoint,
            engine,
            pump,
        });
        Ok(index)
    }

    fn address_in_use(&self, address: NodeAddress) -> bool {
        self.nodes.iter().any(|node| node.address() == address)
    }

    pub fn node(&self, index: usize) -> Result<&SimNode> {
        self.nodes
            .get(index)
            .ok_or(HarnessError::UnknownNode { index })
    }

    pub fn engine(&self, index: usize) -> Result<&Arc<SimEngine>> {
        Ok(self.node(index)?.engine())
    }

    pub fn nodes(&self) -> &[SimNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Bring up a link; both ends see `Connected` then `AddressLearned`
    pub fn connect(&self, a: usize, b: usize) -> Result<()> {
        let (left, right) = (self.node(a)?, self.node(b)?);
        if !self.switchboard.link(&left.endpoint, &right.endpoint) {
            return Err(HarnessError::link_error(a, b, "already linked or self-link"));
        }

        for (near, far) in [(left, right), (right, left)] {
            self.switchboard.deliver(
                &near.endpoint,
                TransportEvent::Connected {
                    peer: far.endpoint.clone(),
                },
            );
            self.switchboard.deliver(
                &near.endpoint,
                TransportEvent::AddressLearned {
                    peer: far.endpoint.clone(),
                    address: far.address(),
                },
            );
        }

        info!("Linked node {} <-> node {}", a, b);
        Ok(())
    }

    /// Tear down a link; both ends see `Disconnected`
    pub fn disconnect(&self, a: usize, b: usize) -> Result<()> {
        let (left, right) = (self.node(a)?, self.node(b)?);
        if !self.switchboard.unlink(&left.endpoint, &right.endpoint) {
            return Err(HarnessError::link_error(a, b, "not linked"));
        }

        for (near, far) in [(left, right), (right, left)] {
            self.switchboard.deliver(
                &near.endpoint,
                TransportEvent::Disconnected {
                    peer: far.endpoint.clone(),
                },
            );
        }

        info!("Unlinked node {} <-> node {}", a, b);
        Ok(())
    }

    /// Broadcast `text` from node `from`
    pub fn broadcast(&self, from: usize, text: &str) -> Result<MessageEnvelope> {
        Ok(self.engine(from)?.send_broadcast(text)?)
    }

    /// Direct message from node `from` to node `to`
    pub fn send_direct(&self, from: usize, to: usize, text: &str) -> Result<MessageEnvelope> {
        let target = self.node(to)?.address();
        Ok(self.engine(from)?.send_direct(target, text)?)
    }

    /// Events queued in any inbox but not yet handled
    pub fn pending(&self) -> usize {
        self.switchboard.in_flight().get()
    }

    /// Wait until every queued event has been handled
    pub async fn settle(&self, timeout: Duration) -> Result<()> {
        let waited = tokio::time::timeout(timeout, async {
            while self.pending() > 0 {
                tokio::time::sleep(SETTLE_POLL_INTERVAL).await;
            }
        })
        .await;

        waited.map_err(|_| HarnessError::SettleTimeout {
            pending: self.pending(),
            waited_ms: timeout.as_millis() as u64,
        })
    }

    /// Stop every node task and wait for them to finish
    pub async fn shutdown(mut self) {
        let pumps: Vec<JoinHandle<()>> = self
            .nodes
            .drain(..)
            .map(|node| {
                node.pump.abort();
                node.pump
            })
            .collect();
        futures::future::join_all(pumps).await;
    }
}

impl Drop for MeshSimulator {
    fn drop(&mut self) {
        for node in &self.nodes {
            node.pump.abort();
        }
    }
}

//! Test utilities for exercising the relay engine without real links
//!
//! Provides a recording transport, deterministic node addresses, and
//! encoded-envelope helpers shared by the integration test files.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use kietchat_core::{
    EndpointId, LocalNode, MeshConfig, MeshTransport, MessageEnvelope, NodeAddress, RelayEngine,
    WireFormat,
};
use rand_chacha::ChaCha8Rng;
use rand_core::SeedableRng;
use smallvec::SmallVec;

// ----------------------------------------------------------------------------
// Recording Transport
// ----------------------------------------------------------------------------

/// One call made by the engine into its transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SentPayload {
    ToPeer {
        peer: EndpointId,
        payload: Vec<u8>,
    },
    ToAllExcept {
        exclude: Option<EndpointId>,
        payload: Vec<u8>,
    },
}

impl SentPayload {
    pub fn payload(&self) -> &[u8] {
        match self {
            SentPayload::ToPeer { payload, .. } | SentPayload::ToAllExcept { payload, .. } => {
                payload
            }
        }
    }
}

/// Transport that records every send and never fails
#[derive(Debug, Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<SentPayload>>,
    peers: Mutex<Vec<EndpointId>>,
}

impl RecordingTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add_peer(&self, peer: EndpointId) {
        self.peers.lock().unwrap().push(peer);
    }

    pub fn sent(&self) -> Vec<SentPayload> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    pub fn clear(&self) {
        self.sent.lock().unwrap().clear();
    }
}

impl MeshTransport for RecordingTransport {
    fn send_to_peer(&self, peer: &EndpointId, payload: &[u8]) {
        self.sent.lock().unwrap().push(SentPayload::ToPeer {
            peer: peer.clone(),
            payload: payload.to_vec(),
        });
    }

    fn send_to_all_except(&self, exclude: Option<&EndpointId>, payload: &[u8]) {
        self.sent.lock().unwrap().push(SentPayload::ToAllExcept {
            exclude: exclude.cloned(),
            payload: payload.to_vec(),
        });
    }

    fn connected_peers(&self) -> SmallVec<[EndpointId; 8]> {
        self.peers.lock().unwrap().iter().cloned().collect()
    }
}

// ----------------------------------------------------------------------------
// Helpers
// ----------------------------------------------------------------------------

/// Build an engine for a node at a fixed address
pub fn create_test_engine(
    address: u32,
    config: MeshConfig,
) -> (RelayEngine<Arc<RecordingTransport>>, Arc<RecordingTransport>) {
    let transport = RecordingTransport::new();
    let engine = RelayEngine::new(
        config,
        LocalNode::with_address("tester", NodeAddress::new(address)),
        Arc::clone(&transport),
    )
    .expect("test configuration should be valid");
    (engine, transport)
}

/// Deterministic local nodes drawn from a seeded RNG
pub fn create_test_nodes(count: usize) -> Vec<LocalNode> {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    (0..count)
        .map(|i| LocalNode::generate_with(format!("user{i}"), &mut rng))
        .collect()
}

pub fn endpoint(id: &str) -> EndpointId {
    EndpointId::from(id)
}

/// Encoded broadcast envelope
pub fn broadcast_bytes(source: u32, sequence: u32, text: &str) -> Vec<u8> {
    WireFormat::encode(&MessageEnvelope::broadcast(
        NodeAddress::new(source),
        sequence,
        text,
    ))
    .expect("test envelope should encode")
}

/// Encoded direct envelope
pub fn direct_bytes(source: u32, destination: u32, sequence: u32, text: &str) -> Vec<u8> {
    WireFormat::encode(&MessageEnvelope::new(
        NodeAddress::new(source),
        NodeAddress::new(destination),
        sequence,
        text,
    ))
    .expect("test envelope should encode")
}

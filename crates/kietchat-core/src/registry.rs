//! Peer registry
//!
//! Maps transport endpoints to human-readable display names. A name is
//! assigned the first time an endpoint is seen and stays fixed until the
//! endpoint disconnects.

use hashbrown::HashMap;

use rand_core::{OsRng, RngCore};
use serde::{Deserialize, Serialize};

use crate::types::{EndpointId, NodeAddress, Timestamp};

/// Name returned for endpoints that were never registered
pub const UNKNOWN_PEER_NAME: &str = "Unknown";

/// Prefix shared by every assigned display name
pub const PEER_NAME_PREFIX: &str = "Peer";

const RANDOM_SUFFIX_MIN: u32 = 10;
const RANDOM_SUFFIX_MAX: u32 = 99;
const RANDOM_NAME_ATTEMPTS: usize = 32;

// ----------------------------------------------------------------------------
// Policies
// ----------------------------------------------------------------------------

/// How display names are generated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NamingScheme {
    /// `Peer1`, `Peer2`, ... from a counter that never goes back
    #[default]
    Sequential,
    /// `Peer` followed by a random number in 10..=99
    Random,
}

/// What happens to a name when its endpoint reconnects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconnectPolicy {
    /// A reconnecting endpoint gets a fresh name
    #[default]
    Reassign,
    /// A reconnecting endpoint gets its previous name back
    Retain,
}

// ----------------------------------------------------------------------------
// Peer Record
// ----------------------------------------------------------------------------

/// Registry entry for one connected endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerRecord {
    pub endpoint: EndpointId,
    pub display_name: String,
    /// Logical address of the node behind this link, once known
    pub address: Option<NodeAddress>,
    pub connected_at: Timestamp,
}

// ----------------------------------------------------------------------------
// Peer Registry
// ----------------------------------------------------------------------------

pub struct PeerRegistry {
    peers: HashMap<EndpointId, PeerRecord>,
    retained_names: HashMap<EndpointId, String>,
    naming: NamingScheme,
    reconnect: ReconnectPolicy,
    next_index: u32,
    rng: Box<dyn RngCore + Send>,
}

impl PeerRegistry {
    pub fn new(naming: NamingScheme, reconnect: ReconnectPolicy) -> Self {
        Self::with_rng(naming, reconnect, Box::new(OsRng))
    }

    /// Create a registry drawing random names from `rng`
    pub fn with_rng(
        naming: NamingScheme,
        reconnect: ReconnectPolicy,
        rng: Box<dyn RngCore + Send>,
    ) -> Self {
        Self {
            peers: HashMap::new(),
            retained_names: HashMap::new(),
            naming,
            reconnect,
            next_index: 1,
            rng,
        }
    }

    /// Register an endpoint; returns true if a new entry was created
    pub fn on_peer_connected(&mut self, endpoint: &EndpointId) -> bool {
        if self.peers.contains_key(endpoint) {
            return false;
        }

        let display_name = match self.retained_names.get(endpoint) {
            Some(name) if !self.name_in_use(name) => name.clone(),
            _ => self.next_name(),
        };

        if self.reconnect == ReconnectPolicy::Retain {
            self.retained_names
                .insert(endpoint.clone(), display_name.clone());
        }

        self.peers.insert(
            endpoint.clone(),
            PeerRecord {
                endpoint: endpoint.clone(),
                display_name,
                address: None,
                connected_at: Timestamp::now(),
            },
        );
        true
    }

    /// Forget an endpoint, returning its entry if it was registered
    pub fn on_peer_disconnected(&mut self, endpoint: &EndpointId) -> Option<PeerRecord> {
        self.peers.remove(endpoint)
    }

    pub fn display_name_of(&self, endpoint: &EndpointId) -> String {
        self.peers
            .get(endpoint)
            .map(|record| record.display_name.clone())
            .unwrap_or_else(|| UNKNOWN_PEER_NAME.to_string())
    }

    /// Record the logical address of the node behind `endpoint`
    ///
    /// Any other endpoint previously bound to the same address loses it.
    /// Returns false if the endpoint is not registered.
    pub fn bind_address(&mut self, endpoint: &EndpointId, address: NodeAddress) -> bool {
        if !self.peers.contains_key(endpoint) {
            return false;
        }

        for record in self.peers.values_mut() {
            if record.address == Some(address) && &record.endpoint != endpoint {
                record.address = None;
            }
        }

        if let Some(record) = self.peers.get_mut(endpoint) {
            record.address = Some(address);
        }
        true
    }

    /// Endpoint currently bound to `address`
    pub fn endpoint_for(&self, address: NodeAddress) -> Option<&EndpointId> {
        self.peers
            .values()
            .find(|record| record.address == Some(address))
            .map(|record| &record.endpoint)
    }

    pub fn get(&self, endpoint: &EndpointId) -> Option<&PeerRecord> {
        self.peers.get(endpoint)
    }

    pub fn is_connected(&self, endpoint: &EndpointId) -> bool {
        self.peers.contains_key(endpoint)
    }

    /// Connected peers ordered by connect time, then name
    pub fn connected_peers(&self) -> Vec<PeerRecord> {
        let mut peers: Vec<PeerRecord> = self.peers.values().cloned().collect();
        peers.sort_by(|a, b| {
            a.connected_at
                .cmp(&b.connected_at)
                .then_with(|| a.display_name.cmp(&b.display_name))
        });
        peers
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    fn name_in_use(&self, name: &str) -> bool {
        self.peers.values().any(|record| record.display_name == name)
    }

    fn next_name(&mut self) -> String {
        if self.naming == NamingScheme::Random {
            let span = RANDOM_SUFFIX_MAX - RANDOM_SUFFIX_MIN + 1;
            for _ in 0..RANDOM_NAME_ATTEMPTS {
                let suffix = RANDOM_SUFFIX_MIN + self.rng.next_u32() % span;
                let candidate = format!("{PEER_NAME_PREFIX}{suffix}");
                if !self.name_in_use(&candidate) && !self.is_retained(&candidate) {
                    return candidate;
                }
            }
        }

        loop {
            let candidate = format!("{PEER_NAME_PREFIX}{}", self.next_index);
            self.next_index += 1;
            if !self.name_in_use(&candidate) && !self.is_retained(&candidate) {
                return candidate;
            }
        }
    }

    fn is_retained(&self, name: &str) -> bool {
        self.retained_names.values().any(|retained| retained == name)
    }
}

impl Default for PeerRegistry {
    fn default() -> Self {
        Self::new(NamingScheme::default(), ReconnectPolicy::default())
    }
}

impl core::fmt::Debug for PeerRegistry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PeerRegistry")
            .field("peers", &self.peers)
            .field("naming", &self.naming)
            .field("reconnect", &self.reconnect)
            .field("next_index", &self.next_index)
            .finish_non_exhaustive()
    }
}

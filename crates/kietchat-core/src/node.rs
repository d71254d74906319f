//! Local node identity

use rand_core::{OsRng, RngCore};
use serde::{Deserialize, Serialize};

use crate::types::NodeAddress;

/// Lowest address drawn for a node
pub const MIN_NODE_ADDRESS: u32 = 10_000;

/// Highest address drawn for a node
pub const MAX_NODE_ADDRESS: u32 = 99_999;

/// The chat participant running this engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalNode {
    pub username: String,
    pub address: NodeAddress,
}

impl LocalNode {
    /// Create a node with an address drawn from the OS RNG
    pub fn new<T: Into<String>>(username: T) -> Self {
        Self::generate_with(username, &mut OsRng)
    }

    /// Create a node with an address drawn from the given RNG
    pub fn generate_with<T: Into<String>, R: RngCore + ?Sized>(username: T, rng: &mut R) -> Self {
        Self {
            username: username.into(),
            address: random_node_address(rng),
        }
    }

    /// Create a node with a fixed address
    pub fn with_address<T: Into<String>>(username: T, address: NodeAddress) -> Self {
        Self {
            username: username.into(),
            address,
        }
    }
}

/// Draw an address in `MIN_NODE_ADDRESS..=MAX_NODE_ADDRESS`
pub fn random_node_address<R: RngCore + ?Sized>(rng: &mut R) -> NodeAddress {
    let span = MAX_NODE_ADDRESS - MIN_NODE_ADDRESS + 1;
    NodeAddress::new(MIN_NODE_ADDRESS + rng.next_u32() % span)
}

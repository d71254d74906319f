//! Error types for the mesh simulator

use kietchat_core::{MeshError, NodeAddress};

#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    #[error("Unknown node index: {index}")]
    UnknownNode { index: usize },

    #[error("Node address {address} is already in use")]
    AddressInUse { address: NodeAddress },

    #[error("Cannot change link {a} <-> {b}: {reason}")]
    Link { a: usize, b: usize, reason: String },

    #[error("Mesh did not settle within {waited_ms}ms ({pending} events pending)")]
    SettleTimeout { pending: usize, waited_ms: u64 },

    #[error("Mesh error: {0}")]
    Mesh(#[from] MeshError),
}

impl HarnessError {
    pub fn link_error<T: Into<String>>(a: usize, b: usize, reason: T) -> Self {
        HarnessError::Link {
            a,
            b,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = core::result::Result<T, HarnessError>;

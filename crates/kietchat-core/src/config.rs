//! Mesh core configuration
//!
//! Everything the relay engine fixes at construction time lives here.

use serde::{Deserialize, Serialize};

use crate::errors::{MeshError, Result};
use crate::registry::{NamingScheme, ReconnectPolicy};
use crate::seen::DEFAULT_SEEN_CAPACITY;
use crate::wire::{MAX_TEXT_BYTES, MIN_ENCODED_SIZE};

/// Read buffer size of the socket prototypes; also the default payload cap
pub const DEFAULT_MAX_PAYLOAD_SIZE: usize = 1024;

/// Name shown for locally sent messages
pub const DEFAULT_SELF_DISPLAY_NAME: &str = "Me";

// ----------------------------------------------------------------------------
// Relay Topology
// ----------------------------------------------------------------------------

/// Relay policy for accepted inbound envelopes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelayTopology {
    /// Rebroadcast to every peer except the one it came from
    #[default]
    FloodMesh,
    /// Pure socket pairing: never relay
    Star,
}

impl RelayTopology {
    pub fn relays(&self) -> bool {
        matches!(self, RelayTopology::FloodMesh)
    }
}

// ----------------------------------------------------------------------------
// Mesh Configuration
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshConfig {
    /// Relay policy
    pub topology: RelayTopology,
    /// Maximum dedup keys retained before the oldest is evicted
    pub seen_capacity: usize,
    /// Largest encoded payload accepted or sent
    pub max_payload_size: usize,
    /// Display name generation
    pub naming: NamingScheme,
    /// Name handling when an endpoint reconnects
    pub reconnect: ReconnectPolicy,
    /// Name attached to locally sent messages
    pub self_display_name: String,
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            topology: RelayTopology::FloodMesh,
            seen_capacity: DEFAULT_SEEN_CAPACITY,
            max_payload_size: DEFAULT_MAX_PAYLOAD_SIZE,
            naming: NamingScheme::Sequential,
            reconnect: ReconnectPolicy::Reassign,
            self_display_name: DEFAULT_SELF_DISPLAY_NAME.to_string(),
        }
    }
}

impl MeshConfig {
    /// Flooding peer-to-peer rebroadcast
    pub fn flood_mesh() -> Self {
        Self::default()
    }

    /// Direct socket pairing without relay
    pub fn star() -> Self {
        Self {
            topology: RelayTopology::Star,
            ..Self::default()
        }
    }

    /// Small, fully deterministic configuration for tests
    pub fn testing() -> Self {
        Self {
            seen_capacity: 256,
            ..Self::default()
        }
    }

    pub fn with_topology(mut self, topology: RelayTopology) -> Self {
        self.topology = topology;
        self
    }

    pub fn with_seen_capacity(mut self, capacity: usize) -> Self {
        self.seen_capacity = capacity;
        self
    }

    pub fn with_max_payload_size(mut self, size: usize) -> Self {
        self.max_payload_size = size;
        self
    }

    pub fn with_naming(mut self, naming: NamingScheme) -> Self {
        self.naming = naming;
        self
    }

    pub fn with_reconnect(mut self, reconnect: ReconnectPolicy) -> Self {
        self.reconnect = reconnect;
        self
    }

    pub fn with_self_display_name<T: Into<String>>(mut self, name: T) -> Self {
        self.self_display_name = name.into();
        self
    }

    /// Validate configuration consistency
    pub fn validate(&self) -> Result<()> {
        if self.seen_capacity == 0 {
            return Err(MeshError::config_error("seen_capacity must be at least 1"));
        }

        if self.max_payload_size < MIN_ENCODED_SIZE {
            return Err(MeshError::config_error(format!(
                "max_payload_size must be at least {MIN_ENCODED_SIZE} bytes"
            )));
        }

        if self.max_payload_size > MAX_TEXT_BYTES + MIN_ENCODED_SIZE {
            return Err(MeshError::config_error(format!(
                "max_payload_size cannot exceed {} bytes",
                MAX_TEXT_BYTES + MIN_ENCODED_SIZE
            )));
        }

        if self.self_display_name.trim().is_empty() {
            return Err(MeshError::config_error("self_display_name must not be empty"));
        }

        Ok(())
    }
}

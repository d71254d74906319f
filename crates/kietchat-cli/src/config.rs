//! KietChat CLI configuration
//!
//! Configuration is read from a TOML file; every section and field is
//! optional and falls back to its default.

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use kietchat_core::{LocalNode, MeshConfig, NodeAddress};
use kietchat_harness::Topology;

use crate::error::{CliError, Result};

// ----------------------------------------------------------------------------
// Application Configuration
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Relay engine settings shared by every simulated node
    pub mesh: MeshConfig,
    /// Identity of the local node
    pub node: NodeConfig,
    /// Simulation defaults
    pub simulation: SimulationConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub username: String,
    /// Fixed node address; drawn at random when absent
    pub address: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// How long to wait for the mesh to go quiet after each step
    pub settle_timeout_ms: u64,
    pub nodes: usize,
    pub topology: Topology,
    pub seed: u64,
}

// ----------------------------------------------------------------------------
// Default Implementations
// ----------------------------------------------------------------------------

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            username: "anonymous".to_string(),
            address: None,
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            settle_timeout_ms: 2_000,
            nodes: 3,
            topology: Topology::Full,
            seed: 42,
        }
    }
}

// ----------------------------------------------------------------------------
// Loading and Validation
// ----------------------------------------------------------------------------

impl AppConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_toml_string()?)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.mesh.validate()?;

        if self.node.username.trim().is_empty() {
            return Err(CliError::Config("node.username must not be empty".into()));
        }

        if self.node.address == Some(NodeAddress::BROADCAST.value()) {
            return Err(CliError::Config(
                "node.address cannot be the broadcast sentinel".into(),
            ));
        }

        if self.simulation.nodes == 0 {
            return Err(CliError::Config("simulation.nodes must be at least 1".into()));
        }

        if self.simulation.settle_timeout_ms == 0 {
            return Err(CliError::Config(
                "simulation.settle_timeout_ms must be positive".into(),
            ));
        }

        Ok(())
    }

    /// Local node identity described by the `node` section
    pub fn local_node(&self) -> LocalNode {
        match self.node.address {
            Some(address) => {
                LocalNode::with_address(self.node.username.clone(), NodeAddress::new(address))
            }
            None => LocalNode::new(self.node.username.clone()),
        }
    }

    pub fn settle_timeout(&self) -> Duration {
        Duration::from_millis(self.simulation.settle_timeout_ms)
    }
}

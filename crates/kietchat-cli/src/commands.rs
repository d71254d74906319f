//! Command handlers for the KietChat CLI

use std::fmt;

use tracing::{debug, info};

use kietchat_core::{EngineStats, LogEntry, MessageEnvelope, NodeAddress, WireFormat};
use kietchat_harness::{MeshSimulator, Topology};

use crate::cli::{Cli, Commands};
use crate::config::AppConfig;
use crate::error::{CliError, Result};

/// Command dispatcher for handling CLI commands
pub struct CommandDispatcher;

impl CommandDispatcher {
    /// Execute a CLI command, printing its output to stdout
    pub async fn execute(cli: Cli, config: AppConfig) -> Result<()> {
        let output = match cli.command {
            Commands::Simulate {
                nodes,
                topology,
                seed,
                message,
            } => {
                let mut simulation = config.simulation.clone();
                if let Some(nodes) = nodes {
                    simulation.nodes = nodes;
                }
                if let Some(topology) = topology {
                    simulation.topology = topology.into();
                }
                if let Some(seed) = seed {
                    simulation.seed = seed;
                }
                let config = AppConfig {
                    simulation,
                    ..config
                };
                run_simulation(&config, &message).await?.to_string()
            }
            Commands::Encode {
                source,
                destination,
                sequence,
                text,
            } => encode_envelope(source, &destination, sequence, &text)?,
            Commands::Decode { hex } => describe_payload(&hex)?,
            Commands::Config => config.to_toml_string()?,
        };

        println!("{}", output.trim_end());
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Wire Tools
// ----------------------------------------------------------------------------

/// Encode an envelope to lowercase hex
pub fn encode_envelope(source: u32, destination: &str, sequence: u32, text: &str) -> Result<String> {
    let destination: NodeAddress = destination
        .parse()
        .map_err(|_| CliError::InvalidArgument(format!("bad destination: {destination}")))?;
    let envelope = MessageEnvelope::new(NodeAddress::new(source), destination, sequence, text);
    let bytes = WireFormat::encode(&envelope)?;
    debug!("Encoded {} into {} bytes", envelope.dedup_key(), bytes.len());
    Ok(hex::encode(bytes))
}

/// Decode a hex payload into a readable description
pub fn describe_payload(encoded: &str) -> Result<String> {
    let cleaned: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = hex::decode(cleaned)?;
    let envelope = WireFormat::decode(&bytes)?;
    Ok(format!(
        "source:      {}\ndestination: {}\nsequence:    {}\ntext:        {}",
        envelope.source(),
        envelope.destination(),
        envelope.sequence(),
        envelope.text()
    ))
}

// ----------------------------------------------------------------------------
// Simulation
// ----------------------------------------------------------------------------

/// Chat log and counters of one simulated node
#[derive(Debug, Clone)]
pub struct NodeReport {
    pub index: usize,
    pub username: String,
    pub address: NodeAddress,
    pub peers: Vec<String>,
    pub log: Vec<LogEntry>,
    pub stats: EngineStats,
}

/// Outcome of a scripted simulation
#[derive(Debug, Clone)]
pub struct SimulationReport {
    pub topology: Topology,
    pub nodes: Vec<NodeReport>,
}

impl fmt::Display for SimulationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} nodes, {:?} topology",
            self.nodes.len(),
            self.topology
        )?;
        for node in &self.nodes {
            writeln!(
                f,
                "\n== node {} {} ({}) peers: [{}]",
                node.index,
                node.username,
                node.address,
                node.peers.join(", ")
            )?;
            for entry in &node.log {
                writeln!(f, "  {}", entry.render())?;
            }
            writeln!(
                f,
                "  accepted={} sent={} relayed={} duplicates={}",
                node.stats.messages_accepted,
                node.stats.local_sends,
                node.stats.relays,
                node.stats.duplicates_suppressed
            )?;
        }
        Ok(())
    }
}

/// Build the configured mesh, broadcast each message from node 0, and
/// collect every node's log
///
/// Node 0 takes its identity from the `node` section; a missing address is
/// drawn from the simulation seed.
pub async fn run_simulation(config: &AppConfig, messages: &[String]) -> Result<SimulationReport> {
    let simulation = &config.simulation;
    if simulation.nodes == 0 {
        return Err(CliError::InvalidArgument("at least one node is required".into()));
    }

    info!(
        "Simulating {} nodes in a {:?} topology",
        simulation.nodes, simulation.topology
    );
    let mut simulator = MeshSimulator::new(config.mesh.clone(), simulation.seed);
    match config.node.address {
        Some(_) => simulator.add_node_with(config.local_node())?,
        None => simulator.add_node(config.node.username.clone())?,
    };
    for index in 1..simulation.nodes {
        simulator.add_node(format!("node{index}"))?;
    }
    simulator.connect_topology(simulation.topology)?;
    simulator.settle(config.settle_timeout()).await?;

    for message in messages {
        simulator.broadcast(0, message)?;
        simulator.settle(config.settle_timeout()).await?;
    }

    let nodes = simulator
        .nodes()
        .iter()
        .enumerate()
        .map(|(index, node)| {
            let engine = node.engine();
            NodeReport {
                index,
                username: engine.local_node().username.clone(),
                address: node.address(),
                peers: engine
                    .connected_peers()
                    .into_iter()
                    .map(|peer| peer.display_name)
                    .collect(),
                log: engine.message_log(),
                stats: engine.stats(),
            }
        })
        .collect();

    simulator.shutdown().await;
    Ok(SimulationReport {
        topology: simulation.topology,
        nodes,
    })
}

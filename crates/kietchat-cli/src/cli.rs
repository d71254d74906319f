//! Command-line interface definitions and parsing

use clap::{Parser, Subcommand, ValueEnum};
use kietchat_harness::Topology;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run an in-memory mesh and broadcast messages from the first node
    Simulate {
        /// Number of nodes (defaults to the configured value)
        #[arg(short, long)]
        nodes: Option<usize>,
        /// Link layout (defaults to the configured value)
        #[arg(short, long, value_enum)]
        topology: Option<TopologyArg>,
        /// Seed for node addresses
        #[arg(long)]
        seed: Option<u64>,
        /// Messages to broadcast, in order
        #[arg(short, long, required = true, num_args = 1..)]
        message: Vec<String>,
    },
    /// Encode an envelope and print it as hex
    Encode {
        /// Source node address
        #[arg(short, long)]
        source: u32,
        /// Destination node address or "broadcast"
        #[arg(short, long, default_value = "broadcast")]
        destination: String,
        /// Sequence number
        #[arg(long)]
        sequence: u32,
        /// Message text
        text: String,
    },
    /// Decode a hex payload and print the envelope
    Decode {
        /// Encoded payload in hex
        hex: String,
    },
    /// Print the effective configuration as TOML
    Config,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TopologyArg {
    Full,
    Line,
    Ring,
}

impl From<TopologyArg> for Topology {
    fn from(arg: TopologyArg) -> Self {
        match arg {
            TopologyArg::Full => Topology::Full,
            TopologyArg::Line => Topology::Line,
            TopologyArg::Ring => Topology::Ring,
        }
    }
}

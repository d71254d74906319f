//! KietChat CLI library
//!
//! Argument parsing, configuration loading, and the command handlers behind
//! the `kietchat` binary.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;

pub use cli::{Cli, Commands, TopologyArg};
pub use commands::{CommandDispatcher, SimulationReport};
pub use config::AppConfig;
pub use error::{CliError, Result};

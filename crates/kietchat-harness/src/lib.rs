#![doc = "KietChat Harness\n\nIn-memory channel transport and multi-node mesh simulator for exercising\nthe relay engine without radios or sockets."]

pub mod channels;
pub mod errors;
pub mod simulator;

pub use channels::{ChannelTransport, InFlight, Switchboard};
pub use errors::{HarnessError, Result};
pub use simulator::{MeshSimulator, SimEngine, SimNode, Topology};

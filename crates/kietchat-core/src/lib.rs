//! KietChat Mesh Core
//!
//! Message distribution for a small peer-to-peer chat mesh: the envelope wire
//! format, the peer registry that names connected endpoints, the outbound
//! composer, and the relay engine that deduplicates and floods envelopes
//! across directly connected peers. Physical links are supplied by a
//! [`MeshTransport`] implementation.

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod composer;
pub mod config;
pub mod engine;
pub mod envelope;
pub mod errors;
pub mod events;
pub mod log;
pub mod node;
pub mod registry;
pub mod seen;
pub mod transport;
pub mod types;
pub mod wire;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use composer::OutboundComposer;
pub use config::{MeshConfig, RelayTopology, DEFAULT_MAX_PAYLOAD_SIZE};
pub use engine::{EngineStats, InboundOutcome, RelayEngine};
pub use envelope::MessageEnvelope;
pub use errors::{DecodeError, MeshError, MeshResult, Result, TransportError};
pub use events::{AcceptedMessage, ChatEvent, EventBus, Subscription, SubscriptionId};
pub use log::{LogEntry, MessageLog, MessageOrigin};
pub use node::LocalNode;
pub use registry::{NamingScheme, PeerRecord, PeerRegistry, ReconnectPolicy, UNKNOWN_PEER_NAME};
pub use seen::{SeenSet, SeenSetStats, DEFAULT_SEEN_CAPACITY};
pub use transport::{MeshTransport, TransportEvent};
pub use types::{DedupKey, EndpointId, NodeAddress, Timestamp};
pub use wire::WireFormat;

//! Error types for the KietChat mesh core
//!
//! Every error in this module is local and recoverable: a malformed payload is
//! dropped, a failed send is reported to the caller, and the engine keeps
//! running.

use serde::{Deserialize, Serialize};

use crate::types::{EndpointId, NodeAddress};

// ----------------------------------------------------------------------------
// Specific Error Types
// ----------------------------------------------------------------------------

/// Reasons an inbound payload could not be decoded into an envelope
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("Empty payload")]
    Empty,
    #[error("Unsupported wire version: {version}")]
    UnsupportedVersion { version: u8 },
    #[error("Payload truncated (expected at least {expected} bytes, got {actual})")]
    Truncated { expected: usize, actual: usize },
    #[error("Payload has {extra} unexpected trailing bytes")]
    TrailingBytes { extra: usize },
    #[error("Message text is not valid UTF-8")]
    InvalidUtf8,
    #[error("Checksum mismatch (expected {expected:#010x}, got {actual:#010x})")]
    ChecksumMismatch { expected: u32, actual: u32 },
    #[error("Payload too large (max {max}, got {actual})")]
    PayloadTooLarge { max: usize, actual: usize },
}

/// Failures reported asynchronously by a transport collaborator
///
/// Sends never return these; a transport reports them later through
/// [`TransportEvent::SendFailed`](crate::transport::TransportEvent::SendFailed).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum TransportError {
    #[error("Send to peer {peer} failed: {reason}")]
    SendFailed { peer: EndpointId, reason: String },
    #[error("Fan-out failed: {reason}")]
    BroadcastFailed { reason: String },
    #[error("Peer not connected: {peer}")]
    PeerNotConnected { peer: EndpointId },
}

impl TransportError {
    pub fn send_failed<R: Into<String>>(peer: EndpointId, reason: R) -> Self {
        TransportError::SendFailed {
            peer,
            reason: reason.into(),
        }
    }

    pub fn broadcast_failed<R: Into<String>>(reason: R) -> Self {
        TransportError::BroadcastFailed {
            reason: reason.into(),
        }
    }
}

// ----------------------------------------------------------------------------
// Main Error Type
// ----------------------------------------------------------------------------

/// Core error type for the mesh distribution core
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MeshError {
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("No route to node {address}")]
    NoRoute { address: NodeAddress },

    #[error("Message too large: {size} bytes encoded (max {max})")]
    MessageTooLarge { size: usize, max: usize },

    #[error("Envelope {source_address}/{sequence} was already sent or received")]
    DuplicateEnvelope {
        source_address: NodeAddress,
        sequence: u32,
    },

    #[error("Configuration error: {reason}")]
    Configuration { reason: String },
}

// ----------------------------------------------------------------------------
// Convenience Error Constructors
// ----------------------------------------------------------------------------

impl MeshError {
    /// Create a configuration error with a reason
    pub fn config_error<T: Into<String>>(reason: T) -> Self {
        MeshError::Configuration {
            reason: reason.into(),
        }
    }

    /// Create a no-route error for a direct send target
    pub fn no_route(address: NodeAddress) -> Self {
        MeshError::NoRoute { address }
    }

    /// Whether this error came from a malformed inbound payload
    pub fn is_decode(&self) -> bool {
        matches!(self, MeshError::Decode(_))
    }
}

// ----------------------------------------------------------------------------
// Type Aliases
// ----------------------------------------------------------------------------

pub type Result<T> = core::result::Result<T, MeshError>;
pub type MeshResult<T> = Result<T>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_errors_convert_into_mesh_errors() {
        let err: MeshError = DecodeError::InvalidUtf8.into();
        assert!(err.is_decode());
        assert_eq!(err.to_string(), "Decode error: Message text is not valid UTF-8");
    }

    #[test]
    fn no_route_names_the_address() {
        let err = MeshError::no_route(NodeAddress::new(12345));
        assert_eq!(err.to_string(), "No route to node 12345");
        assert!(!err.is_decode());
    }

    #[test]
    fn transport_errors_name_the_peer() {
        let err = TransportError::send_failed(EndpointId::from("AA:BB"), "socket closed");
        assert_eq!(err.to_string(), "Send to peer AA:BB failed: socket closed");
        let err = TransportError::PeerNotConnected {
            peer: EndpointId::from("CC:DD"),
        };
        assert_eq!(err.to_string(), "Peer not connected: CC:DD");
    }
}

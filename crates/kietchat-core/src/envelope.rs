//! Message envelope, the unit of mesh transport

use serde::{Deserialize, Serialize};

use crate::types::{DedupKey, NodeAddress};

/// Addressed, sequenced chat message
///
/// Envelopes are immutable once built: either by the outbound composer for
/// local sends or by the wire decoder for inbound payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageEnvelope {
    source: NodeAddress,
    destination: NodeAddress,
    sequence: u32,
    text: String,
}

impl MessageEnvelope {
    pub fn new<T: Into<String>>(
        source: NodeAddress,
        destination: NodeAddress,
        sequence: u32,
        text: T,
    ) -> Self {
        Self {
            source,
            destination,
            sequence,
            text: text.into(),
        }
    }

    /// Shorthand for an envelope addressed to every node
    pub fn broadcast<T: Into<String>>(source: NodeAddress, sequence: u32, text: T) -> Self {
        Self::new(source, NodeAddress::BROADCAST, sequence, text)
    }

    pub fn source(&self) -> NodeAddress {
        self.source
    }

    pub fn destination(&self) -> NodeAddress {
        self.destination
    }

    pub fn sequence(&self) -> u32 {
        self.sequence
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_broadcast(&self) -> bool {
        self.destination.is_broadcast()
    }

    /// Whether the local node at `address` should surface this envelope
    pub fn is_for(&self, address: NodeAddress) -> bool {
        self.is_broadcast() || self.destination == address
    }

    pub fn dedup_key(&self) -> DedupKey {
        DedupKey::new(self.source, self.sequence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn broadcast_envelope_is_for_everyone() {
        let envelope = MessageEnvelope::broadcast(NodeAddress::new(500), 42, "hi");
        assert!(envelope.is_broadcast());
        assert!(envelope.is_for(NodeAddress::new(1)));
        assert_eq!(envelope.dedup_key(), DedupKey::new(NodeAddress::new(500), 42));
    }

    #[test]
    fn direct_envelope_is_only_for_target() {
        let envelope =
            MessageEnvelope::new(NodeAddress::new(500), NodeAddress::new(600), 1, "psst");
        assert!(!envelope.is_broadcast());
        assert!(envelope.is_for(NodeAddress::new(600)));
        assert!(!envelope.is_for(NodeAddress::new(700)));
    }
}

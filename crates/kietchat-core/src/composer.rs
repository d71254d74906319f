//! Outbound composer
//!
//! Turns a local user action into an addressed envelope. Sequence numbers
//! start at a random offset and step by one, so a composer never repeats a
//! sequence until it has issued 2^32 of them and a restarted node does not
//! reuse the previous session's keys.

use rand_core::{OsRng, RngCore};

use crate::envelope::MessageEnvelope;
use crate::node::LocalNode;
use crate::types::NodeAddress;

#[derive(Debug, Clone)]
pub struct OutboundComposer {
    next_sequence: u32,
    issued: u64,
}

impl OutboundComposer {
    pub fn new() -> Self {
        Self::with_rng(&mut OsRng)
    }

    /// Create a composer whose first sequence is drawn from `rng`
    pub fn with_rng<R: RngCore + ?Sized>(rng: &mut R) -> Self {
        Self::starting_at(rng.next_u32())
    }

    pub fn starting_at(sequence: u32) -> Self {
        Self {
            next_sequence: sequence,
            issued: 0,
        }
    }

    pub fn compose_broadcast<T: Into<String>>(
        &mut self,
        local_node: &LocalNode,
        text: T,
    ) -> MessageEnvelope {
        self.compose_direct(local_node, NodeAddress::BROADCAST, text)
    }

    pub fn compose_direct<T: Into<String>>(
        &mut self,
        local_node: &LocalNode,
        target: NodeAddress,
        text: T,
    ) -> MessageEnvelope {
        let sequence = self.fresh_sequence();
        MessageEnvelope::new(local_node.address, target, sequence, text)
    }

    /// Number of sequences issued so far
    pub fn issued(&self) -> u64 {
        self.issued
    }

    fn fresh_sequence(&mut self) -> u32 {
        let sequence = self.next_sequence;
        self.next_sequence = sequence.wrapping_add(1);
        self.issued += 1;
        sequence
    }
}

impl Default for OutboundComposer {
    fn default() -> Self {
        Self::new()
    }
}

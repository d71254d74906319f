//! Core types for the mesh distribution core
//!
//! Newtypes keep logical node addresses, transport endpoints and dedup keys
//! from being mixed up at call sites.

use core::fmt;
use core::ops::{Add, Sub};
use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::errors::MeshError;

// ----------------------------------------------------------------------------
// Node Address
// ----------------------------------------------------------------------------

/// Session-local logical address of a chat node
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeAddress(u32);

impl NodeAddress {
    /// Reserved destination meaning "every node"
    pub const BROADCAST: Self = Self(u32::MAX);

    /// Create an address from its raw value
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Get the raw value
    pub const fn value(&self) -> u32 {
        self.0
    }

    /// Whether this is the broadcast sentinel
    pub const fn is_broadcast(&self) -> bool {
        self.0 == u32::MAX
    }
}

impl fmt::Display for NodeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_broadcast() {
            write!(f, "broadcast")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

impl FromStr for NodeAddress {
    type Err = MeshError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("broadcast") {
            return Ok(Self::BROADCAST);
        }
        trimmed
            .parse::<u32>()
            .map(Self)
            .map_err(|_| MeshError::config_error(format!("Invalid node address: {s}")))
    }
}

impl From<u32> for NodeAddress {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}

// ----------------------------------------------------------------------------
// Endpoint Identifier
// ----------------------------------------------------------------------------

/// Opaque transport-level connection identifier (e.g. a hardware address)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EndpointId(String);

impl EndpointId {
    pub fn new<T: Into<String>>(id: T) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EndpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EndpointId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for EndpointId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

// ----------------------------------------------------------------------------
// Dedup Key
// ----------------------------------------------------------------------------

/// The (source, sequence) pair that uniquely identifies an envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DedupKey {
    pub source: NodeAddress,
    pub sequence: u32,
}

impl DedupKey {
    pub fn new(source: NodeAddress, sequence: u32) -> Self {
        Self { source, sequence }
    }
}

impl fmt::Display for DedupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.source, self.sequence)
    }
}

// ----------------------------------------------------------------------------
// Timestamp
// ----------------------------------------------------------------------------

/// Millisecond timestamp since Unix epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(u64);

impl Add<u64> for Timestamp {
    type Output = Timestamp;

    fn add(self, other: u64) -> Timestamp {
        Timestamp(self.0 + other)
    }
}

impl Sub for Timestamp {
    type Output = u64;

    fn sub(self, other: Timestamp) -> u64 {
        self.0.saturating_sub(other.0)
    }
}

impl Timestamp {
    pub fn new(millis: u64) -> Self {
        Self(millis)
    }

    /// Get current wall-clock timestamp
    pub fn now() -> Self {
        use std::time::{SystemTime, UNIX_EPOCH};
        let duration = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Self(duration.as_millis() as u64)
    }

    pub fn as_millis(&self) -> u64 {
        self.0
    }

    /// `HH:MM` (UTC) label shown next to chat lines
    pub fn clock_label(&self) -> String {
        let minutes_of_day = (self.0 / 60_000) % (24 * 60);
        format!("{:02}:{:02}", minutes_of_day / 60, minutes_of_day % 60)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

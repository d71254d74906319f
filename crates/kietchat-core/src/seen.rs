//! Bounded seen-set for envelope deduplication
//!
//! Tracks the dedup keys of every envelope this node has delivered or
//! relayed so that a flood arriving over several links is handled once.
//! The set holds at most `capacity` keys and evicts the oldest first, so the
//! at-most-once guarantee covers the most recent `capacity` envelopes.

use std::collections::VecDeque;

use hashbrown::HashSet;
use serde::{Deserialize, Serialize};

use crate::types::DedupKey;

// ----------------------------------------------------------------------------
// Constants
// ----------------------------------------------------------------------------

/// Default number of keys retained
pub const DEFAULT_SEEN_CAPACITY: usize = 4096;

// ----------------------------------------------------------------------------
// Statistics
// ----------------------------------------------------------------------------

/// Statistics for seen-set behaviour
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeenSetStats {
    /// Keys checked
    pub keys_checked: u64,
    /// Keys found already present
    pub duplicates_detected: u64,
    /// Keys dropped to respect the capacity
    pub evictions: u64,
}

impl SeenSetStats {
    pub fn duplicate_rate(&self) -> f64 {
        if self.keys_checked == 0 {
            0.0
        } else {
            (self.duplicates_detected as f64) / (self.keys_checked as f64)
        }
    }
}

// ----------------------------------------------------------------------------
// Seen Set
// ----------------------------------------------------------------------------

/// Insertion-ordered set of dedup keys with oldest-first eviction
#[derive(Debug, Clone)]
pub struct SeenSet {
    keys: HashSet<DedupKey>,
    order: VecDeque<DedupKey>,
    capacity: usize,
    stats: SeenSetStats,
}

impl SeenSet {
    /// Create a seen-set holding at most `capacity` keys (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            keys: HashSet::with_capacity(capacity.min(DEFAULT_SEEN_CAPACITY)),
            order: VecDeque::with_capacity(capacity.min(DEFAULT_SEEN_CAPACITY)),
            capacity,
            stats: SeenSetStats::default(),
        }
    }

    /// Check if a key is a duplicate and record it otherwise
    /// Returns true if the key was already present
    pub fn check_and_add(&mut self, key: DedupKey) -> bool {
        self.stats.keys_checked += 1;

        if self.keys.contains(&key) {
            self.stats.duplicates_detected += 1;
            return true;
        }

        self.keys.insert(key);
        self.order.push_back(key);

        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.keys.remove(&oldest);
                self.stats.evictions += 1;
            }
        }

        false
    }

    /// Check for a key without recording it
    pub fn contains(&self, key: &DedupKey) -> bool {
        self.keys.contains(key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn stats(&self) -> &SeenSetStats {
        &self.stats
    }
}

impl Default for SeenSet {
    fn default() -> Self {
        Self::new(DEFAULT_SEEN_CAPACITY)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NodeAddress;

    fn key(source: u32, sequence: u32) -> DedupKey {
        DedupKey::new(NodeAddress::new(source), sequence)
    }

    #[test]
    fn test_first_sighting_is_not_duplicate() {
        let mut seen = SeenSet::new(16);

        assert!(!seen.check_and_add(key(500, 42)));
        assert!(seen.check_and_add(key(500, 42)));
        assert_eq!(seen.stats().keys_checked, 2);
        assert_eq!(seen.stats().duplicates_detected, 1);
    }

    #[test]
    fn test_same_sequence_different_source_is_distinct() {
        let mut seen = SeenSet::new(16);

        assert!(!seen.check_and_add(key(500, 1)));
        assert!(!seen.check_and_add(key(600, 1)));
        assert_eq!(seen.len(), 2);
    }

    #[test]
    fn test_oldest_key_is_evicted_at_capacity() {
        let mut seen = SeenSet::new(3);
        for sequence in 0..4 {
            seen.check_and_add(key(1, sequence));
        }

        assert_eq!(seen.len(), 3);
        assert!(!seen.contains(&key(1, 0)));
        assert!(seen.contains(&key(1, 3)));
        assert_eq!(seen.stats().evictions, 1);
    }

    #[test]
    fn test_duplicate_does_not_refresh_position() {
        let mut seen = SeenSet::new(2);
        seen.check_and_add(key(1, 1));
        seen.check_and_add(key(1, 2));
        assert!(seen.check_and_add(key(1, 1)));
        seen.check_and_add(key(1, 3));

        assert!(!seen.contains(&key(1, 1)));
        assert!(seen.contains(&key(1, 2)));
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let mut seen = SeenSet::new(0);
        assert_eq!(seen.capacity(), 1);
        assert!(!seen.check_and_add(key(1, 1)));
        assert!(seen.check_and_add(key(1, 1)));
    }

    #[test]
    fn test_duplicate_rate() {
        let stats = SeenSetStats {
            keys_checked: 10,
            duplicates_detected: 4,
            evictions: 0,
        };
        assert_eq!(stats.duplicate_rate(), 0.4);
        assert_eq!(SeenSetStats::default().duplicate_rate(), 0.0);
    }
}

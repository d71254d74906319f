//! Ordered message log
//!
//! Append-only record of accepted envelopes in local acceptance order. The
//! relay engine only ever appends; nothing is reordered or removed.

use serde::{Deserialize, Serialize};

use crate::envelope::MessageEnvelope;
use crate::types::{EndpointId, Timestamp};

/// Where an accepted envelope came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageOrigin {
    /// Sent by the local user
    Local,
    /// Received over the link to `endpoint`
    Remote { endpoint: EndpointId },
}

/// One accepted chat line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub envelope: MessageEnvelope,
    /// Display name shown next to the text
    pub sender: String,
    pub origin: MessageOrigin,
    pub accepted_at: Timestamp,
}

impl LogEntry {
    pub fn is_self_originated(&self) -> bool {
        self.origin == MessageOrigin::Local
    }

    /// `[HH:MM] name: text`
    pub fn render(&self) -> String {
        format!(
            "[{}] {}: {}",
            self.accepted_at.clock_label(),
            self.sender,
            self.envelope.text()
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct MessageLog {
    entries: Vec<LogEntry>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, entry: LogEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn last(&self) -> Option<&LogEntry> {
        self.entries.last()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NodeAddress;

    fn entry(text: &str, origin: MessageOrigin) -> LogEntry {
        LogEntry {
            envelope: MessageEnvelope::broadcast(NodeAddress::new(1), 1, text),
            sender: "Peer1".to_string(),
            origin,
            accepted_at: Timestamp::new(9 * 3_600_000 + 30 * 60_000),
        }
    }

    #[test]
    fn appends_in_order() {
        let mut log = MessageLog::new();
        log.append(entry("one", MessageOrigin::Local));
        log.append(entry(
            "two",
            MessageOrigin::Remote {
                endpoint: EndpointId::from("AA:BB"),
            },
        ));

        let texts: Vec<&str> = log.iter().map(|e| e.envelope.text()).collect();
        assert_eq!(texts, vec!["one", "two"]);
        assert!(log.entries()[0].is_self_originated());
        assert!(!log.last().unwrap().is_self_originated());
    }

    #[test]
    fn renders_time_sender_and_text() {
        let line = entry("hello", MessageOrigin::Local).render();
        assert_eq!(line, "[09:30] Peer1: hello");
    }
}

//! Observer events and subscriptions
//!
//! The relay engine publishes [`ChatEvent`]s to every live subscription.
//! Each subscription is an unbounded channel, so publishing never blocks the
//! engine's critical section and events arrive in publication order.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, error::TryRecvError, UnboundedReceiver, UnboundedSender};

use crate::errors::TransportError;
use crate::types::{EndpointId, NodeAddress};

// ----------------------------------------------------------------------------
// Events
// ----------------------------------------------------------------------------

/// A chat line accepted into the local log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptedMessage {
    pub display_name: String,
    pub text: String,
    pub self_originated: bool,
    pub source: NodeAddress,
    pub destination: NodeAddress,
    pub sequence: u32,
}

/// Events delivered to observers of a relay engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChatEvent {
    /// A new envelope was accepted (at most once per dedup key)
    MessageAccepted(AcceptedMessage),
    /// A peer link came up
    PeerJoined {
        endpoint: EndpointId,
        display_name: String,
    },
    /// A peer link went down
    PeerLeft {
        endpoint: EndpointId,
        display_name: String,
    },
    /// A local send could not be delivered
    SendFailed {
        destination: NodeAddress,
        text: String,
        reason: String,
    },
    /// The transport reported a failed send or fan-out
    TransportFailed {
        endpoint: Option<EndpointId>,
        error: TransportError,
    },
    /// An inbound payload was malformed and dropped
    PayloadRejected {
        endpoint: EndpointId,
        display_name: String,
        reason: String,
    },
}

impl ChatEvent {
    pub fn as_accepted(&self) -> Option<&AcceptedMessage> {
        match self {
            ChatEvent::MessageAccepted(message) => Some(message),
            _ => None,
        }
    }

    /// One-line status text for a chat UI
    pub fn status_line(&self) -> String {
        match self {
            ChatEvent::MessageAccepted(message) => {
                format!("{}: {}", message.display_name, message.text)
            }
            ChatEvent::PeerJoined { display_name, .. } => {
                format!("Connected to {display_name}")
            }
            ChatEvent::PeerLeft { display_name, .. } => {
                format!("Disconnected from {display_name}")
            }
            ChatEvent::SendFailed { reason, .. } => format!("Send failed: {reason}"),
            ChatEvent::TransportFailed {
                endpoint: Some(endpoint),
                error,
            } => format!("Link to {endpoint} failed: {error}"),
            ChatEvent::TransportFailed {
                endpoint: None,
                error,
            } => format!("Transport failed: {error}"),
            ChatEvent::PayloadRejected {
                display_name,
                reason,
                ..
            } => format!("Dropped malformed message from {display_name}: {reason}"),
        }
    }
}

// ----------------------------------------------------------------------------
// Subscriptions
// ----------------------------------------------------------------------------

/// Handle identifying a subscription for `unsubscribe`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

/// Receiving side of an observer subscription
#[derive(Debug)]
pub struct Subscription {
    id: SubscriptionId,
    receiver: UnboundedReceiver<ChatEvent>,
}

impl Subscription {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Wait for the next event; `None` once unsubscribed and drained
    pub async fn recv(&mut self) -> Option<ChatEvent> {
        self.receiver.recv().await
    }

    /// Take the next event if one is queued
    pub fn try_recv(&mut self) -> Option<ChatEvent> {
        match self.receiver.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Take every queued event
    pub fn drain(&mut self) -> Vec<ChatEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.try_recv() {
            events.push(event);
        }
        events
    }
}

/// Subscription list owned by the relay engine
#[derive(Debug, Default)]
pub struct EventBus {
    subscribers: Vec<(SubscriptionId, UnboundedSender<ChatEvent>)>,
    next_id: u64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self) -> Subscription {
        let (sender, receiver) = mpsc::unbounded_channel();
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.subscribers.push((id, sender));
        Subscription { id, receiver }
    }

    /// Remove a subscription; returns false if it was already gone
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(existing, _)| *existing != id);
        self.subscribers.len() != before
    }

    /// Deliver an event to every subscriber, pruning dropped receivers
    pub fn publish(&mut self, event: ChatEvent) {
        self.subscribers
            .retain(|(_, sender)| sender.send(event.clone()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn joined(name: &str) -> ChatEvent {
        ChatEvent::PeerJoined {
            endpoint: EndpointId::from("AA:BB"),
            display_name: name.to_string(),
        }
    }

    #[test]
    fn every_subscriber_sees_events_in_order() {
        let mut bus = EventBus::new();
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();

        bus.publish(joined("Peer1"));
        bus.publish(joined("Peer2"));

        assert_eq!(first.drain(), vec![joined("Peer1"), joined("Peer2")]);
        assert_eq!(second.drain(), vec![joined("Peer1"), joined("Peer2")]);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let mut bus = EventBus::new();
        let mut subscription = bus.subscribe();

        assert!(bus.unsubscribe(subscription.id()));
        assert!(!bus.unsubscribe(subscription.id()));
        bus.publish(joined("Peer1"));

        assert!(subscription.try_recv().is_none());
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn dropped_receivers_are_pruned() {
        let mut bus = EventBus::new();
        let subscription = bus.subscribe();
        let _kept = bus.subscribe();
        drop(subscription);

        bus.publish(joined("Peer1"));
        assert_eq!(bus.subscriber_count(), 1);
    }

    #[test]
    fn status_lines() {
        assert_eq!(joined("Peer1").status_line(), "Connected to Peer1");
        let failed = ChatEvent::SendFailed {
            destination: NodeAddress::new(700),
            text: "hi".into(),
            reason: "No route to node 700".into(),
        };
        assert_eq!(failed.status_line(), "Send failed: No route to node 700");
        let fan_out = ChatEvent::TransportFailed {
            endpoint: None,
            error: TransportError::broadcast_failed("adapter off"),
        };
        assert_eq!(fan_out.status_line(), "Transport failed: Fan-out failed: adapter off");
    }

    #[tokio::test]
    async fn recv_waits_for_event() {
        let mut bus = EventBus::new();
        let mut subscription = bus.subscribe();
        bus.publish(joined("Peer7"));
        assert_eq!(subscription.recv().await, Some(joined("Peer7")));
    }
}

//! Integration tests for the mesh core
//!
//! These tests drive a relay engine through its public API the way a transport
//! would: link events, raw inbound bytes, and local sends from several threads.

use std::sync::Arc;
use std::thread;

use kietchat_core::*;

mod test_utils;
use test_utils::{
    broadcast_bytes, create_test_engine, create_test_nodes, direct_bytes, endpoint, SentPayload,
};

// ----------------------------------------------------------------------------
// Deduplication
// ----------------------------------------------------------------------------

#[test]
fn test_same_envelope_from_many_peers_is_accepted_once() {
    let (engine, transport) = create_test_engine(500, MeshConfig::testing());
    let mut events = engine.subscribe();
    let bytes = broadcast_bytes(700, 17, "yo");

    let outcomes: Vec<InboundOutcome> = ["AA:BB", "CC:DD", "EE:FF", "AA:BB"]
        .iter()
        .map(|peer| engine.on_inbound_bytes(&endpoint(peer), &bytes).unwrap())
        .collect();

    assert_eq!(outcomes[0], InboundOutcome::Delivered { relayed: true });
    assert!(outcomes[1..]
        .iter()
        .all(|outcome| *outcome == InboundOutcome::Duplicate));

    let accepted: Vec<_> = events
        .drain()
        .into_iter()
        .filter(|event| event.as_accepted().is_some())
        .collect();
    assert_eq!(accepted.len(), 1);
    assert_eq!(engine.message_log().len(), 1);
    assert_eq!(transport.sent_count(), 1);
    assert_eq!(engine.stats().duplicates_suppressed, 3);
}

#[test]
fn test_same_sequence_from_different_sources_are_distinct() {
    let (engine, _transport) = create_test_engine(500, MeshConfig::testing());

    engine
        .on_inbound_bytes(&endpoint("AA:BB"), &broadcast_bytes(700, 1, "a"))
        .unwrap();
    engine
        .on_inbound_bytes(&endpoint("AA:BB"), &broadcast_bytes(701, 1, "b"))
        .unwrap();

    let texts: Vec<String> = engine
        .message_log()
        .iter()
        .map(|entry| entry.envelope.text().to_string())
        .collect();
    assert_eq!(texts, vec!["a", "b"]);
}

#[test]
fn test_evicted_key_is_accepted_again() {
    let (engine, _transport) =
        create_test_engine(500, MeshConfig::testing().with_seen_capacity(2));

    let first = broadcast_bytes(700, 1, "first");
    engine.on_inbound_bytes(&endpoint("AA:BB"), &first).unwrap();
    engine
        .on_inbound_bytes(&endpoint("AA:BB"), &broadcast_bytes(700, 2, "second"))
        .unwrap();
    engine
        .on_inbound_bytes(&endpoint("AA:BB"), &broadcast_bytes(700, 3, "third"))
        .unwrap();

    assert!(!engine.has_seen(&DedupKey::new(NodeAddress::new(700), 1)));
    let outcome = engine.on_inbound_bytes(&endpoint("CC:DD"), &first).unwrap();
    assert_eq!(outcome, InboundOutcome::Delivered { relayed: true });
    assert_eq!(engine.stats().seen.evictions, 2);
}

// ----------------------------------------------------------------------------
// Relay
// ----------------------------------------------------------------------------

#[test]
fn test_relay_excludes_sender_and_forwards_unchanged_bytes() {
    let (engine, transport) = create_test_engine(500, MeshConfig::flood_mesh());
    let bytes = direct_bytes(700, 800, 5, "pass it on");

    let outcome = engine.on_inbound_bytes(&endpoint("AA:BB"), &bytes).unwrap();

    assert_eq!(outcome, InboundOutcome::Delivered { relayed: true });
    assert_eq!(engine.message_log().len(), 1);
    assert_eq!(
        transport.sent(),
        vec![SentPayload::ToAllExcept {
            exclude: Some(endpoint("AA:BB")),
            payload: bytes,
        }]
    );
}

#[test]
fn test_local_send_then_echo_is_not_rebroadcast() {
    let (engine, transport) = create_test_engine(500, MeshConfig::flood_mesh());

    let envelope = engine.send_broadcast("loop?").unwrap();
    let echoed = WireFormat::encode(&envelope).unwrap();
    transport.clear();

    let outcome = engine.on_inbound_bytes(&endpoint("AA:BB"), &echoed).unwrap();

    assert_eq!(outcome, InboundOutcome::Duplicate);
    assert_eq!(transport.sent_count(), 0);
}

#[test]
fn test_star_topology_accepts_without_relaying() {
    let (engine, transport) = create_test_engine(500, MeshConfig::star());

    engine
        .on_inbound_bytes(&endpoint("AA:BB"), &broadcast_bytes(700, 1, "hello"))
        .unwrap();
    engine.send_broadcast("reply").unwrap();

    assert_eq!(
        transport
            .sent()
            .iter()
            .filter(|sent| matches!(sent, SentPayload::ToAllExcept { exclude: None, .. }))
            .count(),
        1
    );
    assert_eq!(transport.sent_count(), 1);
    assert_eq!(engine.message_log().len(), 2);
}

// ----------------------------------------------------------------------------
// Naming and Logging
// ----------------------------------------------------------------------------

#[test]
fn test_sender_name_is_stable_while_connected() {
    let (engine, _transport) = create_test_engine(500, MeshConfig::testing());
    engine.on_peer_connected(&endpoint("AA:BB"));
    engine.on_peer_connected(&endpoint("CC:DD"));

    for sequence in 0..5 {
        engine
            .on_inbound_bytes(&endpoint("AA:BB"), &broadcast_bytes(700, sequence, "x"))
            .unwrap();
    }

    let log = engine.message_log();
    assert_eq!(log.len(), 5);
    assert!(log.iter().all(|entry| entry.sender == "Peer1"));
    assert_eq!(engine.display_name_of(&endpoint("CC:DD")), "Peer2");
}

#[test]
fn test_log_preserves_acceptance_order() {
    let (engine, transport) = create_test_engine(500, MeshConfig::testing());
    transport.add_peer(endpoint("AA:BB"));

    engine.send_broadcast("one").unwrap();
    engine
        .on_inbound_bytes(&endpoint("AA:BB"), &broadcast_bytes(700, 1, "two"))
        .unwrap();
    engine.send_broadcast("three").unwrap();

    let log = engine.message_log();
    let lines: Vec<(&str, bool)> = log
        .iter()
        .map(|entry| (entry.envelope.text(), entry.is_self_originated()))
        .collect();
    assert_eq!(lines, vec![("one", true), ("two", false), ("three", true)]);
    assert!(log[1].render().ends_with("] Peer1: two"));
}

#[test]
fn test_unlinked_sender_is_not_registered() {
    let (engine, transport) = create_test_engine(500, MeshConfig::testing());
    transport.add_peer(endpoint("AA:BB"));
    let mut events = engine.subscribe();

    engine
        .on_inbound_bytes(&endpoint("AA:BB"), &broadcast_bytes(700, 1, "linked"))
        .unwrap();
    engine
        .on_inbound_bytes(&endpoint("EE:FF"), &broadcast_bytes(701, 1, "stray"))
        .unwrap();

    let senders: Vec<String> = engine
        .message_log()
        .iter()
        .map(|entry| entry.sender.clone())
        .collect();
    assert_eq!(senders, vec!["Peer1".to_string(), UNKNOWN_PEER_NAME.to_string()]);
    assert_eq!(engine.connected_peers().len(), 1);
    let joined = events
        .drain()
        .into_iter()
        .filter(|event| matches!(event, ChatEvent::PeerJoined { .. }))
        .count();
    assert_eq!(joined, 1);
}

#[test]
fn test_connected_peers_listing_reflects_churn() {
    let (engine, _transport) = create_test_engine(500, MeshConfig::testing());
    engine.on_peer_connected(&endpoint("AA:BB"));
    engine.on_peer_connected(&endpoint("CC:DD"));
    engine.on_peer_disconnected(&endpoint("AA:BB"));

    let names: Vec<String> = engine
        .connected_peers()
        .into_iter()
        .map(|peer| peer.display_name)
        .collect();
    assert_eq!(names, vec!["Peer2"]);
    assert_eq!(engine.display_name_of(&endpoint("AA:BB")), UNKNOWN_PEER_NAME);
}

// ----------------------------------------------------------------------------
// Concurrency
// ----------------------------------------------------------------------------

#[test]
fn test_concurrent_deliveries_accept_exactly_once() {
    let (engine, transport) = create_test_engine(500, MeshConfig::flood_mesh());
    let engine = Arc::new(engine);
    let mut events = engine.subscribe();
    let bytes = Arc::new(broadcast_bytes(700, 99, "race"));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let engine = Arc::clone(&engine);
            let bytes = Arc::clone(&bytes);
            thread::spawn(move || {
                let peer = endpoint(&format!("00:{i:02X}"));
                engine.on_inbound_bytes(&peer, &bytes).unwrap()
            })
        })
        .collect();

    let outcomes: Vec<InboundOutcome> = handles
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .collect();

    let delivered = outcomes
        .iter()
        .filter(|outcome| matches!(outcome, InboundOutcome::Delivered { .. }))
        .count();
    assert_eq!(delivered, 1);
    assert_eq!(
        events
            .drain()
            .iter()
            .filter(|event| event.as_accepted().is_some())
            .count(),
        1
    );
    assert_eq!(transport.sent_count(), 1);
}

#[test]
fn test_concurrent_local_sends_all_get_unique_keys() {
    let (engine, transport) = create_test_engine(500, MeshConfig::testing());
    let engine = Arc::new(engine);

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                (0..25)
                    .map(|i| engine.send_broadcast(format!("t{t} m{i}")).unwrap())
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut sequences: Vec<u32> = handles
        .into_iter()
        .flat_map(|handle| handle.join().unwrap())
        .map(|envelope| envelope.sequence())
        .collect();
    sequences.sort_unstable();
    sequences.dedup();

    assert_eq!(sequences.len(), 100);
    assert_eq!(transport.sent_count(), 100);
    assert_eq!(engine.stats().local_sends, 100);
}

// ----------------------------------------------------------------------------
// Nodes
// ----------------------------------------------------------------------------

#[test]
fn test_generated_nodes_are_deterministic_and_in_range() {
    let first = create_test_nodes(5);
    let second = create_test_nodes(5);
    assert_eq!(first, second);
    assert!(first
        .iter()
        .all(|node| (10_000..=99_999).contains(&node.address.value())));
}

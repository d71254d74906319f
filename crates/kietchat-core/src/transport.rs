//! Transport abstraction for the mesh core
//!
//! The relay engine never talks to sockets or GATT characteristics directly.
//! A transport moves opaque byte payloads between directly connected
//! endpoints and reports link changes back as [`TransportEvent`]s.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use uuid::Uuid;

use crate::errors::TransportError;
use crate::types::{EndpointId, NodeAddress};

// ----------------------------------------------------------------------------
// Service Identifiers
// ----------------------------------------------------------------------------

/// GATT service carrying chat payloads
pub const CHAT_SERVICE_UUID: Uuid = Uuid::from_u128(0x0000abcd_0000_1000_8000_00805f9b34fb);

/// GATT characteristic written with chat payloads
pub const MESSAGE_CHARACTERISTIC_UUID: Uuid =
    Uuid::from_u128(0x0000dcba_0000_1000_8000_00805f9b34fb);

/// RFCOMM serial port profile used by socket links
pub const SERIAL_PORT_PROFILE_UUID: Uuid = Uuid::from_u128(0x00001101_0000_1000_8000_00805f9b34fb);

/// RFCOMM service record name
pub const RFCOMM_SERVICE_NAME: &str = "KIETChat";

// ----------------------------------------------------------------------------
// Transport Trait
// ----------------------------------------------------------------------------

/// Byte-delivery collaborator consumed by the relay engine
///
/// Sends are fire-and-forget: implementations must not block the caller on
/// I/O. Failures are reported later as [`TransportEvent::SendFailed`].
pub trait MeshTransport: Send + Sync {
    /// Send a payload to one directly connected peer
    fn send_to_peer(&self, peer: &EndpointId, payload: &[u8]);

    /// Send a payload to every connected peer except `exclude`
    fn send_to_all_except(&self, exclude: Option<&EndpointId>, payload: &[u8]);

    /// Currently reachable endpoints
    fn connected_peers(&self) -> SmallVec<[EndpointId; 8]>;
}

impl<T: MeshTransport + ?Sized> MeshTransport for std::sync::Arc<T> {
    fn send_to_peer(&self, peer: &EndpointId, payload: &[u8]) {
        (**self).send_to_peer(peer, payload)
    }

    fn send_to_all_except(&self, exclude: Option<&EndpointId>, payload: &[u8]) {
        (**self).send_to_all_except(exclude, payload)
    }

    fn connected_peers(&self) -> SmallVec<[EndpointId; 8]> {
        (**self).connected_peers()
    }
}

// ----------------------------------------------------------------------------
// Transport Events
// ----------------------------------------------------------------------------

/// Events a transport delivers to the relay engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransportEvent {
    /// A link to `peer` came up
    Connected { peer: EndpointId },
    /// The link to `peer` went down
    Disconnected { peer: EndpointId },
    /// The link handshake revealed the logical address behind `peer`
    AddressLearned {
        peer: EndpointId,
        address: NodeAddress,
    },
    /// Raw bytes arrived from `peer`
    BytesReceived { peer: EndpointId, payload: Vec<u8> },
    /// An earlier send to `peer` (or a fan-out, if `None`) failed
    SendFailed {
        peer: Option<EndpointId>,
        error: TransportError,
    },
}

impl TransportEvent {
    /// Endpoint the event concerns, if any
    pub fn peer(&self) -> Option<&EndpointId> {
        match self {
            TransportEvent::Connected { peer }
            | TransportEvent::Disconnected { peer }
            | TransportEvent::AddressLearned { peer, .. }
            | TransportEvent::BytesReceived { peer, .. } => Some(peer),
            TransportEvent::SendFailed { peer, .. } => peer.as_ref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_identifiers_match_bluetooth_base_uuid() {
        assert_eq!(
            CHAT_SERVICE_UUID.to_string(),
            "0000abcd-0000-1000-8000-00805f9b34fb"
        );
        assert_eq!(
            MESSAGE_CHARACTERISTIC_UUID.to_string(),
            "0000dcba-0000-1000-8000-00805f9b34fb"
        );
        assert_eq!(
            SERIAL_PORT_PROFILE_UUID.to_string(),
            "00001101-0000-1000-8000-00805f9b34fb"
        );
    }

    #[test]
    fn event_peer_accessor() {
        let peer = EndpointId::from("AA:BB");
        let event = TransportEvent::BytesReceived {
            peer: peer.clone(),
            payload: vec![1, 2, 3],
        };
        assert_eq!(event.peer(), Some(&peer));

        let fan_out = TransportEvent::SendFailed {
            peer: None,
            error: TransportError::broadcast_failed("adapter off"),
        };
        assert_eq!(fan_out.peer(), None);
    }
}

//! Wire format for message envelopes
//!
//! Layout (version 1, big-endian):
//!
//! ```text
//! offset  size  field
//! 0       1     version
//! 1       4     source address
//! 5       4     destination address (0xFFFFFFFF = broadcast)
//! 9       4     sequence number
//! 13      2     text length N
//! 15      N     UTF-8 text
//! 15+N    4     CRC-32 over bytes [0, 15+N)
//! ```

use crate::envelope::MessageEnvelope;
use crate::errors::{DecodeError, MeshError, Result};
use crate::types::NodeAddress;

// ----------------------------------------------------------------------------
// Constants
// ----------------------------------------------------------------------------

/// Current wire format version
pub const WIRE_VERSION: u8 = 1;

/// Fixed header size before the text
pub const HEADER_SIZE: usize = 15;

/// Size of the trailing CRC-32
pub const CHECKSUM_SIZE: usize = 4;

/// Smallest valid encoded envelope (empty text)
pub const MIN_ENCODED_SIZE: usize = HEADER_SIZE + CHECKSUM_SIZE;

/// Longest text the length prefix can describe
pub const MAX_TEXT_BYTES: usize = u16::MAX as usize;

// ----------------------------------------------------------------------------
// Wire Format Codec
// ----------------------------------------------------------------------------

/// Binary wire format encoder/decoder for [`MessageEnvelope`]
pub struct WireFormat;

impl WireFormat {
    /// Size in bytes of the encoded form of `envelope`
    pub fn encoded_len(envelope: &MessageEnvelope) -> usize {
        MIN_ENCODED_SIZE + envelope.text().len()
    }

    /// Encode an envelope to its wire bytes
    pub fn encode(envelope: &MessageEnvelope) -> Result<Vec<u8>> {
        let text = envelope.text().as_bytes();
        if text.len() > MAX_TEXT_BYTES {
            return Err(MeshError::MessageTooLarge {
                size: Self::encoded_len(envelope),
                max: MAX_TEXT_BYTES + MIN_ENCODED_SIZE,
            });
        }

        let mut bytes = Vec::with_capacity(Self::encoded_len(envelope));
        bytes.push(WIRE_VERSION);
        bytes.extend_from_slice(&envelope.source().value().to_be_bytes());
        bytes.extend_from_slice(&envelope.destination().value().to_be_bytes());
        bytes.extend_from_slice(&envelope.sequence().to_be_bytes());
        bytes.extend_from_slice(&(text.len() as u16).to_be_bytes());
        bytes.extend_from_slice(text);

        let checksum = crc32fast::hash(&bytes);
        bytes.extend_from_slice(&checksum.to_be_bytes());

        Ok(bytes)
    }

    /// Decode wire bytes into an envelope
    pub fn decode(bytes: &[u8]) -> core::result::Result<MessageEnvelope, DecodeError> {
        if bytes.is_empty() {
            return Err(DecodeError::Empty);
        }

        let version = bytes[0];
        if version != WIRE_VERSION {
            return Err(DecodeError::UnsupportedVersion { version });
        }

        if bytes.len() < HEADER_SIZE {
            return Err(DecodeError::Truncated {
                expected: MIN_ENCODED_SIZE,
                actual: bytes.len(),
            });
        }

        let source = read_u32(bytes, 1);
        let destination = read_u32(bytes, 5);
        let sequence = read_u32(bytes, 9);
        let text_len = u16::from_be_bytes([bytes[13], bytes[14]]) as usize;

        let body_end = HEADER_SIZE + text_len;
        let total = body_end + CHECKSUM_SIZE;
        if bytes.len() < total {
            return Err(DecodeError::Truncated {
                expected: total,
                actual: bytes.len(),
            });
        }
        if bytes.len() > total {
            return Err(DecodeError::TrailingBytes {
                extra: bytes.len() - total,
            });
        }

        let expected = read_u32(bytes, body_end);
        let actual = crc32fast::hash(&bytes[..body_end]);
        if expected != actual {
            return Err(DecodeError::ChecksumMismatch { expected, actual });
        }

        let text = core::str::from_utf8(&bytes[HEADER_SIZE..body_end])
            .map_err(|_| DecodeError::InvalidUtf8)?;

        Ok(MessageEnvelope::new(
            NodeAddress::new(source),
            NodeAddress::new(destination),
            sequence,
            text,
        ))
    }
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_be_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}

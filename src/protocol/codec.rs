//! Bit-exact binary codec for [`Packet`].
//!
//! Layout, big-endian throughout:
//!
//! ```text
//! version(1) type(1) ttl(1) timestamp(8) flags(1) payload_len(2)
//! sender_id(8) [recipient_id(8)] payload(payload_len) [signature(64)]
//! ```
//!
//! The fixed header size is derived from the field widths below rather than
//! maintained as a separate literal.

use super::{Packet, PacketType, PeerId, MAX_TTL, PEER_ID_SIZE, PROTOCOL_VERSION, SIGNATURE_SIZE};
use crate::utils::{ProtocolError, Result};

const VERSION_SIZE: usize = 1;
const TYPE_SIZE: usize = 1;
const TTL_SIZE: usize = 1;
const TIMESTAMP_SIZE: usize = 8;
const FLAGS_SIZE: usize = 1;
const PAYLOAD_LEN_SIZE: usize = 2;

/// Bytes before the sender identifier
pub const FIXED_HEADER_SIZE: usize =
    VERSION_SIZE + TYPE_SIZE + TTL_SIZE + TIMESTAMP_SIZE + FLAGS_SIZE + PAYLOAD_LEN_SIZE;

/// Smallest buffer that can hold a packet
pub const MIN_PACKET_SIZE: usize = FIXED_HEADER_SIZE + PEER_ID_SIZE;

/// Header flag bits
pub mod flags {
    /// A recipient identifier follows the sender identifier
    pub const HAS_RECIPIENT: u8 = 0x01;
    /// A signature follows the payload
    pub const HAS_SIGNATURE: u8 = 0x02;
    /// Payload is compressed. Never set on encode; decompression is not
    /// implemented, so decode passes such payloads through untouched.
    pub const IS_COMPRESSED: u8 = 0x04;
}

/// Encoded size of a packet with the given shape
pub fn encoded_len(payload_len: usize, has_recipient: bool, has_signature: bool) -> usize {
    let mut size = MIN_PACKET_SIZE + payload_len;
    if has_recipient {
        size += PEER_ID_SIZE;
    }
    if has_signature {
        size += SIGNATURE_SIZE;
    }
    size
}

/// Serialize a packet to its wire form.
///
/// The only failure is a payload longer than the 16-bit length field can
/// express; the 500-byte application cap is checked by [`Packet::validate`].
///
/// # Errors
///
/// `ProtocolError::PayloadTooLarge` if the payload does not fit the 16-bit length field
pub fn encode(packet: &Packet) -> Result<Vec<u8>> {
    let payload_len =
        u16::try_from(packet.payload.len()).map_err(|_| ProtocolError::PayloadTooLarge {
            size: packet.payload.len(),
            max: usize::from(u16::MAX),
        })?;

    let mut packet_flags = 0u8;
    if packet.recipient_id.is_some() {
        packet_flags |= flags::HAS_RECIPIENT;
    }
    if packet.signature.is_some() {
        packet_flags |= flags::HAS_SIGNATURE;
    }

    let size = encoded_len(
        packet.payload.len(),
        packet.recipient_id.is_some(),
        packet.signature.is_some(),
    );
    let mut buf = Vec::with_capacity(size);

    buf.push(packet.version);
    buf.push(packet.packet_type.code());
    buf.push(packet.ttl);
    buf.extend_from_slice(&packet.timestamp.to_be_bytes());
    buf.push(packet_flags);
    buf.extend_from_slice(&payload_len.to_be_bytes());
    buf.extend_from_slice(packet.sender_id.as_bytes());
    if let Some(recipient) = &packet.recipient_id {
        buf.extend_from_slice(recipient.as_bytes());
    }
    buf.extend_from_slice(&packet.payload);
    if let Some(signature) = &packet.signature {
        buf.extend_from_slice(signature);
    }

    debug_assert_eq!(buf.len(), size);
    log::trace!(
        "Encoded {} packet: {} bytes",
        packet.packet_type,
        buf.len()
    );
    Ok(buf)
}

/// Parse a datagram, returning `None` for anything malformed.
///
/// A `None` means "drop this datagram"; it never warrants disconnecting.
pub fn decode(data: &[u8]) -> Option<Packet> {
    match decode_packet(data) {
        Ok(packet) => Some(packet),
        Err(e) => {
            log::warn!("Dropping undecodable datagram ({} bytes): {}", data.len(), e);
            None
        }
    }
}

/// Parse a datagram, reporting why it was rejected.
///
/// The full expected size is computed from the flags and length field and
/// checked before any variable-length field is read. The TTL byte is kept
/// as sent; [`Packet::validate`] is where values above [`MAX_TTL`] fail.
///
/// # Errors
///
/// `Truncated`, `UnsupportedVersion` or `UnknownPacketType`
pub fn decode_packet(data: &[u8]) -> std::result::Result<Packet, ProtocolError> {
    if data.len() < MIN_PACKET_SIZE {
        return Err(ProtocolError::Truncated {
            expected: MIN_PACKET_SIZE,
            actual: data.len(),
        });
    }

    let version = data[0];
    if version != PROTOCOL_VERSION {
        return Err(ProtocolError::UnsupportedVersion(version));
    }

    let packet_type = PacketType::try_from(data[1])?;

    let ttl = data[2];
    if ttl > MAX_TTL {
        log::debug!("Packet carries TTL {ttl} above the maximum of {MAX_TTL}");
    }

    let timestamp = u64::from_be_bytes(read_array(data, 3));
    let packet_flags = data[11];
    let payload_len = usize::from(u16::from_be_bytes(read_array(data, 12)));

    let has_recipient = packet_flags & flags::HAS_RECIPIENT != 0;
    let has_signature = packet_flags & flags::HAS_SIGNATURE != 0;

    let expected = encoded_len(payload_len, has_recipient, has_signature);
    if data.len() < expected {
        return Err(ProtocolError::Truncated {
            expected,
            actual: data.len(),
        });
    }
    if data.len() > expected {
        log::trace!(
            "Ignoring {} trailing bytes after packet",
            data.len() - expected
        );
    }

    let mut offset = FIXED_HEADER_SIZE;

    let sender_id = PeerId::new(read_array(data, offset));
    offset += PEER_ID_SIZE;

    let recipient_id = if has_recipient {
        let recipient = PeerId::new(read_array(data, offset));
        offset += PEER_ID_SIZE;
        Some(recipient)
    } else {
        None
    };

    let payload = data[offset..offset + payload_len].to_vec();
    offset += payload_len;

    if packet_flags & flags::IS_COMPRESSED != 0 {
        log::warn!("Compressed payload from {sender_id} passed through undecompressed");
    }

    let signature = if has_signature {
        Some(read_array(data, offset))
    } else {
        None
    };

    Ok(Packet {
        version,
        packet_type,
        ttl,
        timestamp,
        sender_id,
        recipient_id,
        payload,
        signature,
    })
}

/// Copy `N` bytes at `offset`; callers have already bounds-checked `data`.
fn read_array<const N: usize>(data: &[u8], offset: usize) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&data[offset..offset + N]);
    out
}

impl Packet {
    /// Serialize this packet to bytes
    ///
    /// # Errors
    ///
    /// See [`encode`]
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        encode(self)
    }

    /// Deserialize a packet from bytes
    ///
    /// # Errors
    ///
    /// See [`decode_packet`]
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        decode_packet(bytes).map_err(Into::into)
    }
}

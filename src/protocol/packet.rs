//! The packet envelope and its pure helpers.

use super::{MAX_PAYLOAD_SIZE, MAX_TTL, PEER_ID_SIZE, PROTOCOL_VERSION, SIGNATURE_SIZE};
use crate::utils::{MeshError, ProtocolError, Result};
use rand::rngs::OsRng;
use rand::RngCore;
use std::fmt;
use std::str::FromStr;

/// Opaque 8-byte peer identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct PeerId([u8; PEER_ID_SIZE]);

impl PeerId {
    /// Wrap exactly eight bytes
    pub const fn new(bytes: [u8; PEER_ID_SIZE]) -> Self {
        Self(bytes)
    }

    /// Generate a random identifier
    pub fn random() -> Self {
        let mut bytes = [0u8; PEER_ID_SIZE];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Coerce an arbitrary slice into an identifier.
    ///
    /// Longer input is truncated and shorter input is zero-padded, matching
    /// what other implementations put on the wire for mismatched lengths.
    pub fn from_slice_lossy(bytes: &[u8]) -> Self {
        let mut id = [0u8; PEER_ID_SIZE];
        let len = bytes.len().min(PEER_ID_SIZE);
        id[..len].copy_from_slice(&bytes[..len]);
        Self(id)
    }

    /// Raw identifier bytes
    pub fn as_bytes(&self) -> &[u8; PEER_ID_SIZE] {
        &self.0
    }

    /// Lowercase hex form, also used as the session table key
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl From<[u8; PEER_ID_SIZE]> for PeerId {
    fn from(bytes: [u8; PEER_ID_SIZE]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for PeerId {
    type Err = MeshError;

    /// Parses 16 hex digits; `_` separators are ignored.
    fn from_str(s: &str) -> Result<Self> {
        let digits: String = s.chars().filter(|c| *c != '_').collect();
        let bytes = hex::decode(digits)?;
        let id: [u8; PEER_ID_SIZE] =
            bytes
                .as_slice()
                .try_into()
                .map_err(|_| ProtocolError::InvalidMessage {
                    reason: format!("peer id must be {PEER_ID_SIZE} bytes, got {}", bytes.len()),
                })?;
        Ok(Self(id))
    }
}

/// Packet types carried in the header's type byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PacketType {
    /// Public chat message
    Message = 1,
    /// Combined public key announcement
    KeyExchange = 2,
    /// Peer presence announcement
    PeerAnnouncement = 3,
    /// Channel join notification
    ChannelJoin = 4,
    /// Channel leave notification
    ChannelLeave = 5,
    /// End-to-end encrypted message for one recipient
    PrivateMessage = 6,
    /// Delivery acknowledgment
    Ack = 7,
    /// Fragment of a larger message
    Fragment = 8,
}

impl PacketType {
    /// Wire code of this type
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Human-readable name
    pub fn name(self) -> &'static str {
        match self {
            Self::Message => "Message",
            Self::KeyExchange => "KeyExchange",
            Self::PeerAnnouncement => "PeerAnnouncement",
            Self::ChannelJoin => "ChannelJoin",
            Self::ChannelLeave => "ChannelLeave",
            Self::PrivateMessage => "PrivateMessage",
            Self::Ack => "Ack",
            Self::Fragment => "Fragment",
        }
    }
}

impl TryFrom<u8> for PacketType {
    type Error = ProtocolError;

    fn try_from(code: u8) -> std::result::Result<Self, Self::Error> {
        Ok(match code {
            1 => Self::Message,
            2 => Self::KeyExchange,
            3 => Self::PeerAnnouncement,
            4 => Self::ChannelJoin,
            5 => Self::ChannelLeave,
            6 => Self::PrivateMessage,
            7 => Self::Ack,
            8 => Self::Fragment,
            other => return Err(ProtocolError::UnknownPacketType(other)),
        })
    }
}

impl fmt::Display for PacketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One framed unit of the wire protocol
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// Wire version; only [`PROTOCOL_VERSION`] decodes
    pub version: u8,
    /// What the payload carries
    pub packet_type: PacketType,
    /// Remaining hop budget, 0 means "do not relay"
    pub ttl: u8,
    /// Sender-assigned milliseconds since the Unix epoch
    pub timestamp: u64,
    /// Originating peer
    pub sender_id: PeerId,
    /// Destination peer; `None` is a broadcast
    pub recipient_id: Option<PeerId>,
    /// Opaque payload bytes
    pub payload: Vec<u8>,
    /// Ed25519 signature over the payload
    pub signature: Option<[u8; SIGNATURE_SIZE]>,
}

impl Packet {
    /// Create a broadcast packet stamped with the current time and full TTL
    pub fn new(packet_type: PacketType, sender_id: PeerId, payload: Vec<u8>) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            packet_type,
            ttl: MAX_TTL,
            timestamp: now_millis(),
            sender_id,
            recipient_id: None,
            payload,
            signature: None,
        }
    }

    /// Address the packet to a single peer
    pub fn with_recipient(mut self, recipient_id: PeerId) -> Self {
        self.recipient_id = Some(recipient_id);
        self
    }

    /// Attach a signature
    pub fn with_signature(mut self, signature: [u8; SIGNATURE_SIZE]) -> Self {
        self.signature = Some(signature);
        self
    }

    /// Set the hop budget, clamped to [`MAX_TTL`]
    pub fn with_ttl(mut self, ttl: u8) -> Self {
        self.ttl = ttl.min(MAX_TTL);
        self
    }

    /// Copy of this packet with one hop spent, or `None` once expired.
    pub fn decrement_ttl(&self) -> Option<Self> {
        let ttl = self.ttl.checked_sub(1)?;
        Some(Self {
            ttl,
            ..self.clone()
        })
    }

    /// Whether this packet is addressed to `recipient_id`
    pub fn is_for_recipient(&self, recipient_id: &PeerId) -> bool {
        self.recipient_id.as_ref() == Some(recipient_id)
    }

    /// Whether this packet has no specific recipient
    pub fn is_broadcast(&self) -> bool {
        self.recipient_id.is_none()
    }

    /// Identifier for duplicate suppression: `sender_timestamp_type`
    pub fn message_id(&self) -> String {
        format!(
            "{}_{}_{}",
            self.sender_id.to_hex(),
            self.timestamp,
            self.packet_type.code()
        )
    }

    /// Check the application-level limits the wire format does not enforce
    ///
    /// # Errors
    ///
    /// `ProtocolError::TtlOutOfRange` or `ProtocolError::PayloadTooLarge`
    pub fn validate(&self) -> Result<()> {
        if self.ttl > MAX_TTL {
            return Err(ProtocolError::TtlOutOfRange(self.ttl).into());
        }
        if self.payload.len() > MAX_PAYLOAD_SIZE {
            return Err(ProtocolError::PayloadTooLarge {
                size: self.payload.len(),
                max: MAX_PAYLOAD_SIZE,
            }
            .into());
        }
        Ok(())
    }
}

fn now_millis() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sender() -> PeerId {
        PeerId::new([1, 2, 3, 4, 5, 6, 7, 8])
    }

    #[test]
    fn test_decrement_ttl() {
        let packet = Packet::new(PacketType::Message, sender(), b"hi".to_vec()).with_ttl(3);

        let relayed = packet.decrement_ttl().unwrap();
        assert_eq!(relayed.ttl, 2);
        assert_eq!(relayed.payload, packet.payload);
        assert_eq!(packet.ttl, 3);
    }

    #[test]
    fn test_decrement_ttl_expires_at_zero() {
        let mut packet = Packet::new(PacketType::Message, sender(), Vec::new()).with_ttl(1);

        packet = packet.decrement_ttl().unwrap();
        assert_eq!(packet.ttl, 0);
        assert!(packet.decrement_ttl().is_none());
    }

    #[test]
    fn test_decrement_ttl_every_value() {
        for ttl in 1..=MAX_TTL {
            let packet = Packet::new(PacketType::Ack, sender(), Vec::new()).with_ttl(ttl);
            assert_eq!(packet.decrement_ttl().map(|p| p.ttl), Some(ttl - 1));
        }
    }

    #[test]
    fn test_with_ttl_clamps() {
        let packet = Packet::new(PacketType::Message, sender(), Vec::new()).with_ttl(200);
        assert_eq!(packet.ttl, MAX_TTL);
    }

    #[test]
    fn test_recipient_matching() {
        let bob = PeerId::new([9; 8]);
        let carol = PeerId::new([7; 8]);

        let broadcast = Packet::new(PacketType::Message, sender(), Vec::new());
        assert!(broadcast.is_broadcast());
        assert!(!broadcast.is_for_recipient(&bob));

        let private = broadcast.with_recipient(bob);
        assert!(!private.is_broadcast());
        assert!(private.is_for_recipient(&bob));
        assert!(!private.is_for_recipient(&carol));
    }

    #[test]
    fn test_message_id() {
        let mut packet = Packet::new(PacketType::PrivateMessage, sender(), Vec::new());
        packet.timestamp = 1_700_000_000_000;

        assert_eq!(packet.message_id(), "0102030405060708_1700000000000_6");
    }

    #[test]
    fn test_peer_id_lossy_coercion() {
        let short = PeerId::from_slice_lossy(&[0xaa, 0xbb]);
        assert_eq!(short.as_bytes(), &[0xaa, 0xbb, 0, 0, 0, 0, 0, 0]);

        let long = PeerId::from_slice_lossy(&[1, 2, 3, 4, 5, 6, 7, 8, 9, 10]);
        assert_eq!(long, sender());
    }

    #[test]
    fn test_peer_id_parsing() {
        assert_eq!("01020304_05060708".parse::<PeerId>().unwrap(), sender());
        assert_eq!("0102030405060708".parse::<PeerId>().unwrap(), sender());
        assert_eq!(sender().to_string(), "0102030405060708");

        assert!("010203".parse::<PeerId>().is_err());
        assert!("zz02030405060708".parse::<PeerId>().is_err());
    }

    #[test]
    fn test_packet_type_codes() {
        for code in 1..=8u8 {
            let packet_type = PacketType::try_from(code).unwrap();
            assert_eq!(packet_type.code(), code);
        }
        assert_eq!(
            PacketType::try_from(0),
            Err(ProtocolError::UnknownPacketType(0))
        );
        assert_eq!(
            PacketType::try_from(9),
            Err(ProtocolError::UnknownPacketType(9))
        );
    }

    #[test]
    fn test_validate_payload_cap() {
        let ok = Packet::new(PacketType::Message, sender(), vec![0u8; MAX_PAYLOAD_SIZE]);
        assert!(ok.validate().is_ok());

        let too_big = Packet::new(PacketType::Message, sender(), vec![0u8; MAX_PAYLOAD_SIZE + 1]);
        assert!(too_big.validate().is_err());

        let mut bad_ttl = ok;
        bad_ttl.ttl = MAX_TTL + 1;
        assert!(bad_ttl.validate().is_err());
    }
}

//! Send and receive pipeline for a single mesh node.
//!
//! Outgoing: plaintext is encrypted for the recipient's session, the
//! ciphertext is signed, wrapped in a [`Packet`] and encoded. Incoming is the
//! mirror: decode, verify, then either record a key exchange or decrypt.
//!
//! Nothing here touches a transport. Callers move the returned byte buffers.

use crate::crypto::{self, IdentityKeyStore};
use crate::protocol::{codec, Packet, PacketType, PeerId, MAX_TTL};
use crate::service::EncryptionService;
use crate::session::parse_combined_blob;
use crate::utils::{CryptoError, MeshConfig, ProtocolConfig, ProtocolError, Result};

/// What an incoming datagram turned out to be
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// A peer announced its keys and a session now exists for it
    KeyExchange {
        /// The announcing peer
        peer: PeerId,
    },
    /// A private message addressed to this node, decrypted
    Private {
        /// Sender
        from: PeerId,
        /// Decrypted payload
        plaintext: Vec<u8>,
    },
    /// A packet with no recipient, payload untouched
    Broadcast(Packet),
    /// A packet addressed to another peer; a candidate for [`MeshNode::relay`]
    NotForUs(Packet),
    /// A packet this node sent itself, echoed back by the mesh
    Own(Packet),
}

/// A mesh participant: peer identifier, keys and sessions
#[derive(Debug)]
pub struct MeshNode {
    peer_id: PeerId,
    service: EncryptionService,
    config: ProtocolConfig,
}

impl MeshNode {
    /// Assemble a node from its parts
    pub fn new(peer_id: PeerId, service: EncryptionService, config: ProtocolConfig) -> Self {
        Self {
            peer_id,
            service,
            config,
        }
    }

    /// Node with a random peer identifier and the identity held in `store`
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the identity store cannot be read or written
    pub fn from_config(config: &MeshConfig, store: Box<dyn IdentityKeyStore>) -> Result<Self> {
        let service = EncryptionService::from_config(config, store)?;
        let peer_id = PeerId::random();
        log::info!("Mesh node {peer_id} ready");
        Ok(Self::new(peer_id, service, config.protocol.clone()))
    }

    /// This node's identifier
    pub fn peer_id(&self) -> PeerId {
        self.peer_id
    }

    /// The encryption service backing this node
    pub fn service(&self) -> &EncryptionService {
        &self.service
    }

    fn outgoing(&self, packet_type: PacketType, payload: Vec<u8>) -> Packet {
        Packet::new(packet_type, self.peer_id, payload).with_ttl(self.config.default_ttl)
    }

    fn finish(&self, packet: &Packet) -> Result<Vec<u8>> {
        if packet.payload.len() > self.config.max_payload_size {
            return Err(ProtocolError::PayloadTooLarge {
                size: packet.payload.len(),
                max: self.config.max_payload_size,
            }
            .into());
        }
        packet.validate()?;
        codec::encode(packet)
    }

    /// Encoded KeyExchange broadcast carrying this node's public keys
    ///
    /// # Errors
    ///
    /// `ProtocolError::PayloadTooLarge` if the configured cap is below the
    /// 96-byte blob
    pub fn announce(&self) -> Result<Vec<u8>> {
        let blob = self.service.combined_public_key_data();
        let mut packet = self.outgoing(PacketType::KeyExchange, blob.to_vec());
        if self.config.sign_announcements {
            packet = packet.with_signature(self.service.sign(&blob));
        }
        self.finish(&packet)
    }

    /// Encrypt `plaintext` for `recipient` and encode it as a signed
    /// PrivateMessage.
    ///
    /// # Errors
    ///
    /// `SessionError::NoSession` before a key exchange with `recipient`,
    /// `ProtocolError::PayloadTooLarge` if the ciphertext exceeds the cap
    pub fn seal_private(&self, recipient: PeerId, plaintext: &[u8]) -> Result<Vec<u8>> {
        let ciphertext = self.service.encrypt_for(plaintext, &recipient.to_hex())?;
        let signature = self.service.sign(&ciphertext);
        let packet = self
            .outgoing(PacketType::PrivateMessage, ciphertext)
            .with_recipient(recipient)
            .with_signature(signature);
        self.finish(&packet)
    }

    /// Encode an unencrypted broadcast
    ///
    /// # Errors
    ///
    /// `ProtocolError::PayloadTooLarge` if `payload` exceeds the configured cap
    pub fn seal_broadcast(&self, packet_type: PacketType, payload: &[u8]) -> Result<Vec<u8>> {
        self.finish(&self.outgoing(packet_type, payload.to_vec()))
    }

    /// Decode and process one incoming datagram.
    ///
    /// # Errors
    ///
    /// `ProtocolError` for undecodable input, `SessionError` for a bad key
    /// exchange or an unknown sender, `CryptoError` for anything that fails
    /// authentication. All are scoped to this datagram.
    pub fn open(&self, bytes: &[u8]) -> Result<Inbound> {
        let packet = codec::decode_packet(bytes)?;

        if packet.sender_id == self.peer_id {
            return Ok(Inbound::Own(packet));
        }
        if let Some(recipient) = packet.recipient_id {
            if recipient != self.peer_id {
                return Ok(Inbound::NotForUs(packet));
            }
        }

        match packet.packet_type {
            PacketType::KeyExchange => self.open_key_exchange(&packet),
            PacketType::PrivateMessage => self.open_private(&packet),
            _ => Ok(Inbound::Broadcast(packet)),
        }
    }

    fn open_key_exchange(&self, packet: &Packet) -> Result<Inbound> {
        let keys = parse_combined_blob(&packet.payload)?;
        if let Some(signature) = &packet.signature {
            if !crypto::verify(signature, &packet.payload, &keys.signing) {
                log::warn!("Forged key exchange from {}", packet.sender_id);
                return Err(CryptoError::SignatureVerification.into());
            }
        }

        self.service
            .add_peer_public_key(&packet.sender_id.to_hex(), &packet.payload)?;
        Ok(Inbound::KeyExchange {
            peer: packet.sender_id,
        })
    }

    fn open_private(&self, packet: &Packet) -> Result<Inbound> {
        if packet.recipient_id.is_none() {
            return Err(ProtocolError::InvalidMessage {
                reason: "private message without recipient".to_string(),
            }
            .into());
        }

        let sender = packet.sender_id.to_hex();
        if let Some(signature) = &packet.signature {
            if !self.service.verify_from(signature, &packet.payload, &sender)? {
                log::warn!("Bad signature on private message from {sender}");
                return Err(CryptoError::SignatureVerification.into());
            }
        }

        let plaintext = self
            .service
            .decrypt_from(&packet.payload, &sender)
            .map_err(|e| {
                log::warn!("Dropping private message from {sender}: {e}");
                e
            })?;

        Ok(Inbound::Private {
            from: packet.sender_id,
            plaintext,
        })
    }

    /// Re-encode `packet` with one hop spent, or `None` once its TTL is
    /// exhausted. A TTL above the maximum is clamped before it is passed on.
    pub fn relay(&self, packet: &Packet) -> Option<Vec<u8>> {
        let mut next = packet.decrement_ttl()?;
        next.ttl = next.ttl.min(MAX_TTL);
        match codec::encode(&next) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                log::warn!("Cannot relay {}: {e}", packet.message_id());
                None
            }
        }
    }
}

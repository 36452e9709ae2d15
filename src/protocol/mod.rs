//! Wire protocol for mesh packets.
//!
//! This module defines the packet envelope exchanged between peers and the
//! bit-exact binary codec that carries it over the transport.

pub mod codec;
pub mod packet;

pub use codec::*;
pub use packet::*;

/// Only wire version this implementation speaks
pub const PROTOCOL_VERSION: u8 = 1;

/// Maximum hop budget a packet may carry
pub const MAX_TTL: u8 = 7;

/// Application-level payload cap in bytes
pub const MAX_PAYLOAD_SIZE: usize = 500;

/// Size of a peer identifier on the wire
pub const PEER_ID_SIZE: usize = 8;

/// Size of an Ed25519 signature on the wire
pub const SIGNATURE_SIZE: usize = 64;

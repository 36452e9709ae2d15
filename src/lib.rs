//! # Mesh Chat Core
//!
//! Wire-level messaging core for a peer-to-peer mesh chat client: a bit-exact
//! binary packet format plus the per-peer key exchange, authenticated
//! encryption and signing that produce and consume its payloads.
//!
//! ## Features
//!
//! - **Packet Codec**: Fixed big-endian layout, identical on every platform
//! - **Key Exchange**: X25519 agreement with HKDF-SHA256 key derivation
//! - **Encryption**: AES-256-GCM with a fresh nonce per message
//! - **Signatures**: Ed25519 over packet payloads
//! - **Identity**: Persistent identity key behind a pluggable store
//!
//! ## Quick Start
//!
//! ```rust
//! use meshchat_core::{crypto::MemoryKeyStore, Inbound, MeshConfig, MeshNode};
//!
//! # fn main() -> meshchat_core::Result<()> {
//! let config = MeshConfig::default();
//! let alice = MeshNode::from_config(&config, Box::new(MemoryKeyStore::new()))?;
//! let bob = MeshNode::from_config(&config, Box::new(MemoryKeyStore::new()))?;
//!
//! bob.open(&alice.announce()?)?;
//! alice.open(&bob.announce()?)?;
//!
//! let wire = alice.seal_private(bob.peer_id(), b"hello")?;
//! assert!(matches!(bob.open(&wire)?, Inbound::Private { .. }));
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`protocol`]: Packet envelope and binary codec
//! - [`session`]: Key exchange blob and per-peer session table
//! - [`crypto`]: AEAD, signing, local identity and the crypto provider
//! - [`service`]: Per-peer encryption facade
//! - [`node`]: Send and receive pipeline
//! - [`utils`]: Configuration and error handling
//!
//! Nothing in this crate performs network I/O; the transport that moves the
//! encoded buffers belongs to the caller.

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::cargo)]
#![allow(clippy::module_name_repetitions)]

pub mod crypto;
pub mod node;
pub mod protocol;
pub mod service;
pub mod session;
pub mod utils;

// Re-export commonly used types for convenience
pub use crypto::{IdentityKeyStore, LocalIdentity, SigningKeyPair};
pub use node::{Inbound, MeshNode};
pub use protocol::{Packet, PacketType, PeerId};
pub use service::EncryptionService;
pub use session::SessionStore;
pub use utils::{MeshConfig, MeshError, Result};

/// Default configuration values
pub mod defaults {
    /// Default hop budget for outgoing packets
    pub const DEFAULT_TTL: u8 = 7;

    /// HKDF salt shared by every interoperating peer
    pub const DEFAULT_HKDF_SALT: &str = "bitchat-v1";
}

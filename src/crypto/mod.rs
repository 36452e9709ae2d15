//! Cryptographic primitives and local key material.
//!
//! This module provides the node's identity, Ed25519 signing, AES-256-GCM
//! authenticated encryption, and the process-wide provider they share.

pub mod aead;
pub mod identity;
pub mod provider;
pub mod signer;

pub use aead::{decrypt, encrypt, SymmetricKey};
pub use identity::*;
pub use provider::CryptoProvider;
pub use signer::*;

//! Per-peer key exchange and session state.
//!
//! Peers announce a combined public key blob once; each side derives the same
//! symmetric key from it and caches it alongside the peer's public keys.

pub mod exchange;
pub mod store;

pub use exchange::*;
pub use store::*;

//! Process-wide cryptographic provider.
//!
//! Registered lazily on first use and shared by every thread afterwards.
//! Registration checks that the operating system RNG answers; every nonce the
//! crate draws goes through the registered provider.

use crate::utils::{CryptoError, Result};
use rand::rngs::OsRng;
use rand::RngCore;
use std::fmt;
use std::sync::OnceLock;

static PROVIDER: OnceLock<std::result::Result<CryptoProvider, String>> = OnceLock::new();

/// The algorithm suite backing every session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CryptoProvider {
    /// Key agreement
    pub agreement: &'static str,
    /// Signatures
    pub signature: &'static str,
    /// Authenticated encryption
    pub aead: &'static str,
    /// Key derivation
    pub kdf: &'static str,
}

impl CryptoProvider {
    const SUITE: Self = Self {
        agreement: "X25519",
        signature: "Ed25519",
        aead: "AES-256-GCM",
        kdf: "HKDF-SHA256",
    };

    fn register() -> std::result::Result<Self, String> {
        let mut probe = [0u8; 16];
        if let Err(e) = OsRng.try_fill_bytes(&mut probe) {
            log::error!("OS random number generator unavailable: {e}");
            return Err(e.to_string());
        }
        log::debug!("Registered crypto provider: {}", Self::SUITE);
        Ok(Self::SUITE)
    }

    /// Fill `buf` from the operating system RNG
    ///
    /// # Errors
    ///
    /// `CryptoError::ProviderUnavailable` if the RNG fails
    pub fn fill_random(&self, buf: &mut [u8]) -> Result<()> {
        OsRng.try_fill_bytes(buf).map_err(|e| {
            CryptoError::ProviderUnavailable {
                reason: e.to_string(),
            }
            .into()
        })
    }
}

impl fmt::Display for CryptoProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} / {} / {} / {}",
            self.agreement, self.signature, self.aead, self.kdf
        )
    }
}

/// The provider, registering it on first call
///
/// # Errors
///
/// `CryptoError::ProviderUnavailable` if registration failed; the failure is
/// remembered for the life of the process
pub fn get() -> Result<&'static CryptoProvider> {
    PROVIDER
        .get_or_init(CryptoProvider::register)
        .as_ref()
        .map_err(|reason| {
            CryptoError::ProviderUnavailable {
                reason: reason.clone(),
            }
            .into()
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registered_once() {
        let first = get().unwrap();
        let second = get().unwrap();
        assert!(std::ptr::eq(first, second));
        assert_eq!(first.aead, "AES-256-GCM");
    }

    #[test]
    fn test_concurrent_registration() {
        let handles: Vec<_> = (0..8)
            .map(|_| std::thread::spawn(|| get().unwrap() as *const _ as usize))
            .collect();
        let addrs: Vec<usize> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(addrs.windows(2).all(|w| w[0] == w[1]));
    }

    #[test]
    fn test_fill_random_draws_fresh_bytes() {
        let provider = get().unwrap();
        let mut first = [0u8; 32];
        let mut second = [0u8; 32];
        provider.fill_random(&mut first).unwrap();
        provider.fill_random(&mut second).unwrap();

        assert_ne!(first, [0u8; 32]);
        assert_ne!(first, second);
    }
}

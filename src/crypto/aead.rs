//! AES-256-GCM authenticated encryption.
//!
//! Output layout is `nonce(12) ‖ ciphertext ‖ tag(16)`. A fresh random nonce
//! is drawn for every call and must never repeat under one key.

use crate::crypto::provider;
use crate::utils::{CryptoError, Result};
use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Size of a symmetric key in bytes
pub const KEY_SIZE: usize = 32;

/// Size of the GCM nonce in bytes
pub const NONCE_SIZE: usize = 12;

/// Size of the GCM authentication tag in bytes
pub const TAG_SIZE: usize = 16;

/// 256-bit symmetric key, wiped on drop
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SymmetricKey([u8; KEY_SIZE]);

impl SymmetricKey {
    /// Wrap raw key bytes
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Raw key bytes
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

impl fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SymmetricKey([REDACTED])")
    }
}

/// Encrypt `plaintext` under `key`, returning `nonce ‖ ciphertext ‖ tag`
///
/// # Errors
///
/// `CryptoError::ProviderUnavailable` if no nonce can be drawn
pub fn encrypt(plaintext: &[u8], key: &SymmetricKey) -> Result<Vec<u8>> {
    let mut nonce = [0u8; NONCE_SIZE];
    provider::get()?.fill_random(&mut nonce)?;

    let cipher = Aes256Gcm::new(key.as_bytes().into());
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|_| CryptoError::Encryption {
            reason: "AES-256-GCM encryption failed".to_string(),
        })?;

    let mut out = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Decrypt a `nonce ‖ ciphertext ‖ tag` blob.
///
/// Fails with `AuthenticationFailure` on a bad tag or a blob shorter than
/// nonce plus tag; no partial plaintext is ever returned.
///
/// # Errors
///
/// `CryptoError::AuthenticationFailure` for a short blob or a bad tag
pub fn decrypt(blob: &[u8], key: &SymmetricKey) -> Result<Vec<u8>> {
    if blob.len() < NONCE_SIZE + TAG_SIZE {
        return Err(CryptoError::AuthenticationFailure.into());
    }

    let (nonce, ciphertext) = blob.split_at(NONCE_SIZE);
    let cipher = Aes256Gcm::new(key.as_bytes().into());

    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| CryptoError::AuthenticationFailure.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;
    use rand::RngCore;

    fn random_key() -> SymmetricKey {
        let mut bytes = [0u8; KEY_SIZE];
        OsRng.fill_bytes(&mut bytes);
        SymmetricKey::from_bytes(bytes)
    }

    #[test]
    fn test_round_trip() {
        let key = random_key();
        for message in [&b""[..], &b"hi"[..], &[0xabu8; 500][..]] {
            let blob = encrypt(message, &key).unwrap();
            assert_eq!(blob.len(), NONCE_SIZE + message.len() + TAG_SIZE);
            assert_eq!(decrypt(&blob, &key).unwrap(), message);
        }
    }

    #[test]
    fn test_nonce_freshness() {
        let key = random_key();
        let first = encrypt(b"same plaintext", &key).unwrap();
        let second = encrypt(b"same plaintext", &key).unwrap();

        assert_ne!(first[..NONCE_SIZE], second[..NONCE_SIZE]);
        assert_ne!(first, second);
    }

    #[test]
    fn test_any_flipped_byte_fails() {
        let key = random_key();
        let blob = encrypt(b"attack at dawn", &key).unwrap();

        for i in 0..blob.len() {
            let mut tampered = blob.clone();
            tampered[i] ^= 0x80;
            assert!(decrypt(&tampered, &key).is_err(), "byte {i} flip accepted");
        }
    }

    #[test]
    fn test_wrong_key_fails() {
        let blob = encrypt(b"secret", &random_key()).unwrap();
        let err = decrypt(&blob, &random_key()).unwrap_err();
        assert!(err.is_security_violation());
    }

    #[test]
    fn test_short_input_fails() {
        let key = random_key();
        assert!(decrypt(&[], &key).is_err());
        assert!(decrypt(&[0u8; NONCE_SIZE + TAG_SIZE - 1], &key).is_err());
        assert!(decrypt(&[0u8; NONCE_SIZE + TAG_SIZE], &key).is_err());
    }

    #[test]
    fn test_key_debug_redacted() {
        let key = SymmetricKey::from_bytes([7u8; KEY_SIZE]);
        assert_eq!(format!("{key:?}"), "SymmetricKey([REDACTED])");
    }
}

//! Combined public key blob and symmetric key derivation.
//!
//! The blob is the payload of a `KeyExchange` packet: three 32-byte public
//! keys concatenated in a fixed order with no length prefixes.
//!
//! ```text
//! agreement(32) ‖ signing(32) ‖ identity(32)
//! ```

use crate::crypto::SymmetricKey;
use crate::utils::{CryptoError, Result, SessionError};
use hkdf::Hkdf;
use sha2::Sha256;

/// Size of each public key in the blob
pub const PUBLIC_KEY_SIZE: usize = 32;

/// Total size of the combined public key blob
pub const COMBINED_BLOB_SIZE: usize = 3 * PUBLIC_KEY_SIZE;

/// Public keys carried in a combined blob
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CombinedPublicKeys {
    /// X25519 agreement key
    pub agreement: [u8; PUBLIC_KEY_SIZE],
    /// Ephemeral Ed25519 signing key
    pub signing: [u8; PUBLIC_KEY_SIZE],
    /// Persistent Ed25519 identity key
    pub identity: [u8; PUBLIC_KEY_SIZE],
}

/// Concatenate the three public keys into the exchange blob
pub fn build_combined_blob(
    agreement: &[u8; PUBLIC_KEY_SIZE],
    signing: &[u8; PUBLIC_KEY_SIZE],
    identity: &[u8; PUBLIC_KEY_SIZE],
) -> [u8; COMBINED_BLOB_SIZE] {
    let mut blob = [0u8; COMBINED_BLOB_SIZE];
    blob[..PUBLIC_KEY_SIZE].copy_from_slice(agreement);
    blob[PUBLIC_KEY_SIZE..2 * PUBLIC_KEY_SIZE].copy_from_slice(signing);
    blob[2 * PUBLIC_KEY_SIZE..].copy_from_slice(identity);
    blob
}

/// Split an exchange blob into its three keys.
///
/// # Errors
///
/// `SessionError::MalformedExchange` unless `bytes` is exactly
/// [`COMBINED_BLOB_SIZE`] long
pub fn parse_combined_blob(
    bytes: &[u8],
) -> std::result::Result<CombinedPublicKeys, SessionError> {
    if bytes.len() != COMBINED_BLOB_SIZE {
        return Err(SessionError::MalformedExchange {
            reason: format!(
                "invalid length: expected {COMBINED_BLOB_SIZE}, got {}",
                bytes.len()
            ),
        });
    }

    let key_at = |i: usize| {
        let mut key = [0u8; PUBLIC_KEY_SIZE];
        key.copy_from_slice(&bytes[i * PUBLIC_KEY_SIZE..(i + 1) * PUBLIC_KEY_SIZE]);
        key
    };

    Ok(CombinedPublicKeys {
        agreement: key_at(0),
        signing: key_at(1),
        identity: key_at(2),
    })
}

/// Derive the per-peer AES-256 key from a raw ECDH secret.
///
/// HKDF-SHA256 with the protocol salt and empty info. Deterministic: both
/// ends of an exchange get identical keys.
///
/// # Errors
///
/// `CryptoError::KeyDerivation` if HKDF expansion fails
pub fn derive_symmetric_key(shared_secret: &[u8], salt: &[u8]) -> Result<SymmetricKey> {
    let hkdf = Hkdf::<Sha256>::new(Some(salt), shared_secret);
    let mut okm = [0u8; 32];
    hkdf.expand(&[], &mut okm)
        .map_err(|_| CryptoError::KeyDerivation {
            reason: "HKDF expansion failed".to_string(),
        })?;

    Ok(SymmetricKey::from_bytes(okm))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blob_round_trip() {
        let blob = build_combined_blob(&[1; 32], &[2; 32], &[3; 32]);
        let keys = parse_combined_blob(&blob).unwrap();

        assert_eq!(keys.agreement, [1; 32]);
        assert_eq!(keys.signing, [2; 32]);
        assert_eq!(keys.identity, [3; 32]);
    }

    #[test]
    fn test_blob_rejects_wrong_length() {
        for len in [0, 32, 64, 95, 97, 128] {
            let err = parse_combined_blob(&vec![0u8; len]).unwrap_err();
            assert!(matches!(err, SessionError::MalformedExchange { .. }));
        }
    }

    #[test]
    fn test_derivation_is_deterministic() {
        let secret = [0x42u8; 32];
        let first = derive_symmetric_key(&secret, b"bitchat-v1").unwrap();
        let second = derive_symmetric_key(&secret, b"bitchat-v1").unwrap();
        assert_eq!(first.as_bytes(), second.as_bytes());
    }

    #[test]
    fn test_derivation_depends_on_salt_and_secret() {
        let base = derive_symmetric_key(&[0x42; 32], b"bitchat-v1").unwrap();
        let other_salt = derive_symmetric_key(&[0x42; 32], b"bitchat-v2").unwrap();
        let other_secret = derive_symmetric_key(&[0x43; 32], b"bitchat-v1").unwrap();

        assert_ne!(base.as_bytes(), other_salt.as_bytes());
        assert_ne!(base.as_bytes(), other_secret.as_bytes());
    }

    #[test]
    fn test_rfc5869_case_3_prefix() {
        // Zero-length salt and info; the first 32 bytes of the 42-byte OKM.
        let key = derive_symmetric_key(&[0x0b; 22], &[]).unwrap();
        assert_eq!(
            hex::encode(key.as_bytes()),
            "8da4e775a563c18f715f802a063c5a31b8a11f5c5ee1879ec3454e5f3c738d2d"
        );
    }
}

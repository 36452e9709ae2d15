//! Ed25519 signing keys and stateless sign/verify.

use crate::utils::{CryptoError, Result};
use ed25519_dalek::{
    Signature, Signer, SigningKey, Verifier, VerifyingKey, PUBLIC_KEY_LENGTH, SECRET_KEY_LENGTH,
    SIGNATURE_LENGTH,
};
use rand::rngs::OsRng;
use std::fmt;

/// Ed25519 key pair used for both ephemeral and persistent signing
#[derive(Clone)]
pub struct SigningKeyPair {
    signing_key: SigningKey,
    verifying_key: VerifyingKey,
}

impl SigningKeyPair {
    /// Generate a new random key pair
    ///
    /// # Example
    ///
    /// ```rust
    /// use meshchat_core::crypto::SigningKeyPair;
    ///
    /// let keypair = SigningKeyPair::generate();
    /// ```
    pub fn generate() -> Self {
        let signing_key = SigningKey::generate(&mut OsRng);
        let verifying_key = signing_key.verifying_key();

        Self {
            signing_key,
            verifying_key,
        }
    }

    /// Rebuild a key pair from its 32-byte secret
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::InvalidKey` if the secret has the wrong length
    pub fn from_secret_bytes(secret_bytes: &[u8]) -> Result<Self> {
        let secret: &[u8; SECRET_KEY_LENGTH] =
            secret_bytes
                .try_into()
                .map_err(|_| CryptoError::InvalidKey {
                    reason: format!(
                        "Invalid secret key length: expected {}, got {}",
                        SECRET_KEY_LENGTH,
                        secret_bytes.len()
                    ),
                })?;

        let signing_key = SigningKey::from_bytes(secret);
        let verifying_key = signing_key.verifying_key();

        Ok(Self {
            signing_key,
            verifying_key,
        })
    }

    /// Get the public verifying key
    pub fn verifying_key(&self) -> &VerifyingKey {
        &self.verifying_key
    }

    /// Get the public key as bytes
    pub fn public_key_bytes(&self) -> [u8; PUBLIC_KEY_LENGTH] {
        self.verifying_key.to_bytes()
    }

    /// Get the secret key as bytes
    pub fn secret_key_bytes(&self) -> [u8; SECRET_KEY_LENGTH] {
        self.signing_key.to_bytes()
    }

    /// Sign `data` with this key pair
    pub fn sign(&self, data: &[u8]) -> [u8; SIGNATURE_LENGTH] {
        sign(data, self)
    }
}

impl fmt::Debug for SigningKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKeyPair")
            .field("signing_key", &"[REDACTED]")
            .field("verifying_key", &hex::encode(self.public_key_bytes()))
            .finish()
    }
}

/// Deterministic Ed25519 signature over `data`
pub fn sign(data: &[u8], keypair: &SigningKeyPair) -> [u8; SIGNATURE_LENGTH] {
    keypair.signing_key.sign(data).to_bytes()
}

/// Check `signature` over `data` against a raw verifying key.
///
/// Returns `false` for a wrong-length signature or an invalid key instead of
/// failing.
pub fn verify(signature: &[u8], data: &[u8], verifying_key: &[u8; PUBLIC_KEY_LENGTH]) -> bool {
    let Ok(signature) = <&[u8; SIGNATURE_LENGTH]>::try_from(signature) else {
        return false;
    };
    let Ok(verifying_key) = VerifyingKey::from_bytes(verifying_key) else {
        return false;
    };

    verifying_key
        .verify(data, &Signature::from_bytes(signature))
        .is_ok()
}

/// Parse a raw Ed25519 public key
///
/// # Errors
///
/// `CryptoError::InvalidKey` if the bytes are not a valid Ed25519 point
pub fn parse_verifying_key(bytes: &[u8; PUBLIC_KEY_LENGTH]) -> Result<VerifyingKey> {
    VerifyingKey::from_bytes(bytes).map_err(|_| {
        CryptoError::InvalidKey {
            reason: "Invalid Ed25519 public key".to_string(),
        }
        .into()
    })
}

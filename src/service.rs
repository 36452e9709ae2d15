//! Per-peer encryption and signing facade.
//!
//! [`EncryptionService`] ties the local identity to the session table: callers
//! hand it peer identifiers and bytes, it picks the right key.

use crate::crypto::{self, IdentityKeyStore, LocalIdentity};
use crate::session::{SessionStore, COMBINED_BLOB_SIZE, PUBLIC_KEY_SIZE};
use crate::utils::{MeshConfig, Result};
use std::sync::Arc;

/// End-to-end encryption for every peer this node has exchanged keys with
#[derive(Debug)]
pub struct EncryptionService {
    local: Arc<LocalIdentity>,
    sessions: SessionStore,
}

impl EncryptionService {
    /// Build a service around an existing identity using the default salt
    pub fn new(local: LocalIdentity) -> Self {
        let local = Arc::new(local);
        Self {
            sessions: SessionStore::new(Arc::clone(&local)),
            local,
        }
    }

    /// Build a service around an existing identity with a custom HKDF salt
    pub fn with_salt(local: LocalIdentity, salt: impl Into<Vec<u8>>) -> Self {
        let local = Arc::new(local);
        Self {
            sessions: SessionStore::with_salt(Arc::clone(&local), salt),
            local,
        }
    }

    /// Load or create the persistent identity from `store` and use the salt
    /// from `config`
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the identity store fails
    pub fn from_config(config: &MeshConfig, store: Box<dyn IdentityKeyStore>) -> Result<Self> {
        let local = LocalIdentity::load_or_create(store)?;
        Ok(Self::with_salt(local, config.crypto.hkdf_salt.as_bytes()))
    }

    /// The local identity
    pub fn identity(&self) -> &LocalIdentity {
        &self.local
    }

    /// The session table
    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// The 96-byte blob to broadcast in a key exchange
    pub fn combined_public_key_data(&self) -> [u8; COMBINED_BLOB_SIZE] {
        self.local.combined_public_key_data()
    }

    /// Record a peer's key exchange blob
    ///
    /// # Errors
    ///
    /// `SessionError::MalformedExchange` if the blob is rejected
    pub fn add_peer_public_key(&self, peer_id: &str, blob: &[u8]) -> Result<()> {
        self.sessions.ingest(peer_id, blob)
    }

    /// Encrypt `data` for `peer_id`
    ///
    /// # Errors
    ///
    /// `SessionError::NoSession` if no key exchange has happened with the peer
    pub fn encrypt_for(&self, data: &[u8], peer_id: &str) -> Result<Vec<u8>> {
        let key = self.sessions.lookup_symmetric_key(peer_id)?;
        crypto::encrypt(data, &key)
    }

    /// Decrypt `data` received from `peer_id`
    ///
    /// # Errors
    ///
    /// `SessionError::NoSession` for an unknown peer,
    /// `CryptoError::AuthenticationFailure` for anything that does not
    /// authenticate
    pub fn decrypt_from(&self, data: &[u8], peer_id: &str) -> Result<Vec<u8>> {
        let key = self.sessions.lookup_symmetric_key(peer_id)?;
        crypto::decrypt(data, &key)
    }

    /// Sign with the ephemeral signing key
    pub fn sign(&self, data: &[u8]) -> [u8; 64] {
        self.local.sign(data)
    }

    /// Sign with the persistent identity key
    pub fn sign_with_identity(&self, data: &[u8]) -> [u8; 64] {
        self.local.sign_with_identity(data)
    }

    /// Check a signature against `peer_id`'s ephemeral signing key.
    ///
    /// A bad signature is `Ok(false)`; only a missing session is an error.
    ///
    /// # Errors
    ///
    /// `SessionError::NoSession` for an unknown peer
    pub fn verify_from(&self, signature: &[u8], data: &[u8], peer_id: &str) -> Result<bool> {
        let key = self.sessions.lookup_signing_key(peer_id)?;
        Ok(crypto::verify(signature, data, &key))
    }

    /// `peer_id`'s persistent identity key
    ///
    /// # Errors
    ///
    /// `SessionError::NoSession` for an unknown peer
    pub fn peer_identity_key(&self, peer_id: &str) -> Result<[u8; PUBLIC_KEY_SIZE]> {
        self.sessions.lookup_identity_key(peer_id)
    }

    /// Forget the session with `peer_id`
    pub fn remove_peer(&self, peer_id: &str) -> bool {
        self.sessions.remove(peer_id)
    }

    /// Erase the persistent identity from storage
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the store cannot erase the key
    pub fn clear_persistent_identity(&self) -> Result<()> {
        self.local.clear_persistent_identity()
    }
}

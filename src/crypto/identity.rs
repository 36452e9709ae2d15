//! This node's key material and the storage seam for its persistent identity.
//!
//! A [`LocalIdentity`] holds three key pairs:
//!
//! - an X25519 agreement key pair, regenerated on every start
//! - an Ed25519 signing key pair, regenerated on every start
//! - an Ed25519 identity key pair that survives restarts through an
//!   [`IdentityKeyStore`]

use crate::crypto::SigningKeyPair;
use crate::session::{build_combined_blob, COMBINED_BLOB_SIZE};
use crate::utils::{Result, StoreError};
use rand::rngs::OsRng;
use std::fmt;
use std::fs::OpenOptions;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use x25519_dalek::{PublicKey, SharedSecret, StaticSecret};

/// Backing storage for the persistent identity key
pub trait IdentityKeyStore: Send + Sync {
    /// Load the stored identity, `None` if nothing has been saved yet
    fn load(&self) -> std::result::Result<Option<SigningKeyPair>, StoreError>;

    /// Persist the identity, replacing any previous one
    fn save(&self, keypair: &SigningKeyPair) -> std::result::Result<(), StoreError>;

    /// Erase the stored identity
    fn clear(&self) -> std::result::Result<(), StoreError>;
}

/// Identity store that lives only as long as the process
#[derive(Debug, Default)]
pub struct MemoryKeyStore {
    slot: Mutex<Option<SigningKeyPair>>,
}

impl MemoryKeyStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdentityKeyStore for MemoryKeyStore {
    fn load(&self) -> std::result::Result<Option<SigningKeyPair>, StoreError> {
        Ok(self
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn save(&self, keypair: &SigningKeyPair) -> std::result::Result<(), StoreError> {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(keypair.clone());
        Ok(())
    }

    fn clear(&self) -> std::result::Result<(), StoreError> {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        Ok(())
    }
}

/// Identity store keeping the hex-encoded secret in a single file
#[derive(Debug, Clone)]
pub struct FileKeyStore {
    path: PathBuf,
}

impl FileKeyStore {
    /// Store the identity at `path`
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    /// Location of the key file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl IdentityKeyStore for FileKeyStore {
    fn load(&self) -> std::result::Result<Option<SigningKeyPair>, StoreError> {
        if !self.path.exists() {
            return Ok(None);
        }

        let encoded = std::fs::read_to_string(&self.path)?;
        let secret = hex::decode(encoded.trim()).map_err(|e| StoreError::Corrupt {
            reason: e.to_string(),
        })?;
        let keypair =
            SigningKeyPair::from_secret_bytes(&secret).map_err(|e| StoreError::Corrupt {
                reason: e.to_string(),
            })?;

        Ok(Some(keypair))
    }

    fn save(&self, keypair: &SigningKeyPair) -> std::result::Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let staging = self.path.with_extension("tmp");
        if staging.exists() {
            std::fs::remove_file(&staging)?;
        }

        let mut file = owner_only().open(&staging)?;
        file.write_all(hex::encode(keypair.secret_key_bytes()).as_bytes())?;
        file.sync_all()?;
        drop(file);

        std::fs::rename(&staging, &self.path)?;
        Ok(())
    }

    fn clear(&self) -> std::result::Result<(), StoreError> {
        if !self.path.exists() {
            return Ok(());
        }

        overwrite_with_zeros(&self.path)?;
        std::fs::remove_file(&self.path)?;
        Ok(())
    }
}

/// Options creating a fresh file readable only by its owner
fn owner_only() -> OpenOptions {
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    options
}

/// Zero the file's existing bytes in place, keeping its length.
fn overwrite_with_zeros(path: &Path) -> std::result::Result<(), StoreError> {
    let len = std::fs::metadata(path)?.len();
    let mut file = OpenOptions::new().write(true).open(path)?;
    std::io::copy(&mut std::io::repeat(0).take(len), &mut file)?;
    file.sync_all()?;
    Ok(())
}

/// This node's key material
pub struct LocalIdentity {
    agreement_secret: StaticSecret,
    agreement_public: PublicKey,
    signing: SigningKeyPair,
    identity: SigningKeyPair,
    store: Box<dyn IdentityKeyStore>,
}

impl LocalIdentity {
    /// Generate fresh ephemeral keys and load the persistent identity from
    /// `store`, creating and saving one if the store is empty.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the store cannot be read or written
    pub fn load_or_create(store: Box<dyn IdentityKeyStore>) -> Result<Self> {
        let identity = match store.load()? {
            Some(identity) => {
                log::debug!("Loaded persistent identity key");
                identity
            }
            None => {
                let identity = SigningKeyPair::generate();
                store.save(&identity)?;
                log::info!(
                    "Generated new persistent identity {}",
                    hex::encode(identity.public_key_bytes())
                );
                identity
            }
        };

        Ok(Self::with_identity(identity, store))
    }

    /// Identity whose persistent key lives only in memory
    pub fn ephemeral() -> Self {
        let identity = SigningKeyPair::generate();
        let store = MemoryKeyStore {
            slot: Mutex::new(Some(identity.clone())),
        };
        Self::with_identity(identity, Box::new(store))
    }

    fn with_identity(identity: SigningKeyPair, store: Box<dyn IdentityKeyStore>) -> Self {
        let agreement_secret = StaticSecret::random_from_rng(OsRng);
        let agreement_public = PublicKey::from(&agreement_secret);

        Self {
            agreement_secret,
            agreement_public,
            signing: SigningKeyPair::generate(),
            identity,
            store,
        }
    }

    /// X25519 agreement public key
    pub fn agreement_public_key(&self) -> [u8; 32] {
        self.agreement_public.to_bytes()
    }

    /// Ephemeral Ed25519 signing public key
    pub fn signing_public_key(&self) -> [u8; 32] {
        self.signing.public_key_bytes()
    }

    /// Persistent Ed25519 identity public key
    pub fn identity_public_key(&self) -> [u8; 32] {
        self.identity.public_key_bytes()
    }

    /// The 96-byte blob announcing all three public keys
    pub fn combined_public_key_data(&self) -> [u8; COMBINED_BLOB_SIZE] {
        build_combined_blob(
            &self.agreement_public_key(),
            &self.signing_public_key(),
            &self.identity_public_key(),
        )
    }

    /// Sign with the ephemeral signing key
    pub fn sign(&self, data: &[u8]) -> [u8; 64] {
        self.signing.sign(data)
    }

    /// Sign with the persistent identity key
    pub fn sign_with_identity(&self, data: &[u8]) -> [u8; 64] {
        self.identity.sign(data)
    }

    /// Raw X25519 agreement with a peer's public key
    pub(crate) fn diffie_hellman(&self, peer_public: &PublicKey) -> SharedSecret {
        self.agreement_secret.diffie_hellman(peer_public)
    }

    /// Erase the persistent identity from storage.
    ///
    /// The in-memory keys stay usable until the process exits; the next start
    /// generates a new identity.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the store cannot erase the key
    pub fn clear_persistent_identity(&self) -> Result<()> {
        self.store.clear()?;
        log::warn!("Persistent identity key erased");
        Ok(())
    }
}

impl fmt::Debug for LocalIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalIdentity")
            .field("agreement_secret", &"[REDACTED]")
            .field("agreement_public", &hex::encode(self.agreement_public_key()))
            .field("signing", &self.signing)
            .field("identity", &self.identity)
            .finish_non_exhaustive()
    }
}

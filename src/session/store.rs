//! Table of per-peer sessions.
//!
//! One mutex guards every read and write of the table. Parsing, ECDH and key
//! derivation happen outside it, so the lock only covers the map access and
//! unrelated peers never serialize on each other's crypto work.

use crate::crypto::{parse_verifying_key, LocalIdentity, SymmetricKey};
use crate::session::{derive_symmetric_key, parse_combined_blob, PUBLIC_KEY_SIZE};
use crate::utils::{Result, SessionError};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use x25519_dalek::PublicKey;

/// Everything cached about a peer after a key exchange
#[derive(Debug, Clone)]
pub struct PeerSession {
    /// Peer's X25519 agreement key
    pub agreement_key: [u8; PUBLIC_KEY_SIZE],
    /// Peer's ephemeral Ed25519 signing key
    pub signing_key: [u8; PUBLIC_KEY_SIZE],
    /// Peer's persistent Ed25519 identity key
    pub identity_key: [u8; PUBLIC_KEY_SIZE],
    /// Key derived from the ECDH shared secret
    pub symmetric_key: SymmetricKey,
    /// When the exchange was processed
    pub established_at: chrono::DateTime<chrono::Utc>,
}

/// Peer identifier to session map, safe to share between threads
#[derive(Debug)]
pub struct SessionStore {
    local: Arc<LocalIdentity>,
    salt: Vec<u8>,
    peers: Mutex<HashMap<String, PeerSession>>,
}

impl SessionStore {
    /// Create an empty store deriving keys with the default salt
    pub fn new(local: Arc<LocalIdentity>) -> Self {
        Self::with_salt(local, crate::defaults::DEFAULT_HKDF_SALT.as_bytes())
    }

    /// Create an empty store with a custom HKDF salt
    pub fn with_salt(local: Arc<LocalIdentity>, salt: impl Into<Vec<u8>>) -> Self {
        Self {
            local,
            salt: salt.into(),
            peers: Mutex::new(HashMap::new()),
        }
    }

    /// The local identity sessions are derived from
    pub fn local(&self) -> &LocalIdentity {
        &self.local
    }

    fn peers(&self) -> MutexGuard<'_, HashMap<String, PeerSession>> {
        self.peers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Process a peer's combined key blob and store the resulting session.
    ///
    /// A second exchange from the same peer replaces the first.
    ///
    /// # Errors
    ///
    /// `SessionError::MalformedExchange` if the blob is not 96 bytes, carries
    /// an invalid Ed25519 key, or yields a non-contributory ECDH result
    pub fn ingest(&self, peer_id: &str, blob: &[u8]) -> Result<()> {
        let keys = parse_combined_blob(blob)?;

        for (name, key) in [("signing", &keys.signing), ("identity", &keys.identity)] {
            parse_verifying_key(key).map_err(|_| SessionError::MalformedExchange {
                reason: format!("invalid {name} key"),
            })?;
        }

        let shared = self.local.diffie_hellman(&PublicKey::from(keys.agreement));
        if !shared.was_contributory() {
            return Err(SessionError::MalformedExchange {
                reason: "non-contributory agreement key".to_string(),
            }
            .into());
        }
        let symmetric_key = derive_symmetric_key(shared.as_bytes(), &self.salt)?;

        let session = PeerSession {
            agreement_key: keys.agreement,
            signing_key: keys.signing,
            identity_key: keys.identity,
            symmetric_key,
            established_at: chrono::Utc::now(),
        };

        let replaced = self.peers().insert(peer_id.to_string(), session).is_some();
        if replaced {
            log::debug!("Replaced session for peer {peer_id}");
        } else {
            log::debug!("Established session with peer {peer_id}");
        }
        Ok(())
    }

    fn lookup<T>(&self, peer_id: &str, pick: impl FnOnce(&PeerSession) -> T) -> Result<T> {
        self.peers().get(peer_id).map(pick).ok_or_else(|| {
            SessionError::NoSession {
                peer_id: peer_id.to_string(),
            }
            .into()
        })
    }

    /// Symmetric key for `peer_id`
    ///
    /// # Errors
    ///
    /// `SessionError::NoSession` if no exchange has happened with `peer_id`
    pub fn lookup_symmetric_key(&self, peer_id: &str) -> Result<SymmetricKey> {
        self.lookup(peer_id, |s| s.symmetric_key.clone())
    }

    /// Ephemeral signing key for `peer_id`
    ///
    /// # Errors
    ///
    /// `SessionError::NoSession` if no exchange has happened with `peer_id`
    pub fn lookup_signing_key(&self, peer_id: &str) -> Result<[u8; PUBLIC_KEY_SIZE]> {
        self.lookup(peer_id, |s| s.signing_key)
    }

    /// Persistent identity key for `peer_id`
    ///
    /// # Errors
    ///
    /// `SessionError::NoSession` if no exchange has happened with `peer_id`
    pub fn lookup_identity_key(&self, peer_id: &str) -> Result<[u8; PUBLIC_KEY_SIZE]> {
        self.lookup(peer_id, |s| s.identity_key)
    }

    /// Full session snapshot for `peer_id`
    ///
    /// # Errors
    ///
    /// `SessionError::NoSession` if no exchange has happened with `peer_id`
    pub fn session(&self, peer_id: &str) -> Result<PeerSession> {
        self.lookup(peer_id, PeerSession::clone)
    }

    /// Drop the session for `peer_id`, returning whether one existed
    pub fn remove(&self, peer_id: &str) -> bool {
        let removed = self.peers().remove(peer_id).is_some();
        if removed {
            log::debug!("Removed session for peer {peer_id}");
        }
        removed
    }

    /// Whether a session exists for `peer_id`
    pub fn contains(&self, peer_id: &str) -> bool {
        self.peers().contains_key(peer_id)
    }

    /// Identifiers of all peers with a session
    pub fn peer_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.peers().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Number of sessions
    pub fn len(&self) -> usize {
        self.peers().len()
    }

    /// Whether the store holds no sessions
    pub fn is_empty(&self) -> bool {
        self.peers().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::build_combined_blob;
    use crate::utils::MeshError;

    fn store() -> SessionStore {
        SessionStore::new(Arc::new(LocalIdentity::ephemeral()))
    }

    #[test]
    fn test_session_symmetry() {
        let alice = store();
        let bob = store();

        alice
            .ingest("bob", &bob.local().combined_public_key_data())
            .unwrap();
        bob.ingest("alice", &alice.local().combined_public_key_data())
            .unwrap();

        let alice_key = alice.lookup_symmetric_key("bob").unwrap();
        let bob_key = bob.lookup_symmetric_key("alice").unwrap();
        assert_eq!(alice_key.as_bytes(), bob_key.as_bytes());
    }

    #[test]
    fn test_distinct_peers_get_distinct_keys() {
        let alice = store();
        let bob = store();
        let carol = store();

        alice
            .ingest("bob", &bob.local().combined_public_key_data())
            .unwrap();
        alice
            .ingest("carol", &carol.local().combined_public_key_data())
            .unwrap();

        assert_ne!(
            alice.lookup_symmetric_key("bob").unwrap().as_bytes(),
            alice.lookup_symmetric_key("carol").unwrap().as_bytes()
        );
    }

    #[test]
    fn test_lookups_return_peer_keys() {
        let alice = store();
        let bob = store();
        alice
            .ingest("bob", &bob.local().combined_public_key_data())
            .unwrap();

        assert_eq!(
            alice.lookup_signing_key("bob").unwrap(),
            bob.local().signing_public_key()
        );
        assert_eq!(
            alice.lookup_identity_key("bob").unwrap(),
            bob.local().identity_public_key()
        );
        assert_eq!(
            alice.session("bob").unwrap().agreement_key,
            bob.local().agreement_public_key()
        );
    }

    #[test]
    fn test_unknown_peer_has_no_session() {
        let alice = store();
        for result in [
            alice.lookup_signing_key("nobody").map(|_| ()),
            alice.lookup_identity_key("nobody").map(|_| ()),
            alice.lookup_symmetric_key("nobody").map(|_| ()),
        ] {
            assert!(matches!(
                result,
                Err(MeshError::Session(SessionError::NoSession { .. }))
            ));
        }
    }

    #[test]
    fn test_malformed_blob_creates_no_session() {
        let alice = store();
        let err = alice.ingest("bob", &[0u8; 95]).unwrap_err();

        assert!(matches!(
            err,
            MeshError::Session(SessionError::MalformedExchange { .. })
        ));
        assert!(!alice.contains("bob"));
    }

    #[test]
    fn test_low_order_agreement_key_rejected() {
        let alice = store();
        let bob = LocalIdentity::ephemeral();
        let blob = build_combined_blob(
            &[0u8; 32],
            &bob.signing_public_key(),
            &bob.identity_public_key(),
        );

        assert!(alice.ingest("bob", &blob).is_err());
        assert!(alice.is_empty());
    }

    #[test]
    fn test_second_exchange_overwrites() {
        let alice = store();
        let first = LocalIdentity::ephemeral();
        let second = LocalIdentity::ephemeral();

        alice
            .ingest("bob", &first.combined_public_key_data())
            .unwrap();
        alice
            .ingest("bob", &second.combined_public_key_data())
            .unwrap();

        assert_eq!(alice.len(), 1);
        assert_eq!(
            alice.lookup_signing_key("bob").unwrap(),
            second.signing_public_key()
        );
    }

    #[test]
    fn test_remove() {
        let alice = store();
        let bob = LocalIdentity::ephemeral();
        alice
            .ingest("bob", &bob.combined_public_key_data())
            .unwrap();

        assert!(alice.remove("bob"));
        assert!(!alice.remove("bob"));
        assert!(alice.lookup_symmetric_key("bob").is_err());
    }

    #[test]
    fn test_concurrent_ingest_and_lookup() {
        let alice = Arc::new(store());
        let peers: Vec<_> = (0..8).map(|_| LocalIdentity::ephemeral()).collect();

        let handles: Vec<_> = peers
            .iter()
            .enumerate()
            .map(|(i, peer)| {
                let alice = Arc::clone(&alice);
                let blob = peer.combined_public_key_data();
                std::thread::spawn(move || {
                    let id = format!("peer-{i}");
                    alice.ingest(&id, &blob).unwrap();
                    alice.lookup_symmetric_key(&id).unwrap();
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(alice.len(), 8);
        assert_eq!(alice.peer_ids()[0], "peer-0");
    }
}

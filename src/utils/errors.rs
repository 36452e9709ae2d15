//! Error types and handling for the mesh chat core.
//!
//! Every failure in the core is an explicit value. A malformed datagram from
//! any peer on a shared medium must never take the node down, so nothing here
//! is treated as fatal.

use thiserror::Error;

/// Result type alias for the mesh chat core
pub type Result<T> = std::result::Result<T, MeshError>;

/// Top-level error type for all core operations
#[derive(Error, Debug, Clone)]
pub enum MeshError {
    /// Wire-format errors
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Key exchange and peer session errors
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// Cryptographic operation errors
    #[error("Cryptographic error: {0}")]
    Crypto(#[from] CryptoError),

    /// Identity key storage errors
    #[error("Key store error: {0}")]
    Store(#[from] StoreError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Generic I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// Hex decoding errors
    #[error("Hex error: {0}")]
    Hex(#[from] hex::FromHexError),
}

/// Wire-format errors.
///
/// `Truncated`, `UnsupportedVersion`, `UnknownPacketType` and `TtlOutOfRange`
/// mean "could not parse; drop the datagram, keep the link".
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Input ended before the size announced by the header
    #[error("Truncated packet: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },

    /// Version byte other than the supported one
    #[error("Unsupported protocol version: {0}")]
    UnsupportedVersion(u8),

    /// Type byte outside the known packet types
    #[error("Unknown packet type: {0}")]
    UnknownPacketType(u8),

    /// Hop budget above the protocol maximum
    #[error("TTL out of range: {0}")]
    TtlOutOfRange(u8),

    /// Payload above the length the envelope can carry
    #[error("Payload too large: {size} bytes (max: {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// Structurally valid packet used in the wrong context
    #[error("Invalid message: {reason}")]
    InvalidMessage { reason: String },
}

/// Key exchange and peer session errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Combined key blob rejected; no session is created
    #[error("Malformed key exchange: {reason}")]
    MalformedExchange { reason: String },

    /// No key exchange has happened with this peer yet
    #[error("No session for peer: {peer_id}")]
    NoSession { peer_id: String },
}

/// Cryptographic operation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// AEAD tag did not verify, or input shorter than nonce + tag
    #[error("Authentication failed")]
    AuthenticationFailure,

    /// Signature did not verify
    #[error("Signature verification failed")]
    SignatureVerification,

    /// Invalid key format or size
    #[error("Invalid key: {reason}")]
    InvalidKey { reason: String },

    /// Key derivation failure
    #[error("Key derivation failed: {reason}")]
    KeyDerivation { reason: String },

    /// Encryption operation failure
    #[error("Encryption failed: {reason}")]
    Encryption { reason: String },

    /// The process-wide provider could not be registered or used
    #[error("Crypto provider unavailable: {reason}")]
    ProviderUnavailable { reason: String },
}

/// Identity key storage errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Backing storage could not be read or written
    #[error("Storage I/O failed: {reason}")]
    Io { reason: String },

    /// Stored key material could not be parsed
    #[error("Stored key is corrupt: {reason}")]
    Corrupt { reason: String },
}

/// Configuration and setup errors
#[derive(Error, Debug, Clone)]
pub enum ConfigError {
    /// Invalid configuration value
    #[error("Invalid configuration value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },

    /// Configuration parsing error
    #[error("Configuration parse error: {reason}")]
    ParseError { reason: String },

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Directory creation failure
    #[error("Failed to create directory: {path}")]
    DirectoryCreation { path: String },
}

impl MeshError {
    /// Returns true if the node can carry on after this error.
    ///
    /// Every protocol, session and crypto failure is scoped to one datagram
    /// or one peer.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Protocol(_) | Self::Session(_) | Self::Crypto(_)
        )
    }

    /// Returns true if this error indicates tampering or a forged packet.
    ///
    /// Callers should count these per peer and consider tearing the session
    /// down when they repeat.
    pub fn is_security_violation(&self) -> bool {
        matches!(
            self,
            Self::Crypto(CryptoError::AuthenticationFailure)
                | Self::Crypto(CryptoError::SignatureVerification)
        )
    }
}

impl From<std::io::Error> for MeshError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = MeshError::Protocol(ProtocolError::Truncated {
            expected: 24,
            actual: 20,
        });
        assert!(error.to_string().contains("expected 24 bytes, got 20"));
    }

    #[test]
    fn test_error_recovery() {
        let decode_error = MeshError::from(ProtocolError::UnsupportedVersion(2));
        assert!(decode_error.is_recoverable());

        let no_session = MeshError::from(SessionError::NoSession {
            peer_id: "0102030405060708".to_string(),
        });
        assert!(no_session.is_recoverable());

        let config_error = MeshError::from(ConfigError::FileNotFound {
            path: "meshchat.toml".to_string(),
        });
        assert!(!config_error.is_recoverable());
    }

    #[test]
    fn test_security_violations() {
        let auth_error = MeshError::Crypto(CryptoError::AuthenticationFailure);
        assert!(auth_error.is_security_violation());
        assert!(auth_error.is_recoverable());

        let malformed = MeshError::from(SessionError::MalformedExchange {
            reason: "wrong size".to_string(),
        });
        assert!(!malformed.is_security_violation());
    }
}

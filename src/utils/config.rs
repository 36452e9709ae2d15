//! Configuration management for the mesh chat core.
//!
//! TOML-based configuration layered from defaults, an optional file, and
//! environment variable overrides, validated before use.

use crate::protocol::{MAX_PAYLOAD_SIZE, MAX_TTL};
use crate::utils::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default configuration file name
pub const DEFAULT_CONFIG_FILE: &str = "meshchat.toml";

/// Environment variable prefix for configuration
pub const ENV_PREFIX: &str = "MESHCHAT";

/// Complete configuration for a mesh chat node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeshConfig {
    /// Packet construction settings
    pub protocol: ProtocolConfig,
    /// Cryptographic settings
    pub crypto: CryptoConfig,
    /// Storage configuration
    pub storage: StorageConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Packet construction settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolConfig {
    /// Hop budget stamped on outgoing packets
    pub default_ttl: u8,
    /// Application-level payload cap in bytes
    pub max_payload_size: usize,
    /// Sign outgoing key exchange announcements
    pub sign_announcements: bool,
}

/// Cryptographic settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CryptoConfig {
    /// HKDF salt; must match every interoperating peer
    pub hkdf_salt: String,
}

/// Storage and persistence configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Base directory for data storage
    pub data_dir: PathBuf,
    /// Directory for storing keys
    pub keys_dir: PathBuf,
    /// File name of the persistent identity key inside `keys_dir`
    pub identity_file: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    pub level: String,
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            protocol: ProtocolConfig::default(),
            crypto: CryptoConfig::default(),
            storage: StorageConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            default_ttl: crate::defaults::DEFAULT_TTL,
            max_payload_size: MAX_PAYLOAD_SIZE,
            sign_announcements: true,
        }
    }
}

impl Default for CryptoConfig {
    fn default() -> Self {
        Self {
            hkdf_salt: crate::defaults::DEFAULT_HKDF_SALT.to_string(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("meshchat");

        Self {
            keys_dir: data_dir.join("keys"),
            data_dir,
            identity_file: "identity_key".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl StorageConfig {
    /// Full path of the persistent identity key
    pub fn identity_path(&self) -> PathBuf {
        self.keys_dir.join(&self.identity_file)
    }

    /// Point all storage at a new base directory
    pub fn rebase(&mut self, data_dir: PathBuf) {
        self.keys_dir = data_dir.join("keys");
        self.data_dir = data_dir;
    }
}

impl MeshConfig {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read, parsed, or fails validation
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
            path: path.display().to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(ConfigError::from)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from defaults, a file, then the environment
    ///
    /// Without an explicit path, `meshchat.toml` in the working directory and
    /// then in the user config directory are tried.
    ///
    /// # Errors
    ///
    /// Returns error if an explicit file is missing, a file cannot be parsed, an
    /// environment override is malformed, or validation fails
    pub fn load(config_file: Option<&Path>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(path) = config_file {
            if path.exists() {
                config = Self::from_file(path)?;
            } else {
                return Err(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                }
                .into());
            }
        } else {
            let default_locations = [
                PathBuf::from(DEFAULT_CONFIG_FILE),
                dirs::config_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join("meshchat")
                    .join(DEFAULT_CONFIG_FILE),
            ];

            if let Some(location) = default_locations.iter().find(|l| l.exists()) {
                config = Self::from_file(location)?;
            }
        }

        config = config.merge_from_env()?;
        config.validate()?;

        Ok(config)
    }

    /// Save configuration to a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be written
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path, self.to_toml_string()?)?;
        Ok(())
    }

    fn merge_from_env(mut self) -> Result<Self> {
        let ttl_var = format!("{ENV_PREFIX}_PROTOCOL_DEFAULT_TTL");
        if let Ok(ttl) = std::env::var(&ttl_var) {
            self.protocol.default_ttl = ttl.parse().map_err(|_| ConfigError::InvalidValue {
                field: ttl_var,
                value: ttl,
            })?;
        }

        if let Ok(level) = std::env::var(format!("{ENV_PREFIX}_LOGGING_LEVEL")) {
            self.logging.level = level;
        }

        if let Ok(data_dir) = std::env::var(format!("{ENV_PREFIX}_STORAGE_DATA_DIR")) {
            self.storage.rebase(PathBuf::from(data_dir));
        }

        Ok(self)
    }

    /// Validate the configuration for consistency and correctness
    ///
    /// # Errors
    ///
    /// `ConfigError::InvalidValue` naming the first out-of-range field
    pub fn validate(&self) -> Result<()> {
        if self.protocol.default_ttl > MAX_TTL {
            return Err(ConfigError::InvalidValue {
                field: "protocol.default_ttl".to_string(),
                value: self.protocol.default_ttl.to_string(),
            }
            .into());
        }

        if self.protocol.max_payload_size > MAX_PAYLOAD_SIZE {
            return Err(ConfigError::InvalidValue {
                field: "protocol.max_payload_size".to_string(),
                value: self.protocol.max_payload_size.to_string(),
            }
            .into());
        }

        if self.crypto.hkdf_salt.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "crypto.hkdf_salt".to_string(),
                value: String::new(),
            }
            .into());
        }

        if self.storage.identity_file.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "storage.identity_file".to_string(),
                value: String::new(),
            }
            .into());
        }

        match self.logging.level.as_str() {
            "error" | "warn" | "info" | "debug" | "trace" => {}
            _ => {
                return Err(ConfigError::InvalidValue {
                    field: "logging.level".to_string(),
                    value: self.logging.level.clone(),
                }
                .into());
            }
        }

        Ok(())
    }

    /// Ensure all required directories exist
    ///
    /// # Errors
    ///
    /// `ConfigError::DirectoryCreation` if a directory cannot be created
    pub fn ensure_directories(&self) -> Result<()> {
        for dir in [&self.storage.data_dir, &self.storage.keys_dir] {
            if !dir.exists() {
                std::fs::create_dir_all(dir).map_err(|_| ConfigError::DirectoryCreation {
                    path: dir.display().to_string(),
                })?;
            }
        }

        Ok(())
    }

    /// Get the configuration as a pretty-printed TOML string
    ///
    /// # Errors
    ///
    /// `ConfigError::ParseError` if serialization fails
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| {
            ConfigError::ParseError {
                reason: e.to_string(),
            }
            .into()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::{NamedTempFile, TempDir};

    #[test]
    fn test_default_config() {
        let config = MeshConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.protocol.default_ttl, MAX_TTL);
        assert_eq!(config.protocol.max_payload_size, 500);
        assert_eq!(config.crypto.hkdf_salt, "bitchat-v1");
    }

    #[test]
    fn test_config_serialization() {
        let config = MeshConfig::default();
        let toml_str = config.to_toml_string().unwrap();
        assert!(toml_str.contains("default_ttl"));
        assert!(toml_str.contains("hkdf_salt"));
    }

    #[test]
    fn test_config_file_operations() {
        let mut config = MeshConfig::default();
        config.protocol.default_ttl = 3;
        let temp_file = NamedTempFile::new().unwrap();

        config.save(temp_file.path()).unwrap();
        let loaded = MeshConfig::from_file(temp_file.path()).unwrap();

        assert_eq!(loaded.protocol.default_ttl, 3);
        assert_eq!(loaded.storage.keys_dir, config.storage.keys_dir);
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("absent.toml");
        assert!(MeshConfig::load(Some(&missing)).is_err());
    }

    #[test]
    fn test_config_validation() {
        let mut config = MeshConfig::default();
        config.protocol.default_ttl = MAX_TTL + 1;
        assert!(config.validate().is_err());

        config = MeshConfig::default();
        config.protocol.max_payload_size = MAX_PAYLOAD_SIZE + 1;
        assert!(config.validate().is_err());

        config = MeshConfig::default();
        config.crypto.hkdf_salt.clear();
        assert!(config.validate().is_err());

        config = MeshConfig::default();
        config.logging.level = "loud".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_override() {
        std::env::set_var("MESHCHAT_PROTOCOL_DEFAULT_TTL", "2");
        let config = MeshConfig::default().merge_from_env().unwrap();
        std::env::remove_var("MESHCHAT_PROTOCOL_DEFAULT_TTL");

        assert_eq!(config.protocol.default_ttl, 2);
    }

    #[test]
    fn test_rebase_keeps_keys_under_data_dir() {
        let mut config = MeshConfig::default();
        config.storage.rebase(PathBuf::from("/tmp/meshchat-test"));

        assert!(config.storage.keys_dir.starts_with(&config.storage.data_dir));
        assert!(config.storage.identity_path().starts_with(&config.storage.keys_dir));
    }

    #[test]
    fn test_ensure_directories() {
        let dir = TempDir::new().unwrap();
        let mut config = MeshConfig::default();
        config.storage.rebase(dir.path().join("node"));

        config.ensure_directories().unwrap();
        assert!(config.storage.keys_dir.is_dir());
    }
}

//! Configuration management for the quorum client

use quorum_log::LogFormat;
use quorum_types::FeeTable;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    /// I/O error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error
    #[error("toml parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization error
    #[error("toml serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    /// Invalid fee settings
    #[error(transparent)]
    Fee(#[from] quorum_types::ConfigError),

    #[error("unknown configuration key: {0}")]
    UnknownKey(String),

    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

/// Client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Node RPC endpoint
    pub node: String,
    /// Chain ID
    pub chain_id: String,
    /// Human-readable part used when displaying addresses
    pub bech32_prefix: String,
    /// Request timeout in seconds
    pub timeout: u64,
    /// Log filter, e.g. `info` or `quorum_client=debug`
    pub log_level: String,
    pub log_format: LogFormat,
    /// Gas price and per-operation gas limits
    pub fees: FeeTable,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            node: "http://localhost:26657".to_string(),
            chain_id: "testing".to_string(),
            bech32_prefix: "cosmos".to_string(),
            timeout: 30,
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            fees: FeeTable::default(),
        }
    }
}

impl ClientConfig {
    /// Load configuration from file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let config: ClientConfig = toml::from_str(&content)?;
        config.fees.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Get default configuration directory
    pub fn default_config_dir() -> PathBuf {
        if let Some(home) = dirs::home_dir() {
            home.join(".quorum")
        } else {
            PathBuf::from(".quorum")
        }
    }

    /// Configuration file inside a home directory
    pub fn config_file_in(home: &Path) -> PathBuf {
        home.join("config.toml")
    }

    /// Get default configuration file path
    pub fn default_config_file() -> PathBuf {
        Self::config_file_in(&Self::default_config_dir())
    }

    /// Load configuration from `home` or fall back to defaults
    pub fn load_or_default_in(home: &Path) -> Result<Self, ConfigError> {
        let config_path = Self::config_file_in(home);

        if config_path.exists() {
            Self::load_from_file(config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from default location or create default
    pub fn load_or_default() -> Result<Self, ConfigError> {
        Self::load_or_default_in(&Self::default_config_dir())
    }

    /// Initialize configuration directory and file under `home`
    pub fn init_in(home: &Path, overwrite: bool) -> Result<Self, ConfigError> {
        let config_file = Self::config_file_in(home);

        if !home.exists() {
            fs::create_dir_all(home)?;
        }

        if config_file.exists() && !overwrite {
            return Self::load_from_file(config_file);
        }

        let config = Self::default();
        config.save_to_file(config_file)?;
        Ok(config)
    }

    /// Initialize configuration directory and file
    pub fn init(overwrite: bool) -> Result<Self, ConfigError> {
        Self::init_in(&Self::default_config_dir(), overwrite)
    }

    /// Set a configuration value
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let invalid = || ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        };

        match key {
            "node" => self.node = value.to_string(),
            "chain_id" => self.chain_id = value.to_string(),
            "bech32_prefix" => self.bech32_prefix = value.to_string(),
            "timeout" => self.timeout = value.parse().map_err(|_| invalid())?,
            "log_level" => self.log_level = value.to_string(),
            "log_format" => self.log_format = value.parse().map_err(|_| invalid())?,
            "gas_price" => self.fees.gas_price = value.parse()?,
            "fees.send" => self.fees.send = value.parse().map_err(|_| invalid())?,
            "fees.exec" => self.fees.exec = value.parse().map_err(|_| invalid())?,
            "fees.upload" => self.fees.upload = value.parse().map_err(|_| invalid())?,
            "fees.init" => self.fees.init = value.parse().map_err(|_| invalid())?,
            "fees.migrate" => self.fees.migrate = value.parse().map_err(|_| invalid())?,
            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        }
        self.fees.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quorum_types::FeeKind;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.node, "http://localhost:26657");
        assert_eq!(config.bech32_prefix, "cosmos");
        assert_eq!(config.timeout, 30);
        assert_eq!(config.fees.gas_price.to_string(), "0.025ucosm");
        assert_eq!(config.fees.gas_limit(FeeKind::Exec), 200_000);
    }

    #[test]
    fn test_save_and_load_config() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.toml");

        let mut original_config = ClientConfig::default();
        original_config.set("chain_id", "test-chain").unwrap();
        original_config.set("gas_price", "0.5uatom").unwrap();
        original_config.set("log_format", "json").unwrap();

        original_config.save_to_file(&config_path).unwrap();
        let loaded_config = ClientConfig::load_from_file(&config_path).unwrap();

        assert_eq!(loaded_config, original_config);
        let text = fs::read_to_string(&config_path).unwrap();
        assert!(text.contains("gas_price = \"0.5uatom\""));
    }

    #[test]
    fn test_init_in_creates_file_once() {
        let temp_dir = tempdir().unwrap();
        let home = temp_dir.path().join("home");

        let created = ClientConfig::init_in(&home, false).unwrap();
        assert!(ClientConfig::config_file_in(&home).exists());

        let mut changed = created.clone();
        changed.set("node", "http://node:26657").unwrap();
        changed
            .save_to_file(ClientConfig::config_file_in(&home))
            .unwrap();

        let reloaded = ClientConfig::init_in(&home, false).unwrap();
        assert_eq!(reloaded.node, "http://node:26657");

        let reset = ClientConfig::init_in(&home, true).unwrap();
        assert_eq!(reset, ClientConfig::default());
    }

    #[test]
    fn test_load_or_default_without_file() {
        let temp_dir = tempdir().unwrap();
        let config = ClientConfig::load_or_default_in(temp_dir.path()).unwrap();
        assert_eq!(config, ClientConfig::default());
    }

    #[test]
    fn test_set_config_values() {
        let mut config = ClientConfig::default();

        config.set("node", "http://localhost:8080").unwrap();
        assert_eq!(config.node, "http://localhost:8080");

        config.set("timeout", "60").unwrap();
        assert_eq!(config.timeout, 60);

        config.set("fees.upload", "2000000").unwrap();
        assert_eq!(config.fees.upload, 2_000_000);

        assert!(matches!(
            config.set("invalid_key", "value"),
            Err(ConfigError::UnknownKey(_))
        ));
        assert!(matches!(
            config.set("timeout", "invalid"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(config.set("gas_price", "free"), Err(ConfigError::Fee(_))));
        assert!(matches!(config.set("fees.send", "0"), Err(ConfigError::Fee(_))));
    }

    #[test]
    fn test_rejects_invalid_file() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(&path, "node = 5").unwrap();
        assert!(matches!(
            ClientConfig::load_from_file(&path),
            Err(ConfigError::Toml(_))
        ));
    }
}

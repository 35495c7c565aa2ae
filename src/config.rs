//! Runtime configuration from environment variables

use std::env;

#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Path to the JSONL event feed written by the transport adapter
    pub event_feed_path: String,
    /// SQLite database path for the reconciliation store
    pub db_path: String,
    /// Contract package hashes to ingest, one subscription each
    pub contract_package_hashes: Vec<String>,
    /// Event-name allow-list applied per subscription
    pub event_names: Vec<String>,
    /// Where to start when no checkpoint exists yet
    pub start_block_height: u64,
    /// Bound of the per-subscription event channel
    pub channel_capacity: usize,
    pub rust_log: String,
}

#[derive(Debug)]
pub enum ConfigError {
    MissingVariable(String),
    InvalidValue(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::MissingVariable(var) => write!(f, "Missing environment variable: {}", var),
            ConfigError::InvalidValue(msg) => write!(f, "Invalid configuration value: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

impl IngestConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let event_feed_path = env::var("EVENT_FEED_PATH")
            .map_err(|_| ConfigError::MissingVariable("EVENT_FEED_PATH".to_string()))?;

        let db_path = env::var("DB_PATH").unwrap_or_else(|_| "marketflow.db".to_string());

        let contract_package_hashes: Vec<String> = env::var("CONTRACT_PACKAGE_HASHES")
            .map_err(|_| ConfigError::MissingVariable("CONTRACT_PACKAGE_HASHES".to_string()))?
            .split(',')
            .map(|h| h.trim().to_string())
            .filter(|h| !h.is_empty())
            .collect();

        if contract_package_hashes.is_empty() {
            return Err(ConfigError::InvalidValue(
                "CONTRACT_PACKAGE_HASHES must list at least one hash".to_string(),
            ));
        }
        for hash in &contract_package_hashes {
            validate_package_hash(hash)?;
        }

        // Empty or unset means every event name the parser understands
        let event_names: Vec<String> = env::var("EVENT_NAMES")
            .map(|s| {
                s.split(',')
                    .map(|n| n.trim().to_string())
                    .filter(|n| !n.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let start_block_height = env::var("START_BLOCK_HEIGHT")
            .unwrap_or_else(|_| "0".to_string())
            .parse::<u64>()
            .map_err(|_| {
                ConfigError::InvalidValue("START_BLOCK_HEIGHT must be an unsigned integer".to_string())
            })?;

        let channel_capacity = env::var("CHANNEL_CAPACITY")
            .unwrap_or_else(|_| "10000".to_string())
            .parse::<usize>()
            .map_err(|_| {
                ConfigError::InvalidValue("CHANNEL_CAPACITY must be an unsigned integer".to_string())
            })?;
        if channel_capacity == 0 {
            return Err(ConfigError::InvalidValue(
                "CHANNEL_CAPACITY must be greater than zero".to_string(),
            ));
        }

        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            event_feed_path,
            db_path,
            contract_package_hashes,
            event_names,
            start_block_height,
            channel_capacity,
            rust_log,
        })
    }
}

/// Contract package hashes are 32 bytes hex-encoded (64 chars).
pub fn validate_package_hash(hash: &str) -> Result<(), ConfigError> {
    match hex::decode(hash) {
        Ok(bytes) if bytes.len() == 32 => Ok(()),
        Ok(bytes) => Err(ConfigError::InvalidValue(format!(
            "contract package hash must be 32 bytes, got {}: {}",
            bytes.len(),
            hash
        ))),
        Err(_) => Err(ConfigError::InvalidValue(format!(
            "contract package hash is not valid hex: {}",
            hash
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_package_hash() {
        let hash = "5ede076610dedae5ec3aa581efcc9548c8a141350ce5b9713d87ed5d9bc56954";
        assert!(validate_package_hash(hash).is_ok());
    }

    #[test]
    fn test_wrong_length_hash_rejected() {
        assert!(validate_package_hash("5ede07").is_err());
    }

    #[test]
    fn test_non_hex_hash_rejected() {
        let hash = "zzde076610dedae5ec3aa581efcc9548c8a141350ce5b9713d87ed5d9bc56954";
        assert!(validate_package_hash(hash).is_err());
    }
}

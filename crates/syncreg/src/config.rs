// Path: crates/syncreg/src/config.rs

//! Registry configuration, read from TOML.

use crate::codec::MAX_BUCKETS;
use crate::error::ConfigError;
use crate::registry::DEFAULT_MAX_DIMENSIONS;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegistryConfig {
    /// Highest dimensionality with its own bucket. Broader cubes are answered
    /// through lower buckets but never stored.
    pub max_dimensions: usize,
    /// Quiet period after a change before the snapshot is written.
    pub flush_debounce_ms: u64,
    /// Prefix of the blob-store key of each connection's registry.
    pub key_prefix: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            max_dimensions: DEFAULT_MAX_DIMENSIONS,
            flush_debounce_ms: 500,
            key_prefix: "syncreg".to_owned(),
        }
    }
}

impl RegistryConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_dimensions == 0 || self.max_dimensions as u64 > MAX_BUCKETS {
            return Err(ConfigError::Invalid(format!(
                "max_dimensions must be within 1..={MAX_BUCKETS}, got {}",
                self.max_dimensions
            )));
        }
        if self.key_prefix.is_empty() {
            return Err(ConfigError::Invalid("key_prefix must not be empty".into()));
        }
        Ok(())
    }

    pub fn flush_debounce(&self) -> Duration {
        Duration::from_millis(self.flush_debounce_ms)
    }

    /// Blob-store key of the registry for `connection_id`.
    pub fn storage_key(&self, connection_id: &str) -> String {
        format!("{}/{}", self.key_prefix, connection_id)
    }
}

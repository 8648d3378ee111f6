use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::eviction::EvictionPolicyKind;

/// Construction-time configuration for an [`IndexedStore`](crate::IndexedStore).
///
/// All fields are fixed for the lifetime of the store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Upper bound on total payload bytes. `None` or `Some(0)` means unbounded.
    pub capacity: Option<u64>,
    /// Which victims to drop when `capacity` is exceeded.
    pub eviction_policy: EvictionPolicyKind,
    /// Reject entries whose payload is empty.
    pub reject_empty_payload: bool,
    /// Reject entries larger than this many bytes.
    pub max_entry_bytes: Option<u64>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            capacity: None,
            eviction_policy: EvictionPolicyKind::SizeFifo,
            reject_empty_payload: true,
            max_entry_bytes: None,
        }
    }
}

impl StoreConfig {
    /// A store bounded to `capacity` bytes with otherwise default settings.
    pub fn bounded(capacity: u64) -> Self {
        Self {
            capacity: Some(capacity),
            ..Default::default()
        }
    }

    pub fn with_policy(mut self, policy: EvictionPolicyKind) -> Self {
        self.eviction_policy = policy;
        self
    }

    pub fn with_max_entry_bytes(mut self, max: u64) -> Self {
        self.max_entry_bytes = Some(max);
        self
    }

    /// Accept entries with an empty payload.
    pub fn allow_empty_payload(mut self) -> Self {
        self.reject_empty_payload = false;
        self
    }

    /// The capacity actually enforced, treating `Some(0)` as unbounded.
    pub fn effective_capacity(&self) -> Option<u64> {
        self.capacity.filter(|c| *c > 0)
    }

    /// Parse a configuration from TOML. Missing keys take their defaults.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    /// Load a configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }
}

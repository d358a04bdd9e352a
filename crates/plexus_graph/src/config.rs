// SPDX-License-Identifier: MIT OR Apache-2.0
//! Engine configuration, stored as RON.

use crate::error::{GraphError, Result};
use crate::fingerprint::Fingerprint;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// How often cached fingerprints are checked against a fresh hash
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HashValidation {
    /// Never check
    Off,
    /// Check roughly one lookup in `every`, selected by fingerprint
    Sampled {
        /// Sampling interval
        every: u32,
    },
    /// Check every lookup
    Full,
}

impl HashValidation {
    /// Whether a lookup that produced `fingerprint` should be checked
    pub fn should_check(&self, fingerprint: Fingerprint) -> bool {
        match self {
            Self::Off => false,
            Self::Sampled { every } => *every <= 1 || fingerprint.low_bits() % u64::from(*every) == 0,
            Self::Full => true,
        }
    }

    /// Whether any checking is enabled
    pub fn is_enabled(&self) -> bool {
        !matches!(self, Self::Off)
    }
}

/// Graph engine settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Per-shard capacity of the plug+context to fingerprint cache
    pub hash_cache_capacity: usize,
    /// Number of independently locked buckets in each cache
    pub cache_shards: usize,
    /// Consistency checking of cached fingerprints
    pub hash_validation: HashValidation,
    /// Whether a failed consistency check is an error rather than a warning
    pub fatal_hash_mismatch: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            hash_cache_capacity: 4096,
            cache_shards: 16,
            hash_validation: if cfg!(debug_assertions) {
                HashValidation::Full
            } else {
                HashValidation::Off
            },
            fatal_hash_mismatch: cfg!(debug_assertions),
        }
    }
}

impl EngineConfig {
    /// Parse from a RON string
    pub fn from_ron_str(content: &str) -> Result<Self> {
        let config: Self = ron::from_str(content).map_err(|e| GraphError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a RON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| GraphError::Config(format!("{}: {e}", path.display())))?;
        Self::from_ron_str(&content)
    }

    /// Serialize to pretty RON
    pub fn to_ron_string(&self) -> Result<String> {
        let pretty = ron::ser::PrettyConfig::default().struct_names(true);
        ron::ser::to_string_pretty(self, pretty).map_err(|e| GraphError::Config(e.to_string()))
    }

    /// Save to a RON file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = self.to_ron_string()?;
        std::fs::write(path, content)
            .map_err(|e| GraphError::Config(format!("{}: {e}", path.display())))
    }

    fn validate(&self) -> Result<()> {
        if self.cache_shards == 0 {
            return Err(GraphError::Config("cache_shards must be at least 1".to_string()));
        }
        if self.hash_cache_capacity == 0 {
            return Err(GraphError::Config(
                "hash_cache_capacity must be at least 1".to_string(),
            ));
        }
        if let HashValidation::Sampled { every: 0 } = self.hash_validation {
            return Err(GraphError::Config("sampling interval must be at least 1".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ron_roundtrip() {
        let config = EngineConfig {
            hash_cache_capacity: 64,
            cache_shards: 4,
            hash_validation: HashValidation::Sampled { every: 8 },
            fatal_hash_mismatch: false,
        };
        let text = config.to_ron_string().unwrap();
        assert_eq!(EngineConfig::from_ron_str(&text).unwrap(), config);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config = EngineConfig::from_ron_str("(cache_shards: 2)").unwrap();
        assert_eq!(config.cache_shards, 2);
        assert_eq!(config.hash_cache_capacity, EngineConfig::default().hash_cache_capacity);
    }

    #[test]
    fn test_rejects_zero_shards() {
        assert!(matches!(
            EngineConfig::from_ron_str("(cache_shards: 0)"),
            Err(GraphError::Config(_))
        ));
    }

    #[test]
    fn test_sampling() {
        assert!(HashValidation::Full.should_check(Fingerprint(3)));
        assert!(!HashValidation::Off.should_check(Fingerprint(0)));
        let sampled = HashValidation::Sampled { every: 4 };
        assert!(sampled.should_check(Fingerprint(8)));
        assert!(!sampled.should_check(Fingerprint(9)));
    }
}

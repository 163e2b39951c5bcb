// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Block-parallel scan configuration.

use std::num::NonZeroUsize;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Symbols per block when nothing else is configured.
pub const DEFAULT_BLOCK_SIZE: usize = 4096;

/// Error type for scan configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// `workers` was zero.
    #[error("workers must be at least 1")]
    ZeroWorkers,
    /// `block_size` was zero.
    #[error("block_size must be at least 1")]
    ZeroBlockSize,
    /// Serialization/deserialization failure.
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// How [`crate::scan_parallel`] splits and schedules its input.
///
/// Missing JSON fields fall back to [`ScanConfig::default`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Worker threads used for scanning and for each reduction level.
    pub workers: usize,
    /// Input symbols per block.
    pub block_size: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            workers: std::thread::available_parallelism().map_or(1, NonZeroUsize::get),
            block_size: DEFAULT_BLOCK_SIZE,
        }
    }
}

impl ScanConfig {
    /// Explicit worker count and block size.
    pub fn new(workers: usize, block_size: usize) -> Self {
        Self {
            workers,
            block_size,
        }
    }

    /// Rejects settings the driver cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::ZeroWorkers);
        }
        if self.block_size == 0 {
            return Err(ConfigError::ZeroBlockSize);
        }
        Ok(())
    }

    /// Parses and validates a JSON config.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Pretty-printed JSON form.
    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = ScanConfig::default();
        assert!(config.workers >= 1);
        assert_eq!(config.block_size, DEFAULT_BLOCK_SIZE);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn missing_fields_use_defaults() {
        let config = ScanConfig::from_json(r#"{"block_size": 64}"#).unwrap();
        assert_eq!(config.block_size, 64);
        assert_eq!(config.workers, ScanConfig::default().workers);
    }

    #[test]
    fn zero_values_are_rejected() {
        assert!(matches!(
            ScanConfig::from_json(r#"{"workers": 0}"#),
            Err(ConfigError::ZeroWorkers)
        ));
        assert!(matches!(
            ScanConfig::new(2, 0).validate(),
            Err(ConfigError::ZeroBlockSize)
        ));
    }

    #[test]
    fn malformed_json_is_a_serde_error() {
        assert!(matches!(
            ScanConfig::from_json("{\"workers\": \"many\"}"),
            Err(ConfigError::Serde(_))
        ));
    }

    #[test]
    fn json_round_trip() {
        let config = ScanConfig::new(3, 17);
        let json = config.to_json().unwrap();
        assert_eq!(ScanConfig::from_json(&json).unwrap(), config);
    }
}

//! # Pool Configuration Module
//!
//! Provides configuration for the shared-buffer sound pool.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a `PoolConfig`
//! and validates it fail-fast, so a pool is never created with settings the
//! playback layer cannot honor (zero streams, an inverted rate range, or a
//! default volume outside `0.0..=1.0`).
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::config::PoolConfig;
//!
//! let config = PoolConfig::builder()
//!     .max_streams(16)
//!     .rate_range(0.5, 2.0)
//!     .build()
//!     .expect("valid pool config");
//!
//! assert_eq!(config.max_streams, 16);
//! ```
//!
//! ## Error Handling
//!
//! ```should_panic
//! use core_runtime::config::PoolConfig;
//!
//! // A pool with no streams is rejected
//! let config = PoolConfig::builder()
//!     .max_streams(0)
//!     .build()
//!     .expect("Should fail - max_streams must be positive");
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Default number of simultaneous streams a host pool is created with.
pub const DEFAULT_MAX_STREAMS: u32 = 32;

/// Slowest playback rate a sample pool supports.
pub const DEFAULT_MIN_RATE: f32 = 0.5;

/// Fastest playback rate a sample pool supports.
pub const DEFAULT_MAX_RATE: f32 = 2.0;

/// Configuration for a sound pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Simultaneous streams the host should configure its platform pool with.
    pub max_streams: u32,

    /// Lowest accepted playback rate.
    pub min_rate: f32,

    /// Highest accepted playback rate.
    pub max_rate: f32,

    /// Volume new players start with.
    pub default_volume: f32,

    /// Rate new players start with.
    pub default_rate: f32,

    /// Mirror player lifecycle messages onto the per-player `log` channel.
    pub emit_player_logs: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_streams: DEFAULT_MAX_STREAMS,
            min_rate: DEFAULT_MIN_RATE,
            max_rate: DEFAULT_MAX_RATE,
            default_volume: 1.0,
            default_rate: 1.0,
            emit_player_logs: true,
        }
    }
}

impl PoolConfig {
    /// Create a new builder seeded with the defaults.
    pub fn builder() -> PoolConfigBuilder {
        PoolConfigBuilder::default()
    }

    /// Returns `true` if `rate` is inside the accepted range.
    pub fn accepts_rate(&self, rate: f32) -> bool {
        rate >= self.min_rate && rate <= self.max_rate
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] describing the first invalid setting.
    pub fn validate(&self) -> Result<()> {
        if self.max_streams == 0 {
            return Err(Error::Config("max_streams must be at least 1".to_string()));
        }

        if !(self.min_rate > 0.0 && self.min_rate <= 1.0 && self.max_rate >= 1.0) {
            return Err(Error::Config(format!(
                "rate range [{}, {}] must satisfy 0 < min <= 1 <= max",
                self.min_rate, self.max_rate
            )));
        }

        if !(0.0..=1.0).contains(&self.default_volume) {
            return Err(Error::Config(format!(
                "default_volume {} must be between 0.0 and 1.0",
                self.default_volume
            )));
        }

        if !self.accepts_rate(self.default_rate) {
            return Err(Error::Config(format!(
                "default_rate {} is outside [{}, {}]",
                self.default_rate, self.min_rate, self.max_rate
            )));
        }

        Ok(())
    }
}

/// Builder for [`PoolConfig`].
#[derive(Debug, Clone, Default)]
pub struct PoolConfigBuilder {
    config: PoolConfig,
}

impl PoolConfigBuilder {
    /// Set the number of simultaneous platform streams.
    pub fn max_streams(mut self, streams: u32) -> Self {
        self.config.max_streams = streams;
        self
    }

    /// Set the accepted playback rate range.
    pub fn rate_range(mut self, min: f32, max: f32) -> Self {
        self.config.min_rate = min;
        self.config.max_rate = max;
        self
    }

    pub fn default_volume(mut self, volume: f32) -> Self {
        self.config.default_volume = volume;
        self
    }

    pub fn default_rate(mut self, rate: f32) -> Self {
        self.config.default_rate = rate;
        self
    }

    /// Enable or disable per-player log events.
    pub fn emit_player_logs(mut self, enabled: bool) -> Self {
        self.config.emit_player_logs = enabled;
        self
    }

    /// Validate and build the configuration.
    pub fn build(self) -> Result<PoolConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = PoolConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_streams, 32);
        assert!(config.emit_player_logs);
    }

    #[test]
    fn test_builder_overrides() {
        let config = PoolConfig::builder()
            .max_streams(4)
            .rate_range(0.25, 4.0)
            .default_volume(0.5)
            .default_rate(2.0)
            .emit_player_logs(false)
            .build()
            .unwrap();

        assert_eq!(config.max_streams, 4);
        assert_eq!(config.min_rate, 0.25);
        assert_eq!(config.max_rate, 4.0);
        assert_eq!(config.default_volume, 0.5);
        assert_eq!(config.default_rate, 2.0);
        assert!(!config.emit_player_logs);
    }

    #[test]
    fn test_validate_rejects_zero_streams() {
        let result = PoolConfig::builder().max_streams(0).build();
        assert!(matches!(result, Err(Error::Config(msg)) if msg.contains("max_streams")));
    }

    #[test]
    fn test_validate_rejects_inverted_rate_range() {
        assert!(PoolConfig::builder().rate_range(1.5, 0.5).build().is_err());
        assert!(PoolConfig::builder().rate_range(0.0, 2.0).build().is_err());
    }

    #[test]
    fn test_validate_rejects_out_of_range_defaults() {
        assert!(PoolConfig::builder().default_volume(1.5).build().is_err());
        assert!(PoolConfig::builder().default_volume(-0.1).build().is_err());
        assert!(PoolConfig::builder().default_rate(3.0).build().is_err());
    }

    #[test]
    fn test_accepts_rate() {
        let config = PoolConfig::default();
        assert!(config.accepts_rate(0.5));
        assert!(config.accepts_rate(2.0));
        assert!(!config.accepts_rate(0.49));
        assert!(!config.accepts_rate(f32::NAN));
    }

    #[test]
    fn test_config_deserializes_with_defaults() {
        let config: PoolConfig = serde_json::from_str(r#"{"max_streams": 8}"#).unwrap();
        assert_eq!(config.max_streams, 8);
        assert_eq!(config.min_rate, DEFAULT_MIN_RATE);
        assert!(config.validate().is_ok());
    }
}

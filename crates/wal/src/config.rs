//! WAL configuration.
//!
//! This module provides the tuning knobs recognized by the WAL: segment
//! rotation and index thresholds, the request-channel capacity, and the
//! periods of the background checkpoint and reap ticks.

use std::path::PathBuf;
use std::time::Duration;

/// WAL configuration parameters.
///
/// `directory` is the only field without a sane default — it must be
/// supplied by the caller. Everything else has a default matching §6 of
/// the design: rotate every ~1024 requests, checkpoint every ~1024,
/// bookmark every ~32768, a request channel capacity of ~10, and a 1s
/// checkpoint/reap tick period.
#[derive(Debug, Clone)]
pub struct WalConfig {
    /// Directory the WAL owns. Created (mode 0755) if missing.
    pub directory: PathBuf,

    /// Requests written to the active segment before it is rotated.
    pub rotate_threshold: u32,

    /// Requests landed since the last checkpoint before one is forced.
    pub checkpoint_threshold: u32,

    /// Requests landed since the last bookmark sync before one is forced.
    pub bookmark_threshold: u32,

    /// Capacity of the bounded request channel feeding the actor.
    pub channel_capacity: usize,

    /// How often the actor's checkpoint tick fires.
    pub checkpoint_tick: Duration,

    /// How often the actor's reap tick fires.
    pub reap_tick: Duration,
}

impl WalConfig {
    /// Create a configuration for `directory` with every other knob at
    /// its default value.
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        WalConfig {
            directory: directory.into(),
            ..Self::defaults()
        }
    }

    fn defaults() -> Self {
        WalConfig {
            directory: PathBuf::new(),
            rotate_threshold: 1024,
            checkpoint_threshold: 1024,
            bookmark_threshold: 32 * 1024,
            channel_capacity: 10,
            checkpoint_tick: Duration::from_secs(1),
            reap_tick: Duration::from_secs(1),
        }
    }

    /// Set the rotation threshold (builder pattern).
    pub fn with_rotate_threshold(mut self, n: u32) -> Self {
        self.rotate_threshold = n;
        self
    }

    /// Set the checkpoint threshold (builder pattern).
    pub fn with_checkpoint_threshold(mut self, n: u32) -> Self {
        self.checkpoint_threshold = n;
        self
    }

    /// Set the bookmark threshold (builder pattern).
    pub fn with_bookmark_threshold(mut self, n: u32) -> Self {
        self.bookmark_threshold = n;
        self
    }

    /// Set the request channel capacity (builder pattern).
    pub fn with_channel_capacity(mut self, n: usize) -> Self {
        self.channel_capacity = n;
        self
    }

    /// Set the checkpoint tick period (builder pattern).
    pub fn with_checkpoint_tick(mut self, d: Duration) -> Self {
        self.checkpoint_tick = d;
        self
    }

    /// Set the reap tick period (builder pattern).
    pub fn with_reap_tick(mut self, d: Duration) -> Self {
        self.reap_tick = d;
        self
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), WalConfigError> {
        if self.rotate_threshold == 0 {
            return Err(WalConfigError::ZeroThreshold("rotate_threshold"));
        }
        if self.checkpoint_threshold == 0 {
            return Err(WalConfigError::ZeroThreshold("checkpoint_threshold"));
        }
        if self.bookmark_threshold == 0 {
            return Err(WalConfigError::ZeroThreshold("bookmark_threshold"));
        }
        if self.channel_capacity == 0 {
            return Err(WalConfigError::ZeroThreshold("channel_capacity"));
        }
        Ok(())
    }

    /// A configuration optimized for testing: small thresholds so
    /// rotation, checkpointing, and bookmarking all happen quickly.
    pub fn for_testing(directory: impl Into<PathBuf>) -> Self {
        WalConfig {
            directory: directory.into(),
            rotate_threshold: 8,
            checkpoint_threshold: 4,
            bookmark_threshold: 16,
            channel_capacity: 10,
            checkpoint_tick: Duration::from_millis(20),
            reap_tick: Duration::from_millis(20),
        }
    }
}

/// WAL configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WalConfigError {
    /// A threshold or capacity that must be positive was zero.
    #[error("{0} must be greater than zero")]
    ZeroThreshold(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_design_values() {
        let config = WalConfig::new("/tmp/wal");
        assert_eq!(config.rotate_threshold, 1024);
        assert_eq!(config.checkpoint_threshold, 1024);
        assert_eq!(config.bookmark_threshold, 32 * 1024);
        assert_eq!(config.channel_capacity, 10);
        assert_eq!(config.checkpoint_tick, Duration::from_secs(1));
    }

    #[test]
    fn builder_overrides_fields() {
        let config = WalConfig::new("/tmp/wal")
            .with_rotate_threshold(64)
            .with_checkpoint_threshold(32)
            .with_channel_capacity(4);
        assert_eq!(config.rotate_threshold, 64);
        assert_eq!(config.checkpoint_threshold, 32);
        assert_eq!(config.channel_capacity, 4);
    }

    #[test]
    fn validate_rejects_zero_thresholds() {
        let config = WalConfig::new("/tmp/wal").with_rotate_threshold(0);
        assert!(matches!(
            config.validate(),
            Err(WalConfigError::ZeroThreshold("rotate_threshold"))
        ));
    }

    #[test]
    fn testing_config_is_valid_and_small() {
        let config = WalConfig::for_testing("/tmp/wal");
        assert!(config.validate().is_ok());
        assert!(config.rotate_threshold < WalConfig::new("/tmp/wal").rotate_threshold);
    }
}

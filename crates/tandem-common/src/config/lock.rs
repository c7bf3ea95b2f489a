//! Lock manager configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{TandemError, TandemResult};

/// Lock manager configuration.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use tandem_common::config::LockConfig;
///
/// let config = LockConfig::default();
/// assert_eq!(config.default_timeout, Duration::from_secs(30));
/// assert_eq!(config.max_wait_queue, 0);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockConfig {
    /// Timeout used by blocking acquisitions that do not name one.
    /// Default: 30s
    #[serde(with = "humantime_serde")]
    pub default_timeout: Duration,

    /// Maximum number of owners allowed to queue on a single lock set.
    /// A request arriving at a full queue fails as a conflict.
    /// Default: 0 (unbounded)
    pub max_wait_queue: usize,

    /// Maintain lock statistics counters.
    /// Default: true
    pub collect_stats: bool,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_secs(30),
            max_wait_queue: 0,
            collect_stats: true,
        }
    }
}

impl LockConfig {
    /// Creates a configuration with short timeouts for tests.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            default_timeout: Duration::from_millis(500),
            ..Default::default()
        }
    }

    /// Sets the default blocking timeout.
    #[must_use]
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Sets the per lock set wait queue bound (0 = unbounded).
    #[must_use]
    pub fn with_max_wait_queue(mut self, max: usize) -> Self {
        self.max_wait_queue = max;
        self
    }

    /// Returns true if the wait queue of a lock set is bounded.
    #[must_use]
    pub const fn is_queue_bounded(&self) -> bool {
        self.max_wait_queue != 0
    }

    /// Validates the configuration and returns an error if invalid.
    pub fn validate(&self) -> TandemResult<()> {
        if self.default_timeout.is_zero() {
            return Err(TandemError::invalid_config(
                "default_timeout must be greater than zero",
            ));
        }

        if self.default_timeout > Duration::from_secs(24 * 60 * 60) {
            return Err(TandemError::invalid_config(
                "default_timeout must not exceed 24h",
            ));
        }

        Ok(())
    }
}

//! Configuration for the timeout detection and recovery watchdog.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{TdrError, TdrResult};
use crate::policy::RecoveryPolicy;

/// Default scan interval in seconds.
pub const DEFAULT_SCAN_INTERVAL_SECS: u32 = 2;

/// Largest accepted scan interval in seconds.
pub const MAX_SCAN_INTERVAL_SECS: u32 = 3600;

/// Watchdog configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TdrConfig {
    /// Seconds between liveness scans. `0` disables the watchdog.
    pub scan_interval_secs: u32,
    /// How repeated stuck verdicts are turned into recovery calls.
    pub recovery_policy: RecoveryPolicy,
}

impl Default for TdrConfig {
    fn default() -> Self {
        Self {
            scan_interval_secs: DEFAULT_SCAN_INTERVAL_SECS,
            recovery_policy: RecoveryPolicy::EveryCycle,
        }
    }
}

impl TdrConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the scan interval exceeds [`MAX_SCAN_INTERVAL_SECS`].
    pub fn validate(&self) -> TdrResult<()> {
        if self.scan_interval_secs > MAX_SCAN_INTERVAL_SECS {
            return Err(TdrError::invalid_configuration(format!(
                "scan_interval_secs must not exceed {MAX_SCAN_INTERVAL_SECS}"
            )));
        }
        Ok(())
    }

    /// Scan interval as a `Duration`, or `None` when the watchdog is disabled.
    #[must_use]
    pub fn scan_interval(&self) -> Option<Duration> {
        (self.scan_interval_secs != 0)
            .then(|| Duration::from_secs(u64::from(self.scan_interval_secs)))
    }

    /// Create a configuration builder.
    #[must_use]
    pub fn builder() -> TdrConfigBuilder {
        TdrConfigBuilder::default()
    }
}

/// Builder for `TdrConfig`.
#[derive(Debug, Default)]
pub struct TdrConfigBuilder {
    config: TdrConfig,
}

impl TdrConfigBuilder {
    /// Set the scan interval in whole seconds. `0` disables the watchdog.
    #[must_use]
    pub fn scan_interval_secs(mut self, secs: u32) -> Self {
        self.config.scan_interval_secs = secs;
        self
    }

    /// Set the recovery suppression policy.
    #[must_use]
    pub fn recovery_policy(mut self, policy: RecoveryPolicy) -> Self {
        self.config.recovery_policy = policy;
        self
    }

    /// Build the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn build(self) -> TdrResult<TdrConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

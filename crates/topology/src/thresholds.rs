//! Stall watchdog tuning.
//!
//! The defaults were tuned against slow legacy clients. Faster software should
//! get its own profile rather than a changed default.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TopologyError};

/// Per-node-type watchdog thresholds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct WatchdogThresholds {
    /// Sampling interval T.
    pub sample_interval_secs: u64,

    /// Consecutive unchanged samples that count as a stall.
    pub stall_windows: u32,

    /// A syncing node within this many blocks of its target is caught up.
    pub sync_margin: u64,

    /// How long the wedged-at-genesis symptoms must persist before a reset.
    pub genesis_timeout_secs: u64,

    /// Whether the destructive genesis reset is enabled at all.
    pub genesis_reset: bool,
}

impl Default for WatchdogThresholds {
    fn default() -> Self {
        Self {
            sample_interval_secs: 60,
            stall_windows: 5,
            sync_margin: 8,
            genesis_timeout_secs: 1200,
            genesis_reset: true,
        }
    }
}

impl WatchdogThresholds {
    /// Sampling interval as a [`Duration`].
    #[must_use]
    pub const fn sample_interval(&self) -> Duration {
        Duration::from_secs(self.sample_interval_secs)
    }

    /// Genesis timeout as a [`Duration`].
    #[must_use]
    pub const fn genesis_timeout(&self) -> Duration {
        Duration::from_secs(self.genesis_timeout_secs)
    }

    pub(crate) fn validate(&self, profile: &str) -> Result<()> {
        let reason = if self.sample_interval_secs == 0 {
            Some("sample interval must be positive")
        } else if self.stall_windows == 0 {
            Some("stall windows must be positive")
        } else if self.sync_margin == 0 {
            Some("sync margin must be positive")
        } else if self.genesis_reset && self.genesis_timeout_secs < self.sample_interval_secs {
            Some("genesis timeout must be at least one sample interval")
        } else {
            None
        };

        reason.map_or(Ok(()), |reason| {
            Err(TopologyError::InvalidThresholds {
                profile: profile.to_string(),
                reason,
            })
        })
    }
}

//! Ordinary stall detection.

use chainboot_probe::HeightReport;
use chainboot_topology::WatchdogThresholds;
use tokio::time::Instant;

/// What the watchdog knows about a node's progress. Lives only in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchdogObservation {
    /// Observed node.
    pub node_name: String,
    /// Height at the previous sample.
    pub last_height: u64,
    /// When the previous sample was taken.
    pub last_observed_at: Instant,
    /// Consecutive samples without progress.
    pub stall_count: u32,
}

/// Result of feeding one sample to a [`StallDetector`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StallVerdict {
    /// First sample; nothing to compare against yet.
    FirstSample,
    /// Within the sync margin of the target. Not a stall candidate.
    CaughtUp,
    /// Height advanced since the previous sample.
    Progressing,
    /// Height unchanged, below the stall threshold.
    Unchanged {
        /// Consecutive unchanged samples so far.
        stall_count: u32,
    },
    /// Height unchanged for the configured number of windows. The count has
    /// been reset, so the next stall needs another full run of windows.
    Stalled,
}

/// Counts consecutive samples without height progress.
#[derive(Debug, Clone)]
pub struct StallDetector {
    node_name: String,
    observation: Option<WatchdogObservation>,
    stall_windows: u32,
    sync_margin: u64,
}

impl StallDetector {
    /// Creates a detector with no observation yet.
    #[must_use]
    pub fn new(node_name: impl Into<String>, thresholds: &WatchdogThresholds) -> Self {
        Self {
            node_name: node_name.into(),
            observation: None,
            stall_windows: thresholds.stall_windows,
            sync_margin: thresholds.sync_margin,
        }
    }

    /// The current observation, if any sample has been taken.
    #[must_use]
    pub const fn observation(&self) -> Option<&WatchdogObservation> {
        self.observation.as_ref()
    }

    /// Forgets everything; the next sample is a first sample again.
    pub fn reset(&mut self) {
        self.observation = None;
    }

    /// Feeds one sample taken at `now`.
    pub fn observe(&mut self, report: &HeightReport, now: Instant) -> StallVerdict {
        let height = report.effective_head();
        // A node that is not syncing has nothing left to catch up to.
        let caught_up =
            !report.is_syncing || height.saturating_add(self.sync_margin) > report.target();

        let Some(observation) = self.observation.as_mut() else {
            self.observation = Some(WatchdogObservation {
                node_name: self.node_name.clone(),
                last_height: height,
                last_observed_at: now,
                stall_count: 0,
            });
            return StallVerdict::FirstSample;
        };

        let advanced = height != observation.last_height;
        observation.last_height = height;
        observation.last_observed_at = now;

        if caught_up {
            observation.stall_count = 0;
            return StallVerdict::CaughtUp;
        }

        if advanced {
            observation.stall_count = 0;
            return StallVerdict::Progressing;
        }

        observation.stall_count += 1;
        if observation.stall_count >= self.stall_windows {
            observation.stall_count = 0;
            StallVerdict::Stalled
        } else {
            StallVerdict::Unchanged {
                stall_count: observation.stall_count,
            }
        }
    }
}

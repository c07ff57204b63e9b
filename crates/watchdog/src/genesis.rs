//! Wedged-at-genesis detection.
//!
//! Only external symptoms are available: height zero, no peers, and an
//! upstream that is provably ahead. A slow cold start looks the same for a
//! while, hence the long timeout.

use std::time::Duration;

use chainboot_probe::HeightReport;
use tokio::time::Instant;

/// Result of feeding one sample to a [`GenesisDetector`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenesisVerdict {
    /// Symptoms absent.
    Clear,
    /// Symptoms present for `elapsed`, not yet past the timeout.
    Suspect {
        /// How long the symptoms have persisted.
        elapsed: Duration,
    },
    /// Symptoms sustained past the timeout. The detector has been reset.
    Wedged,
}

/// Tracks how long a node has shown wedged-at-genesis symptoms.
#[derive(Debug, Clone)]
pub struct GenesisDetector {
    since: Option<Instant>,
    timeout: Duration,
}

impl GenesisDetector {
    /// Creates a detector that fires after `timeout` of sustained symptoms.
    #[must_use]
    pub const fn new(timeout: Duration) -> Self {
        Self {
            since: None,
            timeout,
        }
    }

    /// Whether `report` alone shows the local symptoms (height zero, no peers).
    #[must_use]
    pub fn local_symptoms(report: &HeightReport) -> bool {
        report.effective_head() == 0 && report.peer_count == 0
    }

    /// Forgets any symptom start time.
    pub const fn reset(&mut self) {
        self.since = None;
    }

    /// Feeds one sample. `upstream_proven` says whether the upstream stably
    /// serves past the node's minimum serve height.
    pub fn observe(
        &mut self,
        report: &HeightReport,
        upstream_proven: bool,
        now: Instant,
    ) -> GenesisVerdict {
        if !(Self::local_symptoms(report) && upstream_proven) {
            self.since = None;
            return GenesisVerdict::Clear;
        }

        let since = *self.since.get_or_insert(now);
        let elapsed = now.duration_since(since);

        if elapsed >= self.timeout {
            self.since = None;
            GenesisVerdict::Wedged
        } else {
            GenesisVerdict::Suspect { elapsed }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIMEOUT: Duration = Duration::from_secs(1200);

    #[tokio::test(start_paused = true)]
    async fn test_fires_only_after_sustained_symptoms() {
        let mut detector = GenesisDetector::new(TIMEOUT);
        let wedged = HeightReport::synced(0, 0);

        assert_eq!(
            detector.observe(&wedged, true, Instant::now()),
            GenesisVerdict::Suspect {
                elapsed: Duration::ZERO
            }
        );

        tokio::time::advance(Duration::from_secs(600)).await;
        assert!(matches!(
            detector.observe(&wedged, true, Instant::now()),
            GenesisVerdict::Suspect { .. }
        ));

        tokio::time::advance(Duration::from_secs(600)).await;
        assert_eq!(
            detector.observe(&wedged, true, Instant::now()),
            GenesisVerdict::Wedged
        );

        // Starts over after firing.
        assert!(matches!(
            detector.observe(&wedged, true, Instant::now()),
            GenesisVerdict::Suspect { .. }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_any_clear_sample_restarts_the_clock() {
        let mut detector = GenesisDetector::new(TIMEOUT);
        let wedged = HeightReport::synced(0, 0);

        detector.observe(&wedged, true, Instant::now());
        tokio::time::advance(Duration::from_secs(1100)).await;

        // A peer appeared briefly.
        assert_eq!(
            detector.observe(&HeightReport::synced(0, 1), true, Instant::now()),
            GenesisVerdict::Clear
        );

        tokio::time::advance(Duration::from_secs(200)).await;
        assert!(matches!(
            detector.observe(&wedged, true, Instant::now()),
            GenesisVerdict::Suspect { .. }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_requires_proven_upstream() {
        let mut detector = GenesisDetector::new(Duration::ZERO);
        let wedged = HeightReport::synced(0, 0);

        assert_eq!(
            detector.observe(&wedged, false, Instant::now()),
            GenesisVerdict::Clear
        );
        assert_eq!(
            detector.observe(&wedged, true, Instant::now()),
            GenesisVerdict::Wedged
        );
    }

    #[test]
    fn test_local_symptoms() {
        assert!(GenesisDetector::local_symptoms(&HeightReport::synced(0, 0)));
        assert!(!GenesisDetector::local_symptoms(&HeightReport::synced(1, 0)));
        assert!(!GenesisDetector::local_symptoms(&HeightReport::synced(0, 2)));

        let fetching = HeightReport {
            sync_current: Some(5),
            ..HeightReport::syncing(0, 100, 0)
        };
        assert!(!GenesisDetector::local_symptoms(&fetching));
    }
}

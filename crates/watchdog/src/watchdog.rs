//! The per-node sampling loop.

use std::sync::Arc;
use std::time::Duration;

use chainboot_probe::{HealthProber, HeightReport, Probe, serves_height_stably};
use chainboot_supervisor::{NodeLocks, NodeSupervisor};
use chainboot_topology::{NodeDescriptor, NodeState, NodeStateTable, WatchdogThresholds};
use chainboot_util::sleep_or_cancel;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::genesis::{GenesisDetector, GenesisVerdict};
use crate::stall::{StallDetector, StallVerdict};

/// What one watchdog cycle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogAction {
    /// The node is not in a supervised state; nothing was sampled.
    NotSupervised,
    /// The node did not answer. Not a stall signal.
    Unavailable,
    /// A sample was taken; no recovery was needed.
    Sampled,
    /// Recovery was due but another actor owns the node.
    Skipped,
    /// The node was stopped and started again.
    Restarted,
    /// The node's chain data was deleted and it was started fresh.
    Reset,
    /// Recovery was attempted and failed; sampling continues.
    Failed,
    /// A node left stopped by a failed recovery was started.
    Started,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Recovery {
    Restart,
    Reset,
}

/// Options for configuring a `StallWatchdog`.
pub struct StallWatchdogOptions {
    /// Stops the loop.
    pub cancel: CancellationToken,

    /// Shared per-node locks.
    pub locks: NodeLocks,

    /// The watched node.
    pub node: NodeDescriptor,

    /// Health prober.
    pub prober: Arc<dyn HealthProber>,

    /// Delay between the two probes of a stability check.
    pub stability_delay: Duration,

    /// Shared lifecycle state table.
    pub states: Arc<NodeStateTable>,

    /// Grace period when stopping the node.
    pub stop_timeout: Duration,

    /// Process control.
    pub supervisor: Arc<dyn NodeSupervisor>,

    /// Thresholds for this node's type.
    pub thresholds: WatchdogThresholds,

    /// The node's upstream, if any. Required for a genesis reset.
    pub upstream: Option<NodeDescriptor>,
}

/// Samples one node every interval and recovers it when it stops making
/// progress.
pub struct StallWatchdog {
    cancel: CancellationToken,
    genesis: GenesisDetector,
    locks: NodeLocks,
    node: NodeDescriptor,
    /// Set while a recovery stopped the node but could not start it again.
    pending_start: bool,
    prober: Arc<dyn HealthProber>,
    stability_delay: Duration,
    stall: StallDetector,
    states: Arc<NodeStateTable>,
    stop_timeout: Duration,
    supervisor: Arc<dyn NodeSupervisor>,
    thresholds: WatchdogThresholds,
    upstream: Option<NodeDescriptor>,
}

impl StallWatchdog {
    /// Creates a new `StallWatchdog`.
    #[must_use]
    pub fn new(
        StallWatchdogOptions {
            cancel,
            locks,
            node,
            prober,
            stability_delay,
            states,
            stop_timeout,
            supervisor,
            thresholds,
            upstream,
        }: StallWatchdogOptions,
    ) -> Self {
        Self {
            cancel,
            genesis: GenesisDetector::new(thresholds.genesis_timeout()),
            locks,
            stall: StallDetector::new(node.name.clone(), &thresholds),
            node,
            pending_start: false,
            prober,
            stability_delay,
            states,
            stop_timeout,
            supervisor,
            thresholds,
            upstream,
        }
    }

    /// The stall detector's view of the node.
    #[must_use]
    pub const fn stall_detector(&self) -> &StallDetector {
        &self.stall
    }

    /// Samples every interval until cancelled.
    pub async fn run(mut self) {
        info!(
            node = %self.node.name,
            interval_secs = self.thresholds.sample_interval_secs,
            stall_windows = self.thresholds.stall_windows,
            "watchdog started"
        );

        while sleep_or_cancel(self.thresholds.sample_interval(), &self.cancel).await {
            self.tick().await;
        }

        debug!(node = %self.node.name, "watchdog stopped");
    }

    /// Runs one sampling cycle.
    pub async fn tick(&mut self) -> WatchdogAction {
        let state = self.states.get(&self.node.name);
        if !state.is_supervised() {
            self.forget();
            self.pending_start = false;
            return WatchdogAction::NotSupervised;
        }

        if self.pending_start {
            return self.resume_start().await;
        }

        let Probe::Report(report) = self.prober.probe(&self.node).await else {
            debug!(node = %self.node.name, "node unavailable, resampling next interval");
            return WatchdogAction::Unavailable;
        };
        let now = Instant::now();

        if self.genesis_wedged(&report, now).await {
            return self.recover(Recovery::Reset, report.height).await;
        }

        match self.stall.observe(&report, now) {
            StallVerdict::Stalled => {
                warn!(
                    node = %self.node.name,
                    height = report.effective_head(),
                    target = report.target(),
                    windows = self.thresholds.stall_windows,
                    "stall detected"
                );
                self.recover(Recovery::Restart, report.effective_head())
                    .await
            }
            StallVerdict::Unchanged { stall_count } => {
                debug!(node = %self.node.name, height = report.effective_head(), stall_count, "no progress");
                WatchdogAction::Sampled
            }
            StallVerdict::FirstSample | StallVerdict::CaughtUp | StallVerdict::Progressing => {
                WatchdogAction::Sampled
            }
        }
    }

    fn forget(&mut self) {
        self.stall.reset();
        self.genesis.reset();
    }

    async fn genesis_wedged(&mut self, report: &HeightReport, now: Instant) -> bool {
        if !self.thresholds.genesis_reset || !GenesisDetector::local_symptoms(report) {
            self.genesis.reset();
            return false;
        }

        let proven = self.upstream_proven().await;
        match self.genesis.observe(report, proven, now) {
            GenesisVerdict::Wedged => true,
            GenesisVerdict::Suspect { elapsed } => {
                info!(
                    node = %self.node.name,
                    elapsed_secs = elapsed.as_secs(),
                    timeout_secs = self.thresholds.genesis_timeout_secs,
                    "node at genesis with no peers while upstream is ahead"
                );
                false
            }
            GenesisVerdict::Clear => false,
        }
    }

    async fn upstream_proven(&self) -> bool {
        let Some(upstream) = &self.upstream else {
            return false;
        };

        let needed = self.node.min_serve_height.max(1);
        let ahead = self
            .prober
            .probe(upstream)
            .await
            .height()
            .is_some_and(|height| height >= needed);

        ahead
            && serves_height_stably(
                self.prober.as_ref(),
                upstream,
                needed,
                self.stability_delay,
                &self.cancel,
            )
            .await
    }

    async fn recover(&mut self, recovery: Recovery, height: u64) -> WatchdogAction {
        let Some(_guard) = self.locks.try_acquire(&self.node.name) else {
            info!(node = %self.node.name, height, "node owned by another actor, skipping recovery");
            self.forget();
            return WatchdogAction::Skipped;
        };

        // Re-read under the lock; the owner may have changed it.
        let previous = self.states.get(&self.node.name);
        if !previous.is_supervised() {
            self.forget();
            return WatchdogAction::NotSupervised;
        }

        self.states
            .transition(&self.node.name, NodeState::Stalled, Some(height));
        self.states
            .transition(&self.node.name, NodeState::Recovering, Some(height));

        let result = self.restart(recovery, height).await;
        self.forget();
        self.states.transition(&self.node.name, previous, None);

        match (result, recovery) {
            (Ok(()), Recovery::Restart) => WatchdogAction::Restarted,
            (Ok(()), Recovery::Reset) => WatchdogAction::Reset,
            (Err(e), _) => {
                error!(node = %self.node.name, error = %e, ?recovery, "recovery failed");
                WatchdogAction::Failed
            }
        }
    }

    /// Starts a node that a failed recovery left stopped. Another actor
    /// holding the lock takes over the node, including starting it.
    async fn resume_start(&mut self) -> WatchdogAction {
        let Some(_guard) = self.locks.try_acquire(&self.node.name) else {
            info!(node = %self.node.name, "node owned by another actor, leaving its start to it");
            self.pending_start = false;
            return WatchdogAction::Skipped;
        };

        match self.supervisor.start(&self.node).await {
            Ok(()) => {
                info!(node = %self.node.name, "node started after failed recovery");
                self.pending_start = false;
                WatchdogAction::Started
            }
            Err(e) => {
                warn!(node = %self.node.name, error = %e, "start failed, retrying next interval");
                WatchdogAction::Failed
            }
        }
    }

    async fn restart(&mut self, recovery: Recovery, height: u64) -> Result<()> {
        info!(node = %self.node.name, height, "stopping node");
        self.supervisor.stop(&self.node, self.stop_timeout).await?;
        self.pending_start = true;

        if recovery == Recovery::Reset {
            let chain_data = self.node.chain_data_dir();
            error!(
                node = %self.node.name,
                height,
                path = %chain_data.display(),
                "node wedged at genesis, deleting local chain data"
            );
            match tokio::fs::remove_dir_all(&chain_data).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(Error::Io("failed to delete chain data", e)),
            }
        }

        info!(node = %self.node.name, "starting node");
        self.supervisor.start(&self.node).await?;
        self.pending_start = false;

        Ok(())
    }
}

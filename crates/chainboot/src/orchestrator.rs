//! Wires the components together and runs the chain.

use std::sync::Arc;

use chainboot_bridge::{
    BridgeTask, ChainDataTool, CommandTool, MarkerLayout, MigrationOutcome, Migrator,
    MigratorOptions, RpcExportTool, RpcExportToolOptions,
};
use chainboot_probe::{HealthProber, JsonRpcProber, JsonRpcProberOptions};
use chainboot_sequencer::{Poller, PollerOptions, Sequencer, SequencerOptions};
use chainboot_supervisor::{
    ContainerSupervisor, ContainerSupervisorOptions, NodeLocks, NodeSupervisor, ProcessSupervisor,
};
use chainboot_topology::{ChainTopology, NodeStateTable};
use chainboot_watchdog::{StallWatchdog, StallWatchdogOptions};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{error, info};

use crate::config::{ChainConfig, SupervisorConfig, TimingConfig, ToolConfig};
use crate::error::Result;
use crate::status::{NodeStatus, StatusReport};

/// Options for configuring an `Orchestrator`.
pub struct OrchestratorOptions {
    /// Shutdown signal for every loop.
    pub cancel: CancellationToken,

    /// Artifact and marker paths.
    pub layout: MarkerLayout,

    /// Health prober.
    pub prober: Arc<dyn HealthProber>,

    /// Process control.
    pub supervisor: Arc<dyn NodeSupervisor>,

    /// Intervals and timeouts.
    pub timing: TimingConfig,

    /// Bridge data mover.
    pub tool: Arc<dyn ChainDataTool>,

    /// Validated chain.
    pub topology: Arc<ChainTopology>,
}

/// Owns the shared state of one chain: locks, lifecycle states and the
/// background watchdogs.
pub struct Orchestrator {
    cancel: CancellationToken,
    locks: NodeLocks,
    migrator: Arc<Migrator>,
    poller: Poller,
    prober: Arc<dyn HealthProber>,
    states: Arc<NodeStateTable>,
    supervisor: Arc<dyn NodeSupervisor>,
    task_tracker: TaskTracker,
    timing: TimingConfig,
    topology: Arc<ChainTopology>,
}

impl Orchestrator {
    /// Creates a new `Orchestrator`.
    #[must_use]
    pub fn new(
        OrchestratorOptions {
            cancel,
            layout,
            prober,
            supervisor,
            timing,
            tool,
            topology,
        }: OrchestratorOptions,
    ) -> Self {
        let locks = NodeLocks::new();
        let states = Arc::new(NodeStateTable::new(
            topology.nodes().iter().map(|node| node.name.as_str()),
        ));

        let migrator = Arc::new(Migrator::new(MigratorOptions {
            cancel: cancel.clone(),
            layout,
            locks: locks.clone(),
            repair_probe_blocks: timing.repair_probe_blocks,
            stop_timeout: timing.stop_timeout(),
            supervisor: supervisor.clone(),
            tool,
            topology: topology.clone(),
        }));

        let poller = Poller::new(PollerOptions {
            cancel: cancel.clone(),
            poll_interval: timing.poll_interval(),
            progress_interval: timing.progress_interval(),
            prober: prober.clone(),
            stability_delay: timing.stability_delay(),
        });

        Self {
            cancel,
            locks,
            migrator,
            poller,
            prober,
            states,
            supervisor,
            task_tracker: TaskTracker::new(),
            timing,
            topology,
        }
    }

    /// Builds the real prober, supervisor and tool described by `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the chain description is invalid, its paths are
    /// unusable, or the HTTP client cannot be built.
    pub fn from_config(config: &ChainConfig, cancel: CancellationToken) -> Result<Self> {
        let topology = Arc::new(config.topology()?);
        config.prepare_paths()?;
        let timing = config.timing;

        let prober: Arc<dyn HealthProber> = Arc::new(JsonRpcProber::new(JsonRpcProberOptions {
            timeout: timing.probe_timeout(),
        })?);

        let supervisor: Arc<dyn NodeSupervisor> = match &config.supervisor {
            SupervisorConfig::Container {
                runtime,
                containers,
            } => Arc::new(ContainerSupervisor::new(ContainerSupervisorOptions {
                containers: containers.clone(),
                runtime: runtime.clone(),
            })),
            SupervisorConfig::Process { processes } => {
                Arc::new(ProcessSupervisor::new(processes.clone()))
            }
        };

        let tool: Arc<dyn ChainDataTool> = match &config.tool {
            ToolConfig::Command { export, import } => {
                Arc::new(CommandTool::new(export.clone(), import.clone()))
            }
            ToolConfig::Rpc { batch_size, import } => {
                Arc::new(RpcExportTool::new(RpcExportToolOptions {
                    batch_size: *batch_size,
                    import: import.clone(),
                    progress_interval: timing.progress_interval(),
                    request_timeout: timing.probe_timeout(),
                }))
            }
        };

        Ok(Self::new(OrchestratorOptions {
            cancel,
            layout: MarkerLayout::new(&config.artifacts_dir),
            prober,
            supervisor,
            timing,
            tool,
            topology,
        }))
    }

    /// Lifecycle state of every node.
    #[must_use]
    pub const fn states(&self) -> &Arc<NodeStateTable> {
        &self.states
    }

    /// Starts the watchdogs, brings the chain up, then supervises it until
    /// shutdown.
    ///
    /// # Errors
    ///
    /// Returns an error if bring-up fails for a reason other than shutdown.
    /// Watchdogs are stopped before returning either way.
    pub async fn run(&self) -> Result<()> {
        info!(
            nodes = self.topology.nodes().len(),
            bridges = self.topology.bridges().len(),
            "bringing up chain"
        );

        self.spawn_watchdogs();

        match self.sequencer().run().await {
            Ok(()) => {
                info!("bring-up complete, supervising until shutdown");
                self.cancel.cancelled().await;
            }
            Err(chainboot_sequencer::Error::Cancelled) => {
                info!("shutdown requested during bring-up");
            }
            Err(e) => {
                error!(error = %e, "bring-up failed");
                self.shutdown().await;
                return Err(e.into());
            }
        }

        self.shutdown().await;
        Ok(())
    }

    /// Spawns one watchdog per node on the task tracker.
    pub fn spawn_watchdogs(&self) {
        for node in self.topology.nodes() {
            let watchdog = StallWatchdog::new(StallWatchdogOptions {
                cancel: self.cancel.clone(),
                locks: self.locks.clone(),
                node: node.clone(),
                prober: self.prober.clone(),
                stability_delay: self.timing.stability_delay(),
                states: self.states.clone(),
                stop_timeout: self.timing.stop_timeout(),
                supervisor: self.supervisor.clone(),
                thresholds: self.topology.thresholds_for(&node.name),
                upstream: self.topology.upstream_of(&node.name).cloned(),
            });

            self.task_tracker.spawn(watchdog.run());
        }
    }

    /// Probes every node and reads every bridge's state from disk. Touches
    /// no process.
    pub async fn status(&self) -> StatusReport {
        let mut nodes = Vec::with_capacity(self.topology.nodes().len());
        for node in self.topology.nodes() {
            nodes.push(NodeStatus {
                name: node.name.clone(),
                upstream: node.upstream_ref.clone(),
                min_serve_height: node.min_serve_height,
                probe: self.prober.probe(node).await,
            });
        }

        let bridges = self
            .topology
            .bridges()
            .iter()
            .map(|spec| BridgeTask::new(spec, self.migrator.layout()))
            .collect();

        StatusReport { nodes, bridges }
    }

    /// Runs one migration outside the sequencer.
    ///
    /// # Errors
    ///
    /// Returns the migration's error; the done marker is absent in that case.
    pub async fn migrate(&self, source: &str, dest: &str, cutoff: u64) -> Result<MigrationOutcome> {
        let mut task = BridgeTask::for_range(source, dest, cutoff, self.migrator.layout());
        info!(source, dest, cutoff, state = %task.state, "manual migration");

        let outcome = self.migrator.run(&mut task).await?;
        info!(source, dest, cutoff, ?outcome, state = %task.state, "manual migration finished");
        Ok(outcome)
    }

    fn sequencer(&self) -> Sequencer {
        Sequencer::new(SequencerOptions {
            locks: self.locks.clone(),
            max_migration_attempts: self.timing.max_migration_attempts,
            migration_retry_interval: self.timing.migration_retry_interval(),
            migrator: self.migrator.clone(),
            poller: self.poller.clone(),
            states: self.states.clone(),
            stop_timeout: self.timing.stop_timeout(),
            supervisor: self.supervisor.clone(),
            topology: self.topology.clone(),
        })
    }

    async fn shutdown(&self) {
        self.cancel.cancel();
        self.task_tracker.close();
        self.task_tracker.wait().await;
        info!("shutdown complete");
    }
}

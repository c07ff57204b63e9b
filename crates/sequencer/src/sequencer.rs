//! Dependency-ordered bring-up.

use std::sync::Arc;
use std::time::Duration;

use chainboot_bridge::{BridgeTask, Migrator};
use chainboot_supervisor::{NodeLocks, NodeSupervisor};
use chainboot_topology::{BridgeSpec, ChainTopology, NodeDescriptor, NodeState, NodeStateTable};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::guard::AheadGuard;
use crate::poller::{Poller, Readiness};

/// Options for configuring a `Sequencer`.
pub struct SequencerOptions {
    /// Shared per-node locks.
    pub locks: NodeLocks,

    /// Give up on a bridge after this many failed migrations. Retries
    /// forever when `None`.
    pub max_migration_attempts: Option<u32>,

    /// Delay before re-running a failed migration.
    pub migration_retry_interval: Duration,

    /// Runs bridge migrations.
    pub migrator: Arc<Migrator>,

    /// Readiness polling.
    pub poller: Poller,

    /// Shared lifecycle state table.
    pub states: Arc<NodeStateTable>,

    /// Grace period when the guard stops a node.
    pub stop_timeout: Duration,

    /// Process control.
    pub supervisor: Arc<dyn NodeSupervisor>,

    /// Validated chain.
    pub topology: Arc<ChainTopology>,
}

/// Brings the chain up one node at a time, root first.
pub struct Sequencer {
    guard: AheadGuard,
    locks: NodeLocks,
    max_migration_attempts: Option<u32>,
    migration_retry_interval: Duration,
    migrator: Arc<Migrator>,
    poller: Poller,
    states: Arc<NodeStateTable>,
    topology: Arc<ChainTopology>,
}

impl Sequencer {
    /// Creates a new `Sequencer`.
    #[must_use]
    pub fn new(
        SequencerOptions {
            locks,
            max_migration_attempts,
            migration_retry_interval,
            migrator,
            poller,
            states,
            stop_timeout,
            supervisor,
            topology,
        }: SequencerOptions,
    ) -> Self {
        Self {
            guard: AheadGuard::new(locks.clone(), poller.clone(), stop_timeout, supervisor),
            locks,
            max_migration_attempts,
            migration_retry_interval,
            migrator,
            poller,
            states,
            topology,
        }
    }

    /// Brings up every node in chain order. Returns once the last node is
    /// running; the nodes keep running afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cancelled`] on shutdown, or
    /// [`Error::MigrationExhausted`] if a bridge keeps failing past the
    /// attempt limit.
    pub async fn run(&self) -> Result<()> {
        for node in self.topology.nodes() {
            self.bring_up(node).await?;
        }

        info!(nodes = self.topology.nodes().len(), "chain up");
        Ok(())
    }

    /// Brings up one node. Its upstream must already be running.
    ///
    /// # Errors
    ///
    /// See [`Sequencer::run`].
    pub async fn bring_up(&self, node: &NodeDescriptor) -> Result<()> {
        let upstream = node
            .upstream_ref
            .as_deref()
            .map(|name| {
                self.topology
                    .node(name)
                    .ok_or_else(|| Error::UnknownNode(name.to_string()))
            })
            .transpose()?;

        for bridge in self.topology.bridges_into(&node.name) {
            self.complete_bridge(bridge).await?;
        }

        {
            let _guard = self.locks.acquire(&node.name).await;
            self.states.transition(&node.name, NodeState::Starting, None);
            self.guard.start(node).await?;
        }

        self.states
            .transition(&node.name, NodeState::WaitingForUpstream, None);
        let head = self.wait_for_gate(node, upstream).await?;

        if let Some(upstream) = upstream {
            self.guard.guard_against_ahead(node, upstream).await?;
        }

        self.states
            .transition(&node.name, NodeState::Running, Some(head));
        Ok(())
    }

    /// Polls until `node` and its upstream both stably serve the node's
    /// minimum serve height. No timeout; a wedged node is the watchdog's
    /// problem.
    async fn wait_for_gate(
        &self,
        node: &NodeDescriptor,
        upstream: Option<&NodeDescriptor>,
    ) -> Result<u64> {
        let min = node.min_serve_height;
        let mut progress = self.poller.throttle();

        loop {
            let own = self.poller.readiness(node, min).await;
            let upstream_readiness = match (own, upstream) {
                (Readiness::Serving { .. }, Some(upstream)) => {
                    Some(self.poller.readiness(upstream, min).await)
                }
                _ => None,
            };

            if let Readiness::Serving { head } = own {
                if upstream_readiness.is_none_or(Readiness::is_serving) {
                    info!(node = %node.name, height = head, min_serve_height = min, "gate reached");
                    return Ok(head);
                }
            }

            if progress.due() {
                match upstream_readiness {
                    Some(readiness) => info!(
                        node = %node.name,
                        min_serve_height = min,
                        %own,
                        upstream = upstream.map_or("", |u| u.name.as_str()),
                        upstream_readiness = %readiness,
                        "waiting for upstream to serve min serve height"
                    ),
                    None => info!(node = %node.name, min_serve_height = min, %own, "waiting for node to serve min serve height"),
                }
            }
            self.poller.pause().await?;
        }
    }

    /// Blocks until the bridge's done marker exists, migrating as needed.
    async fn complete_bridge(&self, bridge: &BridgeSpec) -> Result<()> {
        let mut task = BridgeTask::new(bridge, self.migrator.layout());
        if task.is_done() {
            debug!(source = %task.source, dest = %task.dest, cutoff = task.cutoff_height, "bridge already done");
            return Ok(());
        }

        let source = self
            .topology
            .node(&bridge.source)
            .ok_or_else(|| Error::UnknownNode(bridge.source.clone()))?;

        info!(source = %task.source, dest = %task.dest, cutoff = task.cutoff_height, state = %task.state, "waiting for bridge");
        self.poller
            .wait_until_serving(source, bridge.cutoff_height, "bridge export range")
            .await?;

        let mut attempts = 0;
        loop {
            attempts += 1;
            match self.migrator.run(&mut task).await {
                Ok(outcome) => {
                    info!(source = %task.source, dest = %task.dest, cutoff = task.cutoff_height, ?outcome, attempts, "bridge done");
                    return Ok(());
                }
                Err(chainboot_bridge::Error::Cancelled) => return Err(Error::Cancelled),
                Err(e) if self.max_migration_attempts.is_some_and(|max| attempts >= max) => {
                    return Err(Error::MigrationExhausted {
                        source_node: task.source.clone(),
                        dest: task.dest.clone(),
                        cutoff: task.cutoff_height,
                        attempts,
                        source: e,
                    });
                }
                Err(e) => {
                    warn!(
                        source = %task.source,
                        dest = %task.dest,
                        cutoff = task.cutoff_height,
                        state = %task.state,
                        attempts,
                        error = %e,
                        "migration failed, retrying from the top"
                    );
                    self.poller.backoff(self.migration_retry_interval).await?;
                }
            }
        }
    }
}

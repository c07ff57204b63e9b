//! Ahead-of-Upstream Guard.
//!
//! A node that negotiates its peering status while ahead of its upstream can
//! lock into a state that never recovers. When a downstream's persisted head
//! is past what its upstream serves, the downstream is kept stopped until the
//! upstream catches up, then started for a fresh handshake.

use std::sync::Arc;
use std::time::Duration;

use chainboot_probe::Probe;
use chainboot_supervisor::{NodeLocks, NodeSupervisor};
use chainboot_topology::NodeDescriptor;
use tracing::{info, warn};

use crate::error::Result;
use crate::poller::Poller;

/// What [`AheadGuard::guard_against_ahead`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardOutcome {
    /// The downstream was at or below the upstream; nothing was touched.
    NotAhead {
        /// Downstream head.
        downstream: u64,
        /// Upstream head.
        upstream: u64,
    },
    /// The downstream was stopped until the upstream served its head, then
    /// started again.
    Resynced {
        /// Downstream head before the stop.
        downstream: u64,
        /// Upstream head when the downstream was started again.
        upstream: u64,
    },
}

/// Stops downstream nodes that are ahead of their upstream until the
/// upstream catches up.
#[derive(Clone)]
pub struct AheadGuard {
    locks: NodeLocks,
    poller: Poller,
    stop_timeout: Duration,
    supervisor: Arc<dyn NodeSupervisor>,
}

impl AheadGuard {
    /// Creates a new `AheadGuard`.
    #[must_use]
    pub fn new(
        locks: NodeLocks,
        poller: Poller,
        stop_timeout: Duration,
        supervisor: Arc<dyn NodeSupervisor>,
    ) -> Self {
        Self {
            locks,
            poller,
            stop_timeout,
            supervisor,
        }
    }

    /// Compares the heads of `downstream` and `upstream` and, if the
    /// downstream is ahead, holds it stopped until the upstream stably serves
    /// the downstream's head.
    ///
    /// Holds the downstream's lock for the whole stop, wait, start window.
    /// Unreachable nodes are polled again after one interval.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Cancelled`] on shutdown. The downstream stays
    /// stopped in that case.
    pub async fn guard_against_ahead(
        &self,
        downstream: &NodeDescriptor,
        upstream: &NodeDescriptor,
    ) -> Result<GuardOutcome> {
        let (d, u) = self.heads(downstream, upstream).await?;

        if d <= u {
            info!(node = %downstream.name, height = d, upstream = %upstream.name, upstream_height = u, "downstream not ahead of upstream");
            return Ok(GuardOutcome::NotAhead {
                downstream: d,
                upstream: u,
            });
        }

        let _guard = self.locks.acquire(&downstream.name).await;

        warn!(
            node = %downstream.name,
            height = d,
            upstream = %upstream.name,
            upstream_height = u,
            "downstream ahead of upstream, stopping it until upstream catches up"
        );
        self.stop(downstream).await?;

        let served = self
            .poller
            .wait_until_serving(upstream, d, "downstream resync")
            .await?;

        info!(node = %downstream.name, height = d, upstream = %upstream.name, upstream_height = served, "upstream caught up, starting downstream");
        self.start(downstream).await?;

        Ok(GuardOutcome::Resynced {
            downstream: d,
            upstream: served,
        })
    }

    async fn heads(
        &self,
        downstream: &NodeDescriptor,
        upstream: &NodeDescriptor,
    ) -> Result<(u64, u64)> {
        let mut progress = self.poller.throttle();

        loop {
            let d = self.poller.prober().probe(downstream).await;
            let u = self.poller.prober().probe(upstream).await;

            if let (Probe::Report(d), Probe::Report(u)) = (&d, &u) {
                return Ok((d.height, u.height));
            }

            if progress.due() {
                info!(node = %downstream.name, downstream_probe = %d, upstream = %upstream.name, upstream_probe = %u, "waiting for both nodes to answer");
            }
            self.poller.pause().await?;
        }
    }

    async fn stop(&self, node: &NodeDescriptor) -> Result<()> {
        loop {
            match self.supervisor.stop(node, self.stop_timeout).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    warn!(node = %node.name, error = %e, "failed to stop node, retrying");
                    self.poller.pause().await?;
                }
            }
        }
    }

    pub(crate) async fn start(&self, node: &NodeDescriptor) -> Result<()> {
        loop {
            match self.supervisor.start(node).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    warn!(node = %node.name, error = %e, "failed to start node, retrying");
                    self.poller.pause().await?;
                }
            }
        }
    }
}

//! Unbounded, cancellable waits on node readiness.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chainboot_probe::{HealthProber, serves_height_stably};
use chainboot_topology::NodeDescriptor;
use chainboot_util::{ProgressThrottle, sleep_or_cancel};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::{Error, Result};

/// How far a node is from serving a given height.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// The node did not answer.
    Unavailable,
    /// The node's head is below the height.
    Behind {
        /// Observed head.
        head: u64,
    },
    /// The head is past the height but the block hash was not stable.
    Unstable {
        /// Observed head.
        head: u64,
    },
    /// The node stably serves the height.
    Serving {
        /// Observed head.
        head: u64,
    },
}

impl Readiness {
    /// Whether the node stably serves the height.
    #[must_use]
    pub const fn is_serving(self) -> bool {
        matches!(self, Self::Serving { .. })
    }

    /// The observed head, if the node answered.
    #[must_use]
    pub const fn head(self) -> Option<u64> {
        match self {
            Self::Unavailable => None,
            Self::Behind { head } | Self::Unstable { head } | Self::Serving { head } => Some(head),
        }
    }
}

impl fmt::Display for Readiness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable => f.write_str("unavailable"),
            Self::Behind { head } => write!(f, "behind at {head}"),
            Self::Unstable { head } => write!(f, "unstable at {head}"),
            Self::Serving { head } => write!(f, "serving at {head}"),
        }
    }
}

/// Options for configuring a `Poller`.
pub struct PollerOptions {
    /// Aborts every wait.
    pub cancel: CancellationToken,

    /// Delay between polls.
    pub poll_interval: Duration,

    /// Minimum delay between progress log lines.
    pub progress_interval: Duration,

    /// Health prober.
    pub prober: Arc<dyn HealthProber>,

    /// Delay between the two probes of a stability check.
    pub stability_delay: Duration,
}

/// Polls nodes at a fixed interval until they serve a height.
#[derive(Clone)]
pub struct Poller {
    cancel: CancellationToken,
    poll_interval: Duration,
    progress_interval: Duration,
    prober: Arc<dyn HealthProber>,
    stability_delay: Duration,
}

impl Poller {
    /// Creates a new `Poller`.
    #[must_use]
    pub fn new(
        PollerOptions {
            cancel,
            poll_interval,
            progress_interval,
            prober,
            stability_delay,
        }: PollerOptions,
    ) -> Self {
        Self {
            cancel,
            poll_interval,
            progress_interval,
            prober,
            stability_delay,
        }
    }

    /// The health prober polled by this poller.
    #[must_use]
    pub fn prober(&self) -> &dyn HealthProber {
        self.prober.as_ref()
    }

    /// Probes `node` once and checks whether it stably serves `height`.
    pub async fn readiness(&self, node: &NodeDescriptor, height: u64) -> Readiness {
        let Some(head) = self.prober.probe(node).await.height() else {
            return Readiness::Unavailable;
        };

        if head < height {
            return Readiness::Behind { head };
        }

        if serves_height_stably(
            self.prober.as_ref(),
            node,
            height,
            self.stability_delay,
            &self.cancel,
        )
        .await
        {
            Readiness::Serving { head }
        } else {
            Readiness::Unstable { head }
        }
    }

    /// Waits, with no timeout, until `node` stably serves `height`. Returns
    /// the node's head at that point.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cancelled`] on shutdown.
    pub async fn wait_until_serving(
        &self,
        node: &NodeDescriptor,
        height: u64,
        purpose: &'static str,
    ) -> Result<u64> {
        let mut progress = self.throttle();

        loop {
            let readiness = self.readiness(node, height).await;
            if let Readiness::Serving { head } = readiness {
                return Ok(head);
            }

            if progress.due() {
                info!(node = %node.name, height, %readiness, purpose, "waiting for node to serve height");
            }
            self.pause().await?;
        }
    }

    /// A throttle for progress logs of one wait.
    #[must_use]
    pub const fn throttle(&self) -> ProgressThrottle {
        ProgressThrottle::new(self.progress_interval)
    }

    /// Sleeps one poll interval.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cancelled`] on shutdown.
    pub async fn pause(&self) -> Result<()> {
        if sleep_or_cancel(self.poll_interval, &self.cancel).await {
            Ok(())
        } else {
            Err(Error::Cancelled)
        }
    }

    /// Sleeps `duration` unless shut down.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cancelled`] on shutdown.
    pub async fn backoff(&self, duration: Duration) -> Result<()> {
        if sleep_or_cancel(duration, &self.cancel).await {
            Ok(())
        } else {
            Err(Error::Cancelled)
        }
    }
}

//! Process control surface for chain nodes: idempotent start, two-phase stop,
//! and the per-node lock every actor takes before touching a node's process.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod container;
mod error;
mod locks;
mod output;
mod process;

pub use container::{ContainerSupervisor, ContainerSupervisorOptions};
pub use error::{Error, Result};
pub use locks::{NodeGuard, NodeLocks};
pub use process::{ProcessSpec, ProcessSupervisor};

use std::time::Duration;

use async_trait::async_trait;
use chainboot_topology::NodeDescriptor;

/// Starts and stops node processes.
///
/// Both operations are idempotent: starting a running node and stopping a
/// stopped node succeed without doing anything.
#[async_trait]
pub trait NodeSupervisor: Send + Sync + 'static {
    /// Starts the node.
    async fn start(&self, node: &NodeDescriptor) -> Result<()>;

    /// Stops the node gracefully, forcing it down once `timeout` elapses.
    async fn stop(&self, node: &NodeDescriptor, timeout: Duration) -> Result<()>;
}

//! Nodes run as containers under a container runtime CLI.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chainboot_topology::NodeDescriptor;
use tokio::process::Command;
use tracing::{debug, info};

use crate::NodeSupervisor;
use crate::error::{Error, Result};

/// Options for configuring a `ContainerSupervisor`.
#[derive(Debug, Clone)]
pub struct ContainerSupervisorOptions {
    /// Container names by node name. Nodes not listed use their own name.
    pub containers: HashMap<String, String>,

    /// Runtime binary, e.g. `docker` or `podman`.
    pub runtime: PathBuf,
}

/// Drives `<runtime> start` and `<runtime> stop --time`.
///
/// The runtime performs the graceful-then-forceful stop itself: it sends the
/// container's stop signal and kills it once the grace period elapses. A
/// container stopped this way is not brought back by its restart policy.
#[derive(Debug, Clone)]
pub struct ContainerSupervisor {
    containers: HashMap<String, String>,
    runtime: PathBuf,
}

impl ContainerSupervisor {
    /// Creates a new `ContainerSupervisor`.
    #[must_use]
    pub fn new(
        ContainerSupervisorOptions {
            containers,
            runtime,
        }: ContainerSupervisorOptions,
    ) -> Self {
        Self {
            containers,
            runtime,
        }
    }

    fn container<'a>(&'a self, node: &'a NodeDescriptor) -> &'a str {
        self.containers
            .get(&node.name)
            .map_or(node.name.as_str(), String::as_str)
    }

    async fn run(&self, args: &[&str]) -> Result<()> {
        let command = format!("{} {}", self.runtime.display(), args.join(" "));
        debug!(%command, "running container runtime");

        let output = Command::new(&self.runtime)
            .args(args)
            .output()
            .await
            .map_err(|e| Error::Io("failed to run container runtime", e))?;

        if output.status.success() {
            Ok(())
        } else {
            Err(Error::CommandFailed {
                command,
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }
}

#[async_trait]
impl NodeSupervisor for ContainerSupervisor {
    async fn start(&self, node: &NodeDescriptor) -> Result<()> {
        let container = self.container(node);
        info!(node = %node.name, container, "starting container");
        self.run(&["start", container]).await
    }

    async fn stop(&self, node: &NodeDescriptor, timeout: Duration) -> Result<()> {
        let container = self.container(node);
        let secs = timeout.as_secs().max(1).to_string();
        info!(node = %node.name, container, timeout_secs = %secs, "stopping container");
        self.run(&["stop", "--time", &secs, container]).await
    }
}

//! JSON chain configuration.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chainboot_bridge::CommandTemplate;
use chainboot_supervisor::ProcessSpec;
use chainboot_topology::{BridgeSpec, ChainTopology, NodeDescriptor, WatchdogThresholds};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Name of the profile used for nodes that do not name one.
pub const DEFAULT_PROFILE: &str = "default";

/// How node processes are controlled.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SupervisorConfig {
    /// Nodes run in containers managed by a container runtime CLI.
    Container {
        /// Runtime binary, e.g. `docker` or `podman`.
        #[serde(default = "default_runtime")]
        runtime: PathBuf,

        /// Container name per node. Unlisted nodes use the node name.
        #[serde(default)]
        containers: HashMap<String, String>,
    },

    /// Nodes run as child processes of the orchestrator.
    Process {
        /// Process spec per node.
        processes: HashMap<String, ProcessSpec>,
    },
}

fn default_runtime() -> PathBuf {
    PathBuf::from("docker")
}

/// How chain data is moved across a bridge.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ToolConfig {
    /// Offline export and import commands run against the stopped stores.
    Command {
        /// Export command. Placeholders: `{datadir}`, `{artifact}`,
        /// `{first}`, `{last}`.
        export: CommandTemplate,

        /// Import command. Placeholders: `{datadir}`, `{artifact}`.
        import: CommandTemplate,
    },

    /// Raw blocks pulled over RPC from the live source, offline import.
    Rpc {
        /// Blocks per batched request.
        #[serde(default = "default_batch_size")]
        batch_size: u64,

        /// Import command.
        import: CommandTemplate,
    },
}

const fn default_batch_size() -> u64 {
    100
}

/// Intervals and timeouts. Durations are whole seconds unless the name says
/// otherwise.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TimingConfig {
    /// Per-request RPC timeout.
    pub probe_timeout_ms: u64,

    /// Delay between the two probes of a stability check.
    pub stability_delay_ms: u64,

    /// Delay between readiness polls.
    pub poll_interval_secs: u64,

    /// Minimum delay between progress log lines of a long wait.
    pub progress_interval_secs: u64,

    /// Grace period before a stopped node is killed.
    pub stop_timeout_secs: u64,

    /// Delay before a failed migration is run again.
    pub migration_retry_interval_secs: u64,

    /// Give up on a bridge after this many failed migrations.
    pub max_migration_attempts: Option<u32>,

    /// Blocks exported by the test export that decides whether a source needs
    /// repair.
    pub repair_probe_blocks: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            probe_timeout_ms: 2000,
            stability_delay_ms: 2000,
            poll_interval_secs: 10,
            progress_interval_secs: 60,
            stop_timeout_secs: 120,
            migration_retry_interval_secs: 60,
            max_migration_attempts: None,
            repair_probe_blocks: 16,
        }
    }
}

impl TimingConfig {
    /// Per-request RPC timeout.
    #[must_use]
    pub const fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    /// Delay between the two probes of a stability check.
    #[must_use]
    pub const fn stability_delay(&self) -> Duration {
        Duration::from_millis(self.stability_delay_ms)
    }

    /// Delay between readiness polls.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Minimum delay between progress log lines.
    #[must_use]
    pub const fn progress_interval(&self) -> Duration {
        Duration::from_secs(self.progress_interval_secs)
    }

    /// Grace period before a stopped node is killed.
    #[must_use]
    pub const fn stop_timeout(&self) -> Duration {
        Duration::from_secs(self.stop_timeout_secs)
    }

    /// Delay before a failed migration is run again.
    #[must_use]
    pub const fn migration_retry_interval(&self) -> Duration {
        Duration::from_secs(self.migration_retry_interval_secs)
    }
}

/// The whole chain: nodes, bridges, process control and tuning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChainConfig {
    /// Directory for export artifacts and marker files.
    pub artifacts_dir: PathBuf,

    /// Process control.
    pub supervisor: SupervisorConfig,

    /// Bridge data mover.
    pub tool: ToolConfig,

    /// Intervals and timeouts.
    #[serde(default)]
    pub timing: TimingConfig,

    /// Named watchdog thresholds. The `default` entry, if present, replaces
    /// the built-in defaults for nodes without a profile.
    #[serde(default)]
    pub profiles: HashMap<String, WatchdogThresholds>,

    /// Nodes, in any order.
    pub nodes: Vec<NodeDescriptor>,

    /// One-time migrations between adjacent nodes.
    #[serde(default)]
    pub bridges: Vec<BridgeSpec>,
}

impl ChainConfig {
    /// Reads a config from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Io("failed to read config file", e))?;

        serde_json::from_str(&content).map_err(|source| Error::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Validates the nodes and bridges into a [`ChainTopology`].
    ///
    /// # Errors
    ///
    /// Returns the first problem found in the chain description.
    pub fn topology(&self) -> Result<ChainTopology> {
        let default_thresholds = self
            .profiles
            .get(DEFAULT_PROFILE)
            .copied()
            .unwrap_or_default();

        Ok(ChainTopology::with_profiles(
            self.nodes.clone(),
            self.bridges.clone(),
            default_thresholds,
            self.profiles.clone(),
        )?)
    }

    /// Creates the artifacts directory and checks that node data
    /// directories exist wherever this host touches them directly: under a
    /// process supervisor, or when the bridge tool runs local commands.
    ///
    /// # Errors
    ///
    /// Returns an error if the artifacts directory cannot be created or a
    /// node's data directory is missing.
    pub fn prepare_paths(&self) -> Result<()> {
        std::fs::create_dir_all(&self.artifacts_dir)
            .map_err(|e| Error::Io("failed to create artifacts directory", e))?;

        let local_data = matches!(self.supervisor, SupervisorConfig::Process { .. })
            || matches!(self.tool, ToolConfig::Command { .. });
        if !local_data {
            return Ok(());
        }

        match self.nodes.iter().find(|node| !node.data_dir.is_dir()) {
            Some(node) => Err(Error::MissingDataDir {
                node: node.name.clone(),
                path: node.data_dir.clone(),
            }),
            None => Ok(()),
        }
    }
}

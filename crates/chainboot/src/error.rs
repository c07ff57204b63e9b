//! Error types for the orchestrator.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for the orchestrator.
pub type Result<T> = std::result::Result<T, Error>;

/// Orchestrator errors.
#[derive(Debug, Error)]
pub enum Error {
    /// A manual migration failed.
    #[error(transparent)]
    Bridge(#[from] chainboot_bridge::Error),

    /// The configuration file could not be parsed.
    #[error("invalid config file {path}: {source}")]
    ConfigParse {
        /// Config file path.
        path: PathBuf,
        /// Parser error.
        #[source]
        source: serde_json::Error,
    },

    /// A node's data directory does not exist.
    #[error("data directory of node {node} does not exist: {}", path.display())]
    MissingDataDir {
        /// Node name.
        node: String,
        /// Configured data directory.
        path: PathBuf,
    },

    /// IO error.
    #[error("io error: {0} - {1}")]
    Io(&'static str, #[source] io::Error),

    /// The HTTP prober could not be built.
    #[error(transparent)]
    Probe(#[from] chainboot_probe::Error),

    /// Bring-up failed.
    #[error(transparent)]
    Sequencer(#[from] chainboot_sequencer::Error),

    /// The chain description is unusable.
    #[error(transparent)]
    Topology(#[from] chainboot_topology::TopologyError),
}

//! Error types for bridge migrations.

use std::io;
use std::path::PathBuf;
use std::process::ExitStatus;

use thiserror::Error;

/// Result type for bridge migrations.
pub type Result<T> = std::result::Result<T, Error>;

/// Migration-Incomplete errors. None of these leave a done marker behind; the
/// migration is retried from the top.
#[derive(Debug, Error)]
pub enum Error {
    /// Shutdown was requested mid-migration.
    #[error("migration cancelled")]
    Cancelled,

    /// The export step produced no data.
    #[error("export produced an empty artifact at {0}")]
    EmptyArtifact(PathBuf),

    /// IO error.
    #[error("io error: {0} - {1}")]
    Io(&'static str, #[source] io::Error),

    /// The source failed its test export and has no upstream to repair from.
    #[error("source {0} cannot serve its early range and has no upstream to repair from")]
    NoRepairSource(String),

    /// A raw block could not be decoded.
    #[error("block {height}: {reason}")]
    RawBlock {
        /// Block height.
        height: u64,
        /// What was wrong with it.
        reason: String,
    },

    /// The source still failed its test export after a completed repair.
    #[error("source {source_node} still cannot serve its early range after repair at cutoff {cutoff}")]
    RepairIneffective {
        /// The repaired node.
        source_node: String,
        /// Repair cutoff.
        cutoff: u64,
    },

    /// JSON-RPC failure during an RPC export.
    #[error(transparent)]
    Rpc(#[from] chainboot_probe::Error),

    /// Starting or stopping a node failed.
    #[error(transparent)]
    Supervisor(#[from] chainboot_supervisor::Error),

    /// An export or import command failed.
    #[error("{step} for node {node} exited with {status}: {stderr}")]
    ToolFailed {
        /// `export` or `import`.
        step: &'static str,
        /// Node whose store was being read or written.
        node: String,
        /// Exit status.
        status: ExitStatus,
        /// Tail of the command's standard error.
        stderr: String,
    },

    /// A bridge names a node that is not in the topology.
    #[error("unknown node {0}")]
    UnknownNode(String),
}

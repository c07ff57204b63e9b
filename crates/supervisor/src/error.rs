//! Error types for process control.

use std::io;
use std::process::ExitStatus;

use thiserror::Error;

/// Result type for process control.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while starting or stopping a node.
#[derive(Debug, Error)]
pub enum Error {
    /// A runtime command exited with a non-zero status.
    #[error("`{command}` exited with {status}: {stderr}")]
    CommandFailed {
        /// The command line that was run.
        command: String,
        /// Exit status.
        status: ExitStatus,
        /// Captured standard error.
        stderr: String,
    },

    /// IO error.
    #[error("io error: {0} - {1}")]
    Io(&'static str, #[source] io::Error),

    /// The process ID does not fit a signal target.
    #[error("invalid pid {0}")]
    Pid(u32),

    /// Sending a signal failed.
    #[error("failed to send {signal} to node {node}: {source}")]
    Signal {
        /// Node name.
        node: String,
        /// Signal name.
        signal: &'static str,
        /// Underlying errno.
        source: nix::errno::Errno,
    },

    /// No process definition exists for the node.
    #[error("no process configured for node {0}")]
    UnknownNode(String),
}

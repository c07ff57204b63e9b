//! Error types for watchdog recovery.

use std::io;

use thiserror::Error;

/// Result type for watchdog recovery.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while recovering a node. The watchdog logs them and keeps
/// sampling.
#[derive(Debug, Error)]
pub enum Error {
    /// Deleting chain data failed.
    #[error("io error: {0} - {1}")]
    Io(&'static str, #[source] io::Error),

    /// Stopping or starting the node failed.
    #[error(transparent)]
    Supervisor(#[from] chainboot_supervisor::Error),
}

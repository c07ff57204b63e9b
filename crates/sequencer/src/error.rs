//! Error types for the sequencer.

use thiserror::Error;

/// Result type for the sequencer.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that end a bring-up.
#[derive(Debug, Error)]
pub enum Error {
    /// Shutdown was requested.
    #[error("bring-up cancelled")]
    Cancelled,

    /// A bridge migration kept failing past the configured attempt limit.
    #[error("migration {source_node} -> {dest} at cutoff {cutoff} failed {attempts} times")]
    MigrationExhausted {
        /// Exporting node.
        source_node: String,
        /// Importing node.
        dest: String,
        /// Inclusive upper bound of the range.
        cutoff: u64,
        /// Attempts made.
        attempts: u32,
        /// Last failure.
        #[source]
        source: chainboot_bridge::Error,
    },

    /// A node named by the chain is missing from it.
    #[error("unknown node {0}")]
    UnknownNode(String),
}

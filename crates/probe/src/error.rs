//! Error types for raw JSON-RPC calls.

use thiserror::Error;

/// Result type for JSON-RPC calls.
pub type Result<T> = std::result::Result<T, Error>;

/// JSON-RPC transport and protocol errors.
#[derive(Debug, Error)]
pub enum Error {
    /// A batch response did not contain an answer for a request.
    #[error("batch response missing id {0}")]
    MissingResponse(u64),

    /// The response body was not a JSON-RPC response.
    #[error("malformed response: {0}")]
    Malformed(String),

    /// The node answered with a JSON-RPC error object.
    #[error("{method} failed with code {code}: {message}")]
    Rpc {
        /// Method called.
        method: String,
        /// JSON-RPC error code.
        code: i64,
        /// JSON-RPC error message.
        message: String,
    },

    /// Connection, timeout or HTTP status failure.
    #[error(transparent)]
    Transport(#[from] reqwest::Error),
}

//! Server error types.

use thiserror::Error;

/// Errors raised while building or starting the HTTP server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Binding or querying the listener failed.
    #[error("listener error: {0}")]
    Io(#[from] std::io::Error),
    /// A configured extra header has an invalid name or value.
    #[error("invalid header {name:?}: {reason}")]
    InvalidHeader {
        /// Header name as configured.
        name: String,
        /// Why it was rejected.
        reason: String,
    },
    /// The global metrics recorder could not be installed.
    #[error("failed to install metrics recorder: {0}")]
    MetricsInstall(String),
}

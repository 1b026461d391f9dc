//! Error types for the transport module.

use thiserror::Error;

/// Errors raised by message sources and sinks.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Binding the publish address failed.
    #[error("Failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// The transport was shut down.
    #[error("Transport closed")]
    Closed,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

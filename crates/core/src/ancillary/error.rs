//! Error types for the ancillary module.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while refreshing the navigation helper files.
///
/// None of these stop processing; the refresher logs them and carries on
/// with the files already in place.
#[derive(Debug, Error)]
pub enum AncillaryError {
    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),

    #[error("Source {url} is unreachable: {reason}")]
    Unreachable { url: String, reason: String },

    #[error("Download of {url} failed with status {status}")]
    Status { url: String, status: u16 },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl AncillaryError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

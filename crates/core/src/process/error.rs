//! Error types for the process module.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while running an external executable.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// The executable does not exist.
    #[error("Executable not found: {program}")]
    NotFound { program: PathBuf },

    /// The process could not be spawned or awaited.
    #[error("Failed to run {program}: {source}")]
    Io {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The process exceeded the configured time limit and was killed.
    #[error("{program} timed out after {timeout_secs} seconds")]
    Timeout { program: PathBuf, timeout_secs: u64 },
}

impl ProcessError {
    pub(crate) fn spawn(program: PathBuf, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::NotFound {
            Self::NotFound { program }
        } else {
            Self::Io { program, source }
        }
    }
}

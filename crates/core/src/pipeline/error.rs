//! Error types for the pipeline module.

use std::path::PathBuf;
use thiserror::Error;

use super::types::Stage;
use crate::process::ProcessError;

/// Errors that abort a scene's pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The stage executable could not be run.
    #[error("{stage} stage could not run: {source}")]
    Process {
        stage: Stage,
        #[source]
        source: ProcessError,
    },

    /// The stage exited with a status its policy does not accept.
    #[error("{stage} stage failed with exit code {code:?}")]
    StageFailed { stage: Stage, code: Option<i32> },

    /// A stage ran without producing an output later stages need.
    #[error("{stage} stage did not produce {path}")]
    MissingOutput { stage: Stage, path: PathBuf },

    /// The Aqua scene has no packet file.
    #[error("No GBAD packet file for Aqua scene")]
    MissingPacketFile,

    /// A product name template is not a valid strftime format.
    #[error("Invalid file name template: {template}")]
    InvalidTemplate { template: String },

    /// Moving an output to its final location failed.
    #[error(transparent)]
    Relocate(#[from] RelocateError),

    /// Working directory or level-1 home could not be prepared.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while moving an output out of the working directory.
#[derive(Debug, Error)]
pub enum RelocateError {
    #[error("Failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to move {source_path} to {destination}: {source}")]
    Move {
        source_path: PathBuf,
        destination: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

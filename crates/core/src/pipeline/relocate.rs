//! Moving stage outputs from the working directory to their final path.
//!
//! External binaries write their products in place under a predictable
//! name. Readers of the level-1 home must only ever see complete files, so
//! an output appears at its destination through a single rename.

use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

use super::error::RelocateError;
use super::types::OutputOutcome;

/// Attempts to move a file atomically (rename).
async fn try_atomic_move(source: &Path, destination: &Path) -> Result<bool, std::io::Error> {
    match fs::rename(source, destination).await {
        Ok(()) => Ok(true),
        Err(e) => {
            // Cross-filesystem moves fail with EXDEV (18 on Linux)
            if e.kind() == std::io::ErrorKind::CrossesDevices || e.raw_os_error() == Some(18) {
                Ok(false)
            } else {
                Err(e)
            }
        }
    }
}

fn partial_path(destination: &Path) -> PathBuf {
    let mut name = destination
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".partial");
    destination.with_file_name(name)
}

/// Copies next to the destination, then renames into place.
async fn copy_then_rename(source: &Path, destination: &Path) -> Result<(), std::io::Error> {
    let partial = partial_path(destination);
    if let Err(e) = fs::copy(source, &partial).await {
        let _ = fs::remove_file(&partial).await;
        return Err(e);
    }
    fs::rename(&partial, destination).await?;
    fs::remove_file(source).await
}

/// Moves `<working_dir>/<file name of destination>` to `destination`.
///
/// Returns [`OutputOutcome::Missing`] when the stage did not produce the
/// file; the caller decides whether that is fatal.
pub async fn relocate(
    working_dir: &Path,
    destination: &Path,
) -> Result<OutputOutcome, RelocateError> {
    let Some(name) = destination.file_name() else {
        return Ok(OutputOutcome::Missing(destination.to_path_buf()));
    };
    let source = working_dir.join(name);

    if !fs::try_exists(&source).await.unwrap_or(false) {
        warn!("Missing file: {}", source.display());
        return Ok(OutputOutcome::Missing(destination.to_path_buf()));
    }

    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|source| RelocateError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
    }

    let move_error = |e| RelocateError::Move {
        source_path: source.clone(),
        destination: destination.to_path_buf(),
        source: e,
    };

    if !try_atomic_move(&source, destination).await.map_err(move_error)? {
        debug!(
            "{} is on another filesystem, copying",
            destination.display()
        );
        copy_then_rename(&source, destination)
            .await
            .map_err(move_error)?;
    }

    debug!("Moved {} to {}", source.display(), destination.display());
    Ok(OutputOutcome::Present(destination.to_path_buf()))
}

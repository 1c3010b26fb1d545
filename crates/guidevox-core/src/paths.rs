//! Cache directory resolution and creation.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors from path resolution and directory creation.
#[derive(Debug, Error)]
pub enum PathError {
    /// The platform data directory could not be determined.
    #[error("Could not determine a platform data directory")]
    NoDataDir,

    /// The path exists but is not a directory.
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    /// Creating the directory failed.
    #[error("Failed to create {path}: {reason}")]
    CreateFailed {
        /// The directory that could not be created.
        path: PathBuf,
        /// Underlying reason.
        reason: String,
    },
}

/// Default speech cache directory under the platform data dir,
/// e.g. `~/.local/share/guidevox/speech-cache` on Linux.
pub fn default_cache_dir() -> Result<PathBuf, PathError> {
    dirs::data_dir()
        .map(|root| root.join("guidevox").join("speech-cache"))
        .ok_or(PathError::NoDataDir)
}

/// Ensure the provided directory exists, creating it (and parents) if
/// missing.
pub fn ensure_directory(path: &Path) -> Result<(), PathError> {
    if path.exists() {
        if !path.is_dir() {
            return Err(PathError::NotADirectory(path.to_path_buf()));
        }
        return Ok(());
    }
    fs::create_dir_all(path).map_err(|e| PathError::CreateFailed {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

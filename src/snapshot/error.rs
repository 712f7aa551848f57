//! Error types for snapshot capture and comparison.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while capturing or comparing directory snapshots.
#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("Watched directory {path} does not exist")]
    MissingRoot { path: PathBuf },

    #[error("Watched path {path} is not a directory")]
    NotADirectory { path: PathBuf },

    #[error("Cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot compare snapshots of different directories: expected {expected}, got {actual}")]
    DirectoryMismatch { expected: PathBuf, actual: PathBuf },
}

pub type SnapshotResult<T> = Result<T, SnapshotError>;

//! Error types for snapshot persistence.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Snapshot stream error: {0}")]
    Stream(#[from] std::io::Error),

    #[error("Snapshot stream ended while reading {context}")]
    Truncated { context: &'static str },

    #[error("Corrupt snapshot data: {reason}")]
    Corrupt { reason: String },

    #[error("Unsupported snapshot format version '{found}' (expected '{expected}')")]
    VersionMismatch {
        found: String,
        expected: &'static str,
    },

    #[error("Value does not fit the snapshot format: {reason}")]
    Unrepresentable { reason: String },

    #[error("Refusing to persist an empty watch state")]
    EmptyState,
}

impl StorageError {
    /// Whether the persisted bytes themselves are unusable, as opposed to the
    /// medium failing or the format being from another version.
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            StorageError::Truncated { .. } | StorageError::Corrupt { .. }
        )
    }
}

pub type StorageResult<T> = Result<T, StorageError>;

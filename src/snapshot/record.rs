//! Observed metadata of a single regular file.

use std::fs::Metadata;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Metadata of one file as seen by a single capture.
///
/// Identity is the path as spelled during traversal, never the inode: two
/// spellings of the same physical file are two distinct records. Equality
/// covers the path and all three metadata fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileRecord {
    path: PathBuf,
    exists: bool,
    length: u64,
    /// Milliseconds since the Unix epoch.
    last_modified: i64,
}

impl FileRecord {
    pub fn new(path: impl Into<PathBuf>, exists: bool, length: u64, last_modified: i64) -> Self {
        Self {
            path: path.into(),
            exists,
            length,
            last_modified,
        }
    }

    /// Build a record from metadata already read for `path`.
    pub fn from_metadata(path: impl Into<PathBuf>, metadata: &Metadata) -> Self {
        let last_modified = metadata.modified().map(epoch_millis).unwrap_or(0);
        Self::new(path, true, metadata.len(), last_modified)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.exists
    }

    pub fn length(&self) -> u64 {
        self.length
    }

    pub fn last_modified(&self) -> i64 {
        self.last_modified
    }

    /// True when existence, length or timestamp differ. The path is not compared.
    pub fn metadata_differs(&self, other: &FileRecord) -> bool {
        self.exists != other.exists
            || self.length != other.length
            || self.last_modified != other.last_modified
    }
}

impl std::fmt::Display for FileRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

/// Convert a timestamp to signed epoch milliseconds; pre-1970 times are negative.
pub(crate) fn epoch_millis(time: SystemTime) -> i64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(after) => i64::try_from(after.as_millis()).unwrap_or(i64::MAX),
        Err(before) => -i64::try_from(before.duration().as_millis()).unwrap_or(i64::MAX),
    }
}

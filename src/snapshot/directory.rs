//! Point-in-time listing of every regular file under a watched root.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use walkdir::WalkDir;

use super::change::ChangeBatch;
use super::error::{SnapshotError, SnapshotResult};
use super::record::FileRecord;
use crate::filter::MatchPredicate;

/// Immutable listing of the regular files below one directory.
///
/// Built by a recursive walk of the root or restored from a persisted state.
/// Subdirectories are walked but never recorded. Symbolic links to regular
/// files are recorded with their target's metadata; symbolic links to
/// directories are not followed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectorySnapshot {
    directory: PathBuf,
    captured_at: DateTime<Utc>,
    files: BTreeMap<PathBuf, FileRecord>,
}

impl DirectorySnapshot {
    /// Walk `directory` and record every regular file below it.
    ///
    /// Entries that vanish between listing and stat are skipped. Any other
    /// I/O failure aborts the capture.
    pub fn capture(directory: impl Into<PathBuf>) -> SnapshotResult<Self> {
        let directory = directory.into();
        let captured_at = now_millis();

        match std::fs::metadata(&directory) {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => return Err(SnapshotError::NotADirectory { path: directory }),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(SnapshotError::MissingRoot { path: directory });
            }
            Err(source) => {
                return Err(SnapshotError::Io {
                    path: directory,
                    source,
                });
            }
        }

        let mut files = BTreeMap::new();
        for entry in WalkDir::new(&directory).follow_links(false) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    if e.depth() > 0 && vanished(&e) {
                        continue;
                    }
                    return Err(walk_error(&directory, e));
                }
            };

            if entry.file_type().is_dir() {
                continue;
            }

            let metadata = if entry.path_is_symlink() {
                match std::fs::metadata(entry.path()) {
                    Ok(meta) => meta,
                    // Dangling link
                    Err(e) if e.kind() == ErrorKind::NotFound => continue,
                    Err(source) => {
                        return Err(SnapshotError::Io {
                            path: entry.path().to_path_buf(),
                            source,
                        });
                    }
                }
            } else {
                match entry.metadata() {
                    Ok(meta) => meta,
                    Err(e) if vanished(&e) => continue,
                    Err(e) => return Err(walk_error(&directory, e)),
                }
            };

            if !metadata.is_file() {
                continue;
            }

            let record = FileRecord::from_metadata(entry.into_path(), &metadata);
            files.insert(record.path().to_path_buf(), record);
        }

        Ok(Self {
            directory,
            captured_at,
            files,
        })
    }

    /// Assemble a snapshot from already known records (used by restore and tests).
    ///
    /// A later record with the same path replaces an earlier one.
    pub fn from_parts(
        directory: impl Into<PathBuf>,
        captured_at: DateTime<Utc>,
        records: impl IntoIterator<Item = FileRecord>,
    ) -> Self {
        let files = records
            .into_iter()
            .map(|record| (record.path().to_path_buf(), record))
            .collect();
        Self {
            directory: directory.into(),
            captured_at,
            files,
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    /// Records ordered by path.
    pub fn files(&self) -> impl ExactSizeIterator<Item = &FileRecord> + '_ {
        self.files.values()
    }

    pub fn get(&self, path: &Path) -> Option<&FileRecord> {
        self.files.get(path)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Equality of the predicate-filtered record sets of two snapshots of the
    /// same directory. Snapshots of different directories are never equal.
    pub fn filtered_eq(&self, other: &DirectorySnapshot, predicate: &dyn MatchPredicate) -> bool {
        if self.directory != other.directory {
            return false;
        }
        // Both maps are path ordered, so sequence equality is set equality.
        let ours = self.files.values().filter(|f| predicate.accept(f.path()));
        let theirs = other.files.values().filter(|f| predicate.accept(f.path()));
        ours.eq(theirs)
    }

    /// Changes that turn `self` into `current`.
    pub fn changes_to(
        &self,
        current: &DirectorySnapshot,
        predicate: &dyn MatchPredicate,
    ) -> SnapshotResult<ChangeBatch> {
        super::diff::diff(self, current, predicate)
    }
}

impl std::fmt::Display for DirectorySnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} snapshot at {}",
            self.directory.display(),
            self.captured_at.format("%Y-%m-%dT%H:%M:%S%.3f")
        )
    }
}

/// Current time truncated to whole milliseconds, the precision that survives
/// persistence.
pub(crate) fn now_millis() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now)
}

fn vanished(error: &walkdir::Error) -> bool {
    error
        .io_error()
        .is_some_and(|e| e.kind() == ErrorKind::NotFound)
}

fn walk_error(root: &Path, error: walkdir::Error) -> SnapshotError {
    let path = error
        .path()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| root.to_path_buf());
    let source = error
        .into_io_error()
        .unwrap_or_else(|| std::io::Error::other("directory walk failed"));
    SnapshotError::Io { path, source }
}

//! The watched-root → snapshot map committed by the scan loop.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;

use super::directory::DirectorySnapshot;
use super::error::SnapshotResult;
use crate::filter::MatchPredicate;

/// Snapshot of every watched root, keyed by root path in watch order.
///
/// Never edited field by field: the scan loop builds a new state each
/// committed cycle and swaps it in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatchState {
    snapshots: IndexMap<PathBuf, DirectorySnapshot>,
}

impl WatchState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Capture a fresh snapshot of every root, failing on the first error.
    pub fn capture(roots: &[PathBuf]) -> SnapshotResult<Self> {
        roots
            .iter()
            .map(|root| DirectorySnapshot::capture(root.clone()))
            .collect::<SnapshotResult<Self>>()
    }

    pub fn get(&self, directory: &Path) -> Option<&DirectorySnapshot> {
        self.snapshots.get(directory)
    }

    pub fn directories(&self) -> impl Iterator<Item = &Path> + '_ {
        self.snapshots.keys().map(PathBuf::as_path)
    }

    pub fn snapshots(&self) -> impl ExactSizeIterator<Item = &DirectorySnapshot> + '_ {
        self.snapshots.values()
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Total number of file records over all roots.
    pub fn file_count(&self) -> usize {
        self.snapshots.values().map(DirectorySnapshot::len).sum()
    }

    /// True when both states cover the same roots and every root is
    /// filtered-equal.
    pub fn filtered_eq(&self, other: &WatchState, predicate: &dyn MatchPredicate) -> bool {
        self.snapshots.len() == other.snapshots.len()
            && self.snapshots.iter().all(|(dir, ours)| {
                other
                    .snapshots
                    .get(dir)
                    .is_some_and(|theirs| ours.filtered_eq(theirs, predicate))
            })
    }
}

impl FromIterator<DirectorySnapshot> for WatchState {
    fn from_iter<I: IntoIterator<Item = DirectorySnapshot>>(iter: I) -> Self {
        Self {
            snapshots: iter
                .into_iter()
                .map(|s| (s.directory().to_path_buf(), s))
                .collect(),
        }
    }
}

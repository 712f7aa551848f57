//! Change classification between two snapshots of one directory.

use std::collections::HashMap;
use std::path::Path;

use indexmap::IndexSet;

use super::change::{ChangeBatch, ChangeKind, ChangeRecord};
use super::directory::DirectorySnapshot;
use super::error::{SnapshotError, SnapshotResult};
use super::record::FileRecord;
use crate::filter::MatchPredicate;

/// Compute the changes that turn `previous` into `current`.
///
/// Only records accepted by `predicate` take part. A path present only in
/// `current` is an ADD, a path whose metadata differs is a MODIFY, and an
/// accepted path left over from `previous` is a DELETE. Renames surface as a
/// DELETE of the old path plus an ADD of the new one.
pub fn diff(
    previous: &DirectorySnapshot,
    current: &DirectorySnapshot,
    predicate: &dyn MatchPredicate,
) -> SnapshotResult<ChangeBatch> {
    if previous.directory() != current.directory() {
        return Err(SnapshotError::DirectoryMismatch {
            expected: previous.directory().to_path_buf(),
            actual: current.directory().to_path_buf(),
        });
    }

    let directory = current.directory();
    let mut unmatched: HashMap<&Path, &FileRecord> =
        previous.files().map(|f| (f.path(), f)).collect();
    let mut records = IndexSet::new();

    for file in current.files() {
        if !predicate.accept(file.path()) {
            continue;
        }
        match unmatched.remove(file.path()) {
            None => {
                records.insert(ChangeRecord::new(directory, file.path(), ChangeKind::Add));
            }
            Some(before) if before.metadata_differs(file) => {
                records.insert(ChangeRecord::new(directory, file.path(), ChangeKind::Modify));
            }
            Some(_) => {}
        }
    }

    for file in previous.files() {
        if unmatched.contains_key(file.path()) && predicate.accept(file.path()) {
            records.insert(ChangeRecord::new(directory, file.path(), ChangeKind::Delete));
        }
    }

    Ok(ChangeBatch::new(directory, records))
}

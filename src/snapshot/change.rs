//! Change records produced by comparing two snapshots.

use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

use indexmap::IndexSet;

/// Kind of change observed for a single file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ChangeKind {
    /// A new file has been added.
    Add,
    /// An existing file has been modified.
    Modify,
    /// An existing file has been deleted.
    Delete,
}

impl std::fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ChangeKind::Add => "ADD",
            ChangeKind::Modify => "MODIFY",
            ChangeKind::Delete => "DELETE",
        };
        f.write_str(label)
    }
}

/// One changed file below a watched directory.
///
/// Equality and hashing use the file path and the kind only.
#[derive(Debug, Clone)]
pub struct ChangeRecord {
    directory: PathBuf,
    path: PathBuf,
    kind: ChangeKind,
}

impl ChangeRecord {
    pub fn new(directory: impl Into<PathBuf>, path: impl Into<PathBuf>, kind: ChangeKind) -> Self {
        Self {
            directory: directory.into(),
            path: path.into(),
            kind,
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn kind(&self) -> ChangeKind {
        self.kind
    }

    /// Path relative to the watched directory, or `None` if the file is not
    /// below it.
    pub fn relative_name(&self) -> Option<&Path> {
        self.path.strip_prefix(&self.directory).ok()
    }
}

impl PartialEq for ChangeRecord {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path && self.kind == other.kind
    }
}

impl Eq for ChangeRecord {}

impl Hash for ChangeRecord {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.path.hash(state);
        self.kind.hash(state);
    }
}

impl std::fmt::Display for ChangeRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.path.display(), self.kind)
    }
}

/// All changes detected for one directory in one committed cycle.
///
/// Records keep detection order; equality is set equality plus the directory.
#[derive(Debug, Clone)]
pub struct ChangeBatch {
    directory: PathBuf,
    records: IndexSet<ChangeRecord>,
}

impl ChangeBatch {
    pub fn new(directory: impl Into<PathBuf>, records: IndexSet<ChangeRecord>) -> Self {
        Self {
            directory: directory.into(),
            records,
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> indexmap::set::Iter<'_, ChangeRecord> {
        self.records.iter()
    }

    /// Whether `path` changed with the given kind.
    pub fn contains(&self, path: &Path, kind: ChangeKind) -> bool {
        self.records.contains(&ChangeRecord::new(&self.directory, path, kind))
    }

    /// Records of one kind, in detection order.
    pub fn of_kind(&self, kind: ChangeKind) -> impl Iterator<Item = &ChangeRecord> + '_ {
        self.records.iter().filter(move |r| r.kind == kind)
    }
}

impl PartialEq for ChangeBatch {
    fn eq(&self, other: &Self) -> bool {
        self.directory == other.directory && self.records == other.records
    }
}

impl Eq for ChangeBatch {}

impl<'a> IntoIterator for &'a ChangeBatch {
    type Item = &'a ChangeRecord;
    type IntoIter = indexmap::set::Iter<'a, ChangeRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

impl std::fmt::Display for ChangeBatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} [", self.directory.display())?;
        for (i, record) in self.records.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{record}")?;
        }
        f.write_str("]")
    }
}

//! Persistence of the committed watch state between runs.

pub mod codec;
pub mod error;
pub mod file;
pub mod repository;

use std::path::Path;
use std::sync::Arc;

pub use codec::FORMAT_VERSION;
pub use error::{StorageError, StorageResult};
pub use file::{DEFAULT_SNAPSHOT_FILE, FileSnapshotRepository};
pub use repository::{DiscardRepository, MemoryRepository, SnapshotRepository};

/// Repository for an optional snapshot file: durable when a path is given,
/// discarding otherwise.
pub fn open_repository(path: Option<&Path>) -> Arc<dyn SnapshotRepository> {
    match path {
        Some(path) => Arc::new(FileSnapshotRepository::new(path)),
        None => Arc::new(DiscardRepository),
    }
}

//! Repository abstraction and the two non-durable variants.

use parking_lot::RwLock;

use super::error::StorageResult;
use crate::snapshot::WatchState;

/// Persistence for the committed [`WatchState`].
///
/// Implementations are shared between the facade and the scan worker, so
/// they synchronize internally.
pub trait SnapshotRepository: Send + Sync {
    /// Short name for logging.
    fn name(&self) -> &str;

    /// Persist `state`. Failures are reported to the caller, which decides
    /// whether they matter.
    fn save(&self, state: &WatchState) -> StorageResult<()>;

    /// Load the last persisted state, or `None` when there is nothing usable.
    fn restore(&self) -> Option<WatchState>;
}

/// Keeps nothing. Every restore starts from scratch.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiscardRepository;

impl SnapshotRepository for DiscardRepository {
    fn name(&self) -> &str {
        "discard"
    }

    fn save(&self, _state: &WatchState) -> StorageResult<()> {
        Ok(())
    }

    fn restore(&self) -> Option<WatchState> {
        None
    }
}

/// Holds the last saved state for the lifetime of the process.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    state: RwLock<Option<WatchState>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether anything has been saved yet.
    pub fn is_populated(&self) -> bool {
        self.state.read().is_some()
    }
}

impl SnapshotRepository for MemoryRepository {
    fn name(&self) -> &str {
        "memory"
    }

    fn save(&self, state: &WatchState) -> StorageResult<()> {
        *self.state.write() = Some(state.clone());
        Ok(())
    }

    fn restore(&self) -> Option<WatchState> {
        self.state.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::{DirectorySnapshot, FileRecord, now_millis};
    use std::sync::Arc;

    fn state() -> WatchState {
        [DirectorySnapshot::from_parts(
            "/w",
            now_millis(),
            [FileRecord::new("/w/a", true, 3, 30)],
        )]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_discard_never_restores() {
        let repo = DiscardRepository;
        repo.save(&state()).unwrap();
        assert!(repo.restore().is_none());
    }

    #[test]
    fn test_memory_restores_last_save() {
        let repo = MemoryRepository::new();
        assert!(repo.restore().is_none());
        assert!(!repo.is_populated());

        let saved = state();
        repo.save(&saved).unwrap();
        assert_eq!(repo.restore(), Some(saved));

        let empty = WatchState::new();
        repo.save(&empty).unwrap();
        assert_eq!(repo.restore(), Some(empty));
    }

    #[test]
    fn test_memory_is_shared_across_threads() {
        let repo = Arc::new(MemoryRepository::new());
        let writer = Arc::clone(&repo);
        std::thread::spawn(move || writer.save(&state()).unwrap())
            .join()
            .unwrap();
        assert!(repo.is_populated());
        assert_eq!(repo.restore().unwrap().file_count(), 1);
    }
}

//! Polling file-system watcher.
//!
//! Watches a fixed set of directories by periodic snapshotting instead of OS
//! notifications. A change is only reported once a directory has stayed
//! unchanged for a full quiet period, so files still being written are not
//! announced early. The last committed state can be persisted and restored
//! so changes made while the watcher was down are reported on restart.

pub mod cli;
pub mod config;
pub mod filter;
pub mod logging;
pub mod snapshot;
pub mod storage;
pub mod watcher;

pub use config::{ConfigError, Settings, Timing, WatcherConfig, WatcherConfigBuilder};
pub use filter::{AcceptAll, MatchPredicate, MatchingStrategy, RegexFilter, SuffixFilter};
pub use snapshot::{
    ChangeBatch, ChangeKind, ChangeRecord, DirectorySnapshot, FileRecord, SnapshotError,
    WatchState, diff,
};
pub use storage::{
    DiscardRepository, FileSnapshotRepository, MemoryRepository, SnapshotRepository, StorageError,
};
pub use watcher::{
    ChangeListener, ChannelListener, FileSystemWatcher, ListenerError, LoggingListener, ScanPhase,
    WatchError,
};

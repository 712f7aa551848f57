//! Polling file watcher.
//!
//! A single named thread owns the scan loop. The facade hands it the
//! initial state, the listeners and a per-run control block, and afterwards
//! only talks to it through that block and the shared live settings.
//!
//! # Architecture
//!
//! ```text
//! FileSystemWatcher
//!   - WatcherConfig (roots, thread name)
//!   - LiveSettings (timing + predicate, swapped atomically)
//!   - SnapshotRepository (discard | memory | file)
//!         |
//!      spawns
//!         |
//! ScanLoop (scan thread)
//!   sleep -> probe until stable -> diff -> save -> listeners
//! ```

mod error;
mod facade;
mod listener;
mod scan;
mod signal;

pub use error::{ListenerError, WatchError};
pub use facade::FileSystemWatcher;
pub use listener::{ChangeListener, ChannelListener, LoggingListener};
pub use scan::{ScanPhase, ScanSettings, UNLIMITED_SCANS};

//! Public watcher: configuration, listener registration and lifecycle.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;

use parking_lot::Mutex;

use super::error::WatchError;
use super::listener::ChangeListener;
use super::scan::{LiveSettings, ScanControl, ScanLoop};
use super::scan::{ScanPhase, ScanSettings, UNLIMITED_SCANS};
use crate::config::{ConfigError, Timing, WatcherConfig};
use crate::filter::MatchPredicate;
use crate::snapshot::{DirectorySnapshot, WatchState};
use crate::storage::{SnapshotRepository, open_repository};

/// A started scan thread and its control block.
///
/// The handle is taken by the thread that joins the worker. Until that join
/// completes the worker stays in its slot and counts as alive.
struct Worker {
    handle: Option<JoinHandle<()>>,
    thread: ThreadId,
    control: Arc<ScanControl>,
}

impl Worker {
    fn is_alive(&self) -> bool {
        self.handle.as_ref().is_none_or(|h| !h.is_finished())
    }

    fn is_stopping(&self) -> bool {
        self.handle.is_none()
    }
}

fn join_worker(handle: JoinHandle<()>) {
    if handle.join().is_err() {
        tracing::error!("[watcher] scan thread panicked");
    }
}

/// Listener registry and worker slot, guarded together so registration and
/// start never interleave.
#[derive(Default)]
struct Lifecycle {
    listeners: Vec<Arc<dyn ChangeListener>>,
    worker: Option<Worker>,
}

impl Lifecycle {
    fn is_running(&self) -> bool {
        self.worker.as_ref().is_some_and(Worker::is_alive)
    }
}

/// Polls a fixed set of directories and reports file changes to listeners.
///
/// ```no_run
/// use pollwatch::{FileSystemWatcher, LoggingListener, WatcherConfig};
///
/// let config = WatcherConfig::builder().directory("./inbox").build()?;
/// let watcher = FileSystemWatcher::new(config);
/// watcher.add_listener(LoggingListener)?;
/// watcher.start()?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
///
/// Listeners must be registered before [`start`](Self::start). At most one
/// scan thread exists at a time. Dropping the watcher stops it.
pub struct FileSystemWatcher {
    config: WatcherConfig,
    repository: Arc<dyn SnapshotRepository>,
    settings: Arc<LiveSettings>,
    remaining_scans: AtomicI64,
    lifecycle: Mutex<Lifecycle>,
}

impl FileSystemWatcher {
    /// Watcher persisting to the configured snapshot file, or to nothing.
    pub fn new(config: WatcherConfig) -> Self {
        let repository = open_repository(config.snapshot_file());
        Self::with_repository(config, repository)
    }

    /// Watcher with an explicit repository; the configured snapshot file is
    /// ignored.
    pub fn with_repository(config: WatcherConfig, repository: Arc<dyn SnapshotRepository>) -> Self {
        let settings = LiveSettings::new(ScanSettings {
            timing: config.timing(),
            predicate: Arc::clone(config.predicate()),
        });
        Self {
            remaining_scans: AtomicI64::new(config.remaining_scans()),
            config,
            repository,
            settings: Arc::new(settings),
            lifecycle: Mutex::new(Lifecycle::default()),
        }
    }

    pub fn config(&self) -> &WatcherConfig {
        &self.config
    }

    /// Register a listener. Rejected while a scan thread is alive.
    pub fn add_listener(&self, listener: impl ChangeListener + 'static) -> Result<(), WatchError> {
        self.add_shared_listener(Arc::new(listener))
    }

    pub fn add_shared_listener(&self, listener: Arc<dyn ChangeListener>) -> Result<(), WatchError> {
        let mut lifecycle = self.lifecycle.lock();
        if lifecycle.is_running() {
            return Err(WatchError::AlreadyStarted);
        }
        crate::debug_event!("watcher", "listener added", "{}", listener.name());
        lifecycle.listeners.push(listener);
        Ok(())
    }

    /// Replace the predicate. Takes effect at the start of the next cycle.
    pub fn set_predicate(&self, predicate: Arc<dyn MatchPredicate>) {
        self.settings.update(|s| s.predicate = predicate);
    }

    /// Replace poll interval and quiet period. Takes effect at the start of
    /// the next cycle.
    pub fn set_timing(
        &self,
        poll_interval: Duration,
        quiet_period: Duration,
    ) -> Result<(), WatchError> {
        let timing = Timing::new(poll_interval, quiet_period)?;
        self.settings.update(|s| s.timing = timing);
        Ok(())
    }

    /// Set the scan budget for the next start and for the running worker.
    /// A worker already being stopped keeps the budget its stop gave it.
    pub fn set_remaining_scans(&self, remaining: i64) -> Result<(), WatchError> {
        if remaining < UNLIMITED_SCANS {
            return Err(ConfigError::InvalidRemainingScans { value: remaining }.into());
        }
        self.remaining_scans.store(remaining, Ordering::SeqCst);
        let lifecycle = self.lifecycle.lock();
        if let Some(worker) = lifecycle.worker.as_ref().filter(|w| !w.is_stopping()) {
            worker.control.set_remaining(remaining);
        }
        Ok(())
    }

    /// Restore or capture the initial state and start the scan thread.
    pub fn start(&self) -> Result<(), WatchError> {
        let mut lifecycle = self.lifecycle.lock();
        if lifecycle.is_running() {
            return Err(WatchError::AlreadyStarted);
        }
        if let Some(handle) = lifecycle.worker.take().and_then(|w| w.handle) {
            join_worker(handle);
        }

        let initial = self.initial_state()?;
        let control = Arc::new(ScanControl::new(self.remaining_scans.load(Ordering::SeqCst)));
        let scan = ScanLoop::new(
            initial,
            Arc::clone(&control),
            Arc::clone(&self.settings),
            Arc::clone(&self.repository),
            lifecycle.listeners.clone(),
        );

        let name = self.config.thread_name().to_string();
        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(move || scan.run())
            .map_err(|source| WatchError::SpawnFailed { name, source })?;

        crate::log_event!(
            "watcher",
            "started",
            "{} directories, repository '{}'",
            self.config.directories().len(),
            self.repository.name()
        );
        lifecycle.worker = Some(Worker {
            thread: handle.thread().id(),
            handle: Some(handle),
            control,
        });
        Ok(())
    }

    /// Stop immediately, interrupting any wait. Blocks until the scan thread
    /// exits unless called from the scan thread itself.
    pub fn stop(&self) {
        self.stop_after(0);
    }

    /// Let the worker run `remaining` more cycles and then stop; `0` or less
    /// stops immediately. Blocks like [`stop`](Self::stop).
    ///
    /// While the worker winds down it still counts as running, so
    /// [`start`](Self::start) and listener registration stay rejected.
    pub fn stop_after(&self, remaining: i64) {
        let mut lifecycle = self.lifecycle.lock();
        let Some(worker) = lifecycle.worker.as_mut() else {
            return;
        };

        if remaining > 0 {
            if !worker.is_stopping() {
                worker.control.set_remaining(remaining);
            }
        } else {
            worker.control.halt();
        }

        if worker.thread == thread::current().id() {
            crate::debug_event!("watcher", "stop requested from scan thread");
            return;
        }

        let control = Arc::clone(&worker.control);
        let handle = worker.handle.take();
        drop(lifecycle);

        match handle {
            Some(handle) => {
                join_worker(handle);
                // The slot cannot change hands while the handle is out
                self.lifecycle.lock().worker = None;
                crate::log_event!("watcher", "stopped");
            }
            // Another thread is joining; wait for the loop to return
            None => control.wait_exited(),
        }
    }

    /// Whether a scan thread is alive.
    pub fn is_running(&self) -> bool {
        self.lifecycle.lock().is_running()
    }

    /// Phase of the current worker; `Stopped` when none is running.
    pub fn phase(&self) -> ScanPhase {
        self.lifecycle
            .lock()
            .worker
            .as_ref()
            .map_or(ScanPhase::Stopped, |w| w.control.phase())
    }

    /// Restored snapshot for each root when the repository has one, a fresh
    /// capture otherwise. Restored roots that are no longer watched are
    /// dropped.
    fn initial_state(&self) -> Result<WatchState, WatchError> {
        let restored = self.repository.restore();
        let mut snapshots = Vec::with_capacity(self.config.directories().len());
        for root in self.config.directories() {
            match restored.as_ref().and_then(|state| state.get(root)) {
                Some(snapshot) => snapshots.push(snapshot.clone()),
                None => snapshots.push(DirectorySnapshot::capture(root.clone())?),
            }
        }
        Ok(snapshots.into_iter().collect())
    }
}

impl Drop for FileSystemWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for FileSystemWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileSystemWatcher")
            .field("config", &self.config)
            .field("repository", &self.repository.name())
            .field("phase", &self.phase())
            .finish_non_exhaustive()
    }
}

//! The scan loop run by the watcher thread.
//!
//! Each cycle sleeps for `poll - quiet`, probes every root until two
//! captures one quiet period apart agree, then commits the stable state:
//! diff against the last committed state, persist, notify listeners.
//!
//! ```text
//! Idle -> Sleeping -> Probing -> Committing -> Idle
//!            \___________\______________\______ Stopped
//! ```

use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicU8, Ordering};

use parking_lot::RwLock;

use super::listener::ChangeListener;
use super::signal::StopSignal;
use crate::config::Timing;
use crate::filter::MatchPredicate;
use crate::snapshot::{ChangeBatch, DirectorySnapshot, SnapshotResult, WatchState, diff};
use crate::storage::SnapshotRepository;

/// Remaining-scan value meaning "run until stopped".
pub const UNLIMITED_SCANS: i64 = -1;

/// Where the scan thread currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ScanPhase {
    Idle = 0,
    Sleeping = 1,
    Probing = 2,
    Committing = 3,
    Stopped = 4,
}

impl ScanPhase {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ScanPhase::Idle,
            1 => ScanPhase::Sleeping,
            2 => ScanPhase::Probing,
            3 => ScanPhase::Committing,
            _ => ScanPhase::Stopped,
        }
    }
}

/// Settings the worker re-reads at the start of every cycle.
#[derive(Clone)]
pub struct ScanSettings {
    pub timing: Timing,
    pub predicate: Arc<dyn MatchPredicate>,
}

/// Atomically replaced [`ScanSettings`], shared by the facade and every
/// worker it starts.
pub(crate) struct LiveSettings {
    current: RwLock<Arc<ScanSettings>>,
}

impl LiveSettings {
    pub(crate) fn new(settings: ScanSettings) -> Self {
        Self {
            current: RwLock::new(Arc::new(settings)),
        }
    }

    pub(crate) fn current(&self) -> Arc<ScanSettings> {
        Arc::clone(&self.current.read())
    }

    /// Swap in a modified copy of the current settings.
    pub(crate) fn update(&self, change: impl FnOnce(&mut ScanSettings)) {
        let mut guard = self.current.write();
        let mut next = ScanSettings::clone(&guard);
        change(&mut next);
        *guard = Arc::new(next);
    }
}

/// Per-run control block: one per started worker.
#[derive(Debug)]
pub(crate) struct ScanControl {
    remaining: AtomicI64,
    phase: AtomicU8,
    signal: StopSignal,
    exited: StopSignal,
}

impl ScanControl {
    pub(crate) fn new(remaining_scans: i64) -> Self {
        Self {
            remaining: AtomicI64::new(remaining_scans),
            phase: AtomicU8::new(ScanPhase::Idle as u8),
            signal: StopSignal::new(),
            exited: StopSignal::new(),
        }
    }

    pub(crate) fn phase(&self) -> ScanPhase {
        ScanPhase::from_u8(self.phase.load(Ordering::Acquire))
    }

    fn set_phase(&self, phase: ScanPhase) {
        self.phase.store(phase as u8, Ordering::Release);
    }

    pub(crate) fn set_remaining(&self, remaining: i64) {
        self.remaining.store(remaining, Ordering::SeqCst);
    }

    pub(crate) fn remaining(&self) -> i64 {
        self.remaining.load(Ordering::SeqCst)
    }

    /// Stop now: no further cycle starts and any wait returns at once.
    pub(crate) fn halt(&self) {
        self.set_remaining(0);
        self.signal.trigger();
    }

    /// Block until the scan loop has returned.
    pub(crate) fn wait_exited(&self) {
        self.exited.wait_forever();
    }

    /// Take one cycle from the budget. `-1` never runs out; `0` and any
    /// other negative value mean stop.
    fn claim_cycle(&self) -> bool {
        self.remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| match n {
                UNLIMITED_SCANS => Some(UNLIMITED_SCANS),
                n if n > 0 => Some(n - 1),
                _ => None,
            })
            .is_ok()
    }
}

/// Outcome of a stabilization probe.
enum Probe {
    Stable(WatchState),
    Stopped,
}

/// State owned by the scan thread.
pub(crate) struct ScanLoop {
    roots: Vec<PathBuf>,
    committed: WatchState,
    control: Arc<ScanControl>,
    settings: Arc<LiveSettings>,
    repository: Arc<dyn SnapshotRepository>,
    listeners: Vec<Arc<dyn ChangeListener>>,
}

impl ScanLoop {
    pub(crate) fn new(
        initial: WatchState,
        control: Arc<ScanControl>,
        settings: Arc<LiveSettings>,
        repository: Arc<dyn SnapshotRepository>,
        listeners: Vec<Arc<dyn ChangeListener>>,
    ) -> Self {
        Self {
            roots: initial.directories().map(|d| d.to_path_buf()).collect(),
            committed: initial,
            control,
            settings,
            repository,
            listeners,
        }
    }

    /// Run cycles until the budget is spent or a stop is requested.
    pub(crate) fn run(mut self) {
        let _exit = ExitGuard(Arc::clone(&self.control));
        crate::debug_event!("scan", "running", "{} roots", self.roots.len());
        while self.control.claim_cycle() {
            let settings = self.settings.current();
            match self.cycle(&settings) {
                Ok(true) => {}
                Ok(false) => break,
                Err(e) => tracing::warn!("[scan] cycle abandoned: {e}"),
            }
            self.control.set_phase(ScanPhase::Idle);
        }
        crate::debug_event!("scan", "finished");
    }

    /// One full cycle. Returns `false` when interrupted by a stop.
    fn cycle(&mut self, settings: &ScanSettings) -> SnapshotResult<bool> {
        self.control.set_phase(ScanPhase::Sleeping);
        if self.control.signal.wait(settings.timing.idle_wait()) {
            return Ok(false);
        }

        self.control.set_phase(ScanPhase::Probing);
        let stable = match self.stabilize(settings)? {
            Probe::Stable(state) => state,
            Probe::Stopped => return Ok(false),
        };

        self.control.set_phase(ScanPhase::Committing);
        self.commit(stable, settings.predicate.as_ref())?;
        Ok(true)
    }

    /// Capture until two captures one quiet period apart are filtered-equal.
    fn stabilize(&self, settings: &ScanSettings) -> SnapshotResult<Probe> {
        let predicate = settings.predicate.as_ref();
        let mut baseline = WatchState::capture(&self.roots)?;
        let mut probes = 0u32;
        loop {
            if self.control.signal.wait(settings.timing.quiet_period()) {
                return Ok(Probe::Stopped);
            }
            let current = WatchState::capture(&self.roots)?;
            if current.filtered_eq(&baseline, predicate) {
                if probes > 0 {
                    crate::debug_event!("scan", "stable", "after {probes} extra probes");
                }
                return Ok(Probe::Stable(current));
            }
            probes += 1;
            crate::debug_event!("scan", "unstable", "probe {probes}");
            baseline = current;
        }
    }

    /// Diff `current` against the committed state, swap it in, persist it
    /// and notify listeners of any non-empty batch.
    pub(crate) fn commit(
        &mut self,
        current: WatchState,
        predicate: &dyn MatchPredicate,
    ) -> SnapshotResult<()> {
        if current.filtered_eq(&self.committed, predicate) {
            return Ok(());
        }

        let mut batches = Vec::new();
        for snapshot in current.snapshots() {
            let batch = match self.committed.get(snapshot.directory()) {
                Some(previous) => diff(previous, snapshot, predicate)?,
                None => {
                    let empty = DirectorySnapshot::from_parts(
                        snapshot.directory(),
                        snapshot.captured_at(),
                        [],
                    );
                    diff(&empty, snapshot, predicate)?
                }
            };
            if !batch.is_empty() {
                batches.push(batch);
            }
        }

        self.committed = current;
        if let Err(e) = self.repository.save(&self.committed) {
            tracing::error!(
                "[scan] failed to persist state with '{}' repository: {e}",
                self.repository.name()
            );
        }

        if !batches.is_empty() {
            let total: usize = batches.iter().map(ChangeBatch::len).sum();
            crate::log_event!("scan", "committed", "{total} changes in {} roots", batches.len());
            self.dispatch(&batches);
        }
        Ok(())
    }

    /// Invoke every listener once. A failing or panicking listener is logged
    /// and the rest still run.
    fn dispatch(&self, batches: &[ChangeBatch]) {
        for listener in &self.listeners {
            match panic::catch_unwind(AssertUnwindSafe(|| listener.on_change(batches))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::error!("[listener] '{}' failed: {e}", listener.name());
                }
                Err(payload) => {
                    tracing::error!(
                        "[listener] '{}' panicked: {}",
                        listener.name(),
                        panic_message(payload.as_ref())
                    );
                }
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn committed(&self) -> &WatchState {
        &self.committed
    }
}

/// Marks the control block stopped when the scan loop returns or unwinds.
struct ExitGuard(Arc<ScanControl>);

impl Drop for ExitGuard {
    fn drop(&mut self) {
        self.0.set_phase(ScanPhase::Stopped);
        self.0.exited.trigger();
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}

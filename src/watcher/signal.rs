//! Interruptible waits for the scan thread.

use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// One-shot flag threads can sleep on.
///
/// A fresh signal is created for every start, so a stop issued to an old
/// worker never leaks into the next one.
#[derive(Debug, Default)]
pub(crate) struct StopSignal {
    stopped: Mutex<bool>,
    wakeup: Condvar,
}

impl StopSignal {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Set the flag and wake every waiter.
    pub(crate) fn trigger(&self) {
        let mut stopped = self.stopped.lock();
        *stopped = true;
        self.wakeup.notify_all();
    }

    /// Sleep for `timeout` unless triggered first. Returns `true` when triggered.
    pub(crate) fn wait(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut stopped = self.stopped.lock();
        while !*stopped {
            if self.wakeup.wait_until(&mut stopped, deadline).timed_out() {
                break;
            }
        }
        *stopped
    }

    /// Block until triggered.
    pub(crate) fn wait_forever(&self) {
        let mut stopped = self.stopped.lock();
        while !*stopped {
            self.wakeup.wait(&mut stopped);
        }
    }
}

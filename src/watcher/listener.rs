//! Change listeners invoked by the scan thread after each committed cycle.

use crossbeam_channel::Sender;

use super::error::ListenerError;
use crate::snapshot::ChangeBatch;

/// Receives the non-empty change batches of one committed cycle.
///
/// Called on the scan thread, at most once per cycle, with one batch per
/// root that changed. A slow listener delays the next cycle. Errors and
/// panics are logged and do not affect other listeners.
pub trait ChangeListener: Send + Sync {
    /// Listener name for logging.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    fn on_change(&self, changes: &[ChangeBatch]) -> Result<(), ListenerError>;
}

impl<F> ChangeListener for F
where
    F: Fn(&[ChangeBatch]) -> Result<(), ListenerError> + Send + Sync,
{
    fn name(&self) -> &str {
        "closure"
    }

    fn on_change(&self, changes: &[ChangeBatch]) -> Result<(), ListenerError> {
        self(changes)
    }
}

/// Logs every change record at info level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingListener;

impl ChangeListener for LoggingListener {
    fn name(&self) -> &str {
        "logging"
    }

    fn on_change(&self, changes: &[ChangeBatch]) -> Result<(), ListenerError> {
        for batch in changes {
            for record in batch {
                crate::log_event!(
                    "change",
                    record.kind(),
                    "{}",
                    record.path().display()
                );
            }
        }
        Ok(())
    }
}

/// Forwards each change set into a channel.
#[derive(Debug, Clone)]
pub struct ChannelListener {
    sender: Sender<Vec<ChangeBatch>>,
}

impl ChannelListener {
    pub fn new(sender: Sender<Vec<ChangeBatch>>) -> Self {
        Self { sender }
    }
}

impl ChangeListener for ChannelListener {
    fn name(&self) -> &str {
        "channel"
    }

    fn on_change(&self, changes: &[ChangeBatch]) -> Result<(), ListenerError> {
        self.sender
            .send(changes.to_vec())
            .map_err(|_| ListenerError::Disconnected)
    }
}

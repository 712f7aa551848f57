//! Error types for the watcher facade and listeners.

use thiserror::Error;

use crate::config::ConfigError;
use crate::snapshot::SnapshotError;

/// Errors from watcher lifecycle operations.
#[derive(Error, Debug)]
pub enum WatchError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Watcher is already running")]
    AlreadyStarted,

    #[error("Initial snapshot failed: {0}")]
    InitialCapture(#[from] SnapshotError),

    #[error("Failed to spawn scan thread '{name}': {source}")]
    SpawnFailed {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

/// A listener could not handle a change set.
#[derive(Error, Debug)]
pub enum ListenerError {
    #[error("Listener channel disconnected")]
    Disconnected,

    #[error("Listener '{listener}' failed: {reason}")]
    Failed { listener: String, reason: String },
}

impl ListenerError {
    pub fn failed(listener: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        ListenerError::Failed {
            listener: listener.into(),
            reason: reason.to_string(),
        }
    }
}

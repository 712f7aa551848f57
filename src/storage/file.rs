//! Durable repository writing the binary snapshot layout to a single file.

use std::fs::File;
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tempfile::NamedTempFile;

use super::codec;
use super::error::{StorageError, StorageResult};
use super::repository::SnapshotRepository;
use crate::snapshot::WatchState;

/// Default backing file name, relative to the working directory.
pub const DEFAULT_SNAPSHOT_FILE: &str = "pollwatch.snapshot";

/// Persists the watch state to `path` so a restarted watcher can detect
/// changes that happened while it was down.
///
/// Saves go through a temporary file in the same directory that is renamed
/// over the target, so a failed save never leaves a half-written file.
///
/// Paths are stored as UTF-8. A path that is not valid UTF-8 is written
/// lossily, so after a restore it no longer matches the file on disk and the
/// first cycle reports it as a DELETE of the stored path plus an ADD of the
/// real one.
#[derive(Debug)]
pub struct FileSnapshotRepository {
    path: PathBuf,
    io_lock: Mutex<()>,
}

impl FileSnapshotRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            io_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Decode a snapshot file without any of the recovery side effects of
    /// [`SnapshotRepository::restore`].
    pub fn inspect(path: &Path) -> StorageResult<WatchState> {
        let file = File::open(path).map_err(|source| StorageError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        codec::read_state(&mut BufReader::new(file))
    }

    fn write_atomically(&self, state: &WatchState) -> StorageResult<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut staged = NamedTempFile::new_in(dir).map_err(io_error(dir))?;
        let staged_path = staged.path().to_path_buf();
        {
            let mut writer = BufWriter::new(staged.as_file_mut());
            codec::write_state(&mut writer, state)?;
            writer.flush().map_err(io_error(&staged_path))?;
        }
        staged.as_file().sync_all().map_err(io_error(&staged_path))?;
        staged
            .persist(&self.path)
            .map_err(|e| StorageError::Io {
                path: self.path.clone(),
                source: e.error,
            })?;
        Ok(())
    }

    fn discard_corrupt_file(&self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                crate::log_event!("snapshot", "deleted corrupt file", "{}", self.path.display())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => tracing::error!(
                "[snapshot] failed to delete corrupt file {}: {e}",
                self.path.display()
            ),
        }
    }
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> StorageError + use<> {
    let path = path.to_path_buf();
    move |source| StorageError::Io { path, source }
}

impl SnapshotRepository for FileSnapshotRepository {
    fn name(&self) -> &str {
        "file"
    }

    fn save(&self, state: &WatchState) -> StorageResult<()> {
        if state.is_empty() {
            return Err(StorageError::EmptyState);
        }
        let _guard = self.io_lock.lock();
        self.write_atomically(state)?;
        crate::debug_event!(
            "snapshot",
            "saved",
            "{} directories, {} files to {}",
            state.len(),
            state.file_count(),
            self.path.display()
        );
        Ok(())
    }

    fn restore(&self) -> Option<WatchState> {
        let _guard = self.io_lock.lock();

        let metadata = match std::fs::metadata(&self.path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::info!(
                    "[snapshot] no snapshot at {}, one is created on the first save",
                    self.path.display()
                );
                return None;
            }
            Err(e) => {
                tracing::error!("[snapshot] cannot stat {}: {e}", self.path.display());
                return None;
            }
        };

        if metadata.len() == 0 {
            tracing::info!(
                "[snapshot] {} is empty, which is not a valid state; nothing to restore",
                self.path.display()
            );
            return None;
        }

        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) => {
                tracing::error!("[snapshot] cannot open {}: {e}", self.path.display());
                return None;
            }
        };

        match codec::read_state(&mut BufReader::new(file)) {
            Ok(state) => {
                crate::log_event!(
                    "snapshot",
                    "restored",
                    "{} directories, {} files from {}",
                    state.len(),
                    state.file_count(),
                    self.path.display()
                );
                Some(state)
            }
            Err(e) if e.is_corruption() => {
                tracing::error!("[snapshot] corrupt snapshot {}: {e}", self.path.display());
                self.discard_corrupt_file();
                None
            }
            Err(e) => {
                tracing::error!("[snapshot] failed to restore {}: {e}", self.path.display());
                None
            }
        }
    }
}

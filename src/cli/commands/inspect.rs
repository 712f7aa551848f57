//! Inspect command: read-only view of a snapshot file.

use std::path::Path;

use anyhow::Context;

use crate::snapshot::WatchState;
use crate::storage::{FORMAT_VERSION, FileSnapshotRepository};

/// Decode `file` and print its contents. Never deletes or rewrites the file,
/// even when it is corrupt.
pub fn run_inspect(file: &Path, list_files: bool) -> anyhow::Result<()> {
    let state = FileSnapshotRepository::inspect(file)
        .with_context(|| format!("Cannot read snapshot {}", file.display()))?;
    print!("{}", render(&state, list_files));
    Ok(())
}

fn render(state: &WatchState, list_files: bool) -> String {
    let mut out = format!(
        "format {FORMAT_VERSION}, {} directories, {} files\n",
        state.len(),
        state.file_count()
    );
    for snapshot in state.snapshots() {
        out.push_str(&format!(
            "{}\t{} files\tcaptured {}\n",
            snapshot.directory().display(),
            snapshot.len(),
            snapshot.captured_at().format("%Y-%m-%dT%H:%M:%S%.3fZ")
        ));
        if list_files {
            for file in snapshot.files() {
                out.push_str(&format!(
                    "  {}\t{} bytes\tmodified {}\n",
                    file.path().display(),
                    file.length(),
                    file.last_modified()
                ));
            }
        }
    }
    out
}

//! Watch command: run the watcher and print changes to stdout.

use std::fs::OpenOptions;
use std::io::{self, ErrorKind, Write};
use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use crossbeam_channel::RecvTimeoutError;

use crate::cli::WatchArgs;
use crate::config::{FilterSettings, Settings, WatcherConfig, WatcherSettings};
use crate::filter::MatchingStrategy;
use crate::snapshot::ChangeBatch;
use crate::watcher::{ChannelListener, FileSystemWatcher, LoggingListener};

const RECV_TICK: Duration = Duration::from_millis(100);

/// Run watch command until the scan budget is spent.
///
/// Prints one `KIND<TAB>PATH` line per change.
pub fn run_watch(settings: &Settings, args: &WatchArgs) -> anyhow::Result<()> {
    let mut watcher_settings = settings.watcher.clone();
    apply_overrides(&mut watcher_settings, args);

    if watcher_settings.snapshot.enabled {
        ensure_snapshot_file(&watcher_settings.snapshot.path)?;
    }
    let config =
        WatcherConfig::from_settings(&watcher_settings).context("Invalid watcher configuration")?;

    let (tx, rx) = crossbeam_channel::unbounded();
    let watcher = FileSystemWatcher::new(config);
    watcher.add_listener(ChannelListener::new(tx))?;
    watcher.add_listener(LoggingListener)?;
    watcher.start()?;

    eprintln!(
        "Watching {} directories (poll {}ms, quiet {}ms)",
        watcher.config().directories().len(),
        watcher.config().timing().poll_interval().as_millis(),
        watcher.config().timing().quiet_period().as_millis()
    );

    let mut stdout = io::stdout().lock();
    loop {
        match rx.recv_timeout(RECV_TICK) {
            Ok(batches) => print_changes(&mut stdout, &batches)?,
            Err(RecvTimeoutError::Timeout) if !watcher.is_running() => break,
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    // Changes sent between the last receive and the worker exiting
    while let Ok(batches) = rx.try_recv() {
        print_changes(&mut stdout, &batches)?;
    }

    watcher.stop();
    Ok(())
}

fn apply_overrides(settings: &mut WatcherSettings, args: &WatchArgs) {
    if !args.directories.is_empty() {
        settings.directories = args.directories.clone();
    }
    if let Some(poll) = args.poll_ms {
        settings.poll_interval_ms = poll;
    }
    if let Some(quiet) = args.quiet_ms {
        settings.quiet_period_ms = quiet;
    }
    if let Some(scans) = args.scans {
        settings.remaining_scans = scans;
    }
    if !args.suffix.is_empty() {
        settings.filter = FilterSettings {
            strategy: MatchingStrategy::Suffix,
            patterns: args.suffix.clone(),
        };
    }
    if !args.regex.is_empty() {
        settings.filter = FilterSettings {
            strategy: MatchingStrategy::Regex,
            patterns: args.regex.clone(),
        };
    }
    if let Some(path) = &args.snapshot {
        settings.snapshot.enabled = true;
        settings.snapshot.path = path.clone();
    }
    if args.lenient {
        settings.strict = false;
    }
}

/// Create an empty snapshot file if there is none. An empty file restores
/// as "no state", so the first run starts from a fresh capture.
fn ensure_snapshot_file(path: &Path) -> anyhow::Result<()> {
    match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(_) => {
            crate::log_event!("snapshot", "created", "{}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(()),
        Err(e) => {
            Err(e).with_context(|| format!("Cannot create snapshot file {}", path.display()))
        }
    }
}

fn print_changes(out: &mut impl Write, batches: &[ChangeBatch]) -> io::Result<()> {
    for batch in batches {
        for record in batch {
            writeln!(out, "{}\t{}", record.kind(), record.path().display())?;
        }
    }
    out.flush()
}

use crossbeam_channel::Receiver;
use pollwatch::{
    ChangeBatch, ChangeKind, ChannelListener, FileSystemWatcher, ListenerError, MemoryRepository,
    ScanPhase, SuffixFilter, WatchError, WatcherConfig,
};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock, Weak};
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempDir;

const WAIT: Duration = Duration::from_secs(5);

fn fast_config(root: &Path) -> WatcherConfig {
    WatcherConfig::builder()
        .directory(root)
        .timing_ms(200, 50)
        .build()
        .unwrap()
}

fn watch(config: WatcherConfig) -> (FileSystemWatcher, Receiver<Vec<ChangeBatch>>) {
    let (tx, rx) = crossbeam_channel::unbounded();
    let watcher = FileSystemWatcher::new(config);
    watcher.add_listener(ChannelListener::new(tx)).unwrap();
    (watcher, rx)
}

fn next_changes(rx: &Receiver<Vec<ChangeBatch>>) -> Vec<ChangeBatch> {
    rx.recv_timeout(WAIT).expect("no changes reported in time")
}

fn wait_until_stopped(watcher: &FileSystemWatcher) -> bool {
    let deadline = Instant::now() + WAIT;
    while watcher.is_running() && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(10));
    }
    !watcher.is_running()
}

fn single_batch(changes: Vec<ChangeBatch>) -> ChangeBatch {
    assert_eq!(changes.len(), 1, "expected one batch, got {changes:?}");
    changes.into_iter().next().unwrap()
}

#[test]
fn test_add_modify_delete_and_rename() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().to_path_buf();
    let (watcher, rx) = watch(fast_config(&root));
    watcher.start().unwrap();

    let a = root.join("a.txt");
    fs::write(&a, b"one").unwrap();
    let batch = single_batch(next_changes(&rx));
    assert_eq!(batch.directory(), root.as_path());
    assert_eq!(batch.len(), 1);
    assert!(batch.contains(&a, ChangeKind::Add));

    fs::write(&a, b"one and more").unwrap();
    let batch = single_batch(next_changes(&rx));
    assert_eq!(batch.len(), 1);
    assert!(batch.contains(&a, ChangeKind::Modify));

    let nested = root.join("sub/deeper");
    fs::create_dir_all(&nested).unwrap();
    let b = nested.join("b.txt");
    fs::write(&b, b"b").unwrap();
    let batch = single_batch(next_changes(&rx));
    assert_eq!(batch.len(), 1, "directories are never reported: {batch}");
    assert!(batch.contains(&b, ChangeKind::Add));

    let c = root.join("c.txt");
    fs::rename(&b, &c).unwrap();
    let batch = single_batch(next_changes(&rx));
    assert_eq!(batch.len(), 2);
    assert!(batch.contains(&b, ChangeKind::Delete));
    assert!(batch.contains(&c, ChangeKind::Add));

    fs::remove_file(&a).unwrap();
    let batch = single_batch(next_changes(&rx));
    assert_eq!(batch.len(), 1);
    assert!(batch.contains(&a, ChangeKind::Delete));

    watcher.stop();
}

#[test]
fn test_chunked_write_reported_once_after_quiet_period() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().to_path_buf();
    let config = WatcherConfig::builder()
        .directory(&root)
        .timing_ms(1000, 400)
        .build()
        .unwrap();
    let (watcher, rx) = watch(config);
    watcher.start().unwrap();

    let target = root.join("upload.bin");
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&target)
        .unwrap();
    for _ in 0..5 {
        file.write_all(&[7u8; 4096]).unwrap();
        file.flush().unwrap();
        thread::sleep(Duration::from_millis(250));
    }
    file.write_all(&[7u8; 4096]).unwrap();
    file.sync_all().unwrap();
    drop(file);
    let write_done = Instant::now();

    // Nothing may have been reported while the file was still growing
    let changes = rx.recv_timeout(WAIT).expect("write never reported");
    let reported_at = Instant::now();
    assert!(
        reported_at.duration_since(write_done) >= Duration::from_millis(350),
        "reported before a full quiet period passed"
    );

    let batch = single_batch(changes);
    assert_eq!(batch.len(), 1);
    assert!(batch.contains(&target, ChangeKind::Add));

    // The finished file is stable, so no MODIFY follows
    assert!(rx.recv_timeout(Duration::from_millis(2500)).is_err());
    watcher.stop();
}

#[test]
fn test_remaining_scans_stop_the_worker() {
    let temp_dir = TempDir::new().unwrap();
    let config = WatcherConfig::builder()
        .directory(temp_dir.path())
        .timing_ms(500, 200)
        .remaining_scans(5)
        .build()
        .unwrap();
    let watcher = FileSystemWatcher::new(config);

    let started = Instant::now();
    watcher.start().unwrap();
    assert!(watcher.is_running());

    let deadline = started + Duration::from_secs(10);
    while watcher.is_running() && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(25));
    }
    assert!(!watcher.is_running());
    assert!(started.elapsed() >= Duration::from_millis(2400));
    assert!(started.elapsed() < Duration::from_millis(4500));
}

#[test]
fn test_stop_waits_for_worker() {
    let temp_dir = TempDir::new().unwrap();
    let entered = Arc::new(AtomicBool::new(false));
    let finished = Arc::new(AtomicBool::new(false));

    let watcher = FileSystemWatcher::new(fast_config(temp_dir.path()));
    {
        let entered = Arc::clone(&entered);
        let finished = Arc::clone(&finished);
        watcher
            .add_listener(move |_: &[ChangeBatch]| -> Result<(), ListenerError> {
                entered.store(true, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(500));
                finished.store(true, Ordering::SeqCst);
                Ok(())
            })
            .unwrap();
    }
    watcher.start().unwrap();
    fs::write(temp_dir.path().join("slow.txt"), b"x").unwrap();

    let deadline = Instant::now() + WAIT;
    while !entered.load(Ordering::SeqCst) && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(10));
    }
    assert!(entered.load(Ordering::SeqCst));
    assert_eq!(watcher.phase(), ScanPhase::Committing);

    let watcher = Arc::new(watcher);
    let stopper = {
        let watcher = Arc::clone(&watcher);
        thread::spawn(move || watcher.stop())
    };
    stopper.join().unwrap();

    assert!(finished.load(Ordering::SeqCst), "stop returned before the worker exited");
    assert!(!watcher.is_running());
    assert_eq!(watcher.phase(), ScanPhase::Stopped);
}

#[test]
fn test_stop_from_listener_does_not_deadlock() {
    let temp_dir = TempDir::new().unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let slot: Arc<OnceLock<Weak<FileSystemWatcher>>> = Arc::default();

    let watcher = Arc::new(FileSystemWatcher::new(fast_config(temp_dir.path())));
    {
        let calls = Arc::clone(&calls);
        let slot = Arc::clone(&slot);
        watcher
            .add_listener(move |_: &[ChangeBatch]| -> Result<(), ListenerError> {
                if let Some(watcher) = slot.get().and_then(Weak::upgrade) {
                    watcher.stop();
                }
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .unwrap();
    }
    slot.set(Arc::downgrade(&watcher)).unwrap();
    watcher.start().unwrap();

    fs::write(temp_dir.path().join("first.txt"), b"1").unwrap();
    let deadline = Instant::now() + WAIT;
    while calls.load(Ordering::SeqCst) == 0 && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(10));
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(wait_until_stopped(&watcher));

    fs::write(temp_dir.path().join("second.txt"), b"2").unwrap();
    thread::sleep(Duration::from_millis(800));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_failing_listeners_are_isolated() {
    let temp_dir = TempDir::new().unwrap();
    let (tx, rx) = crossbeam_channel::unbounded();
    let watcher = FileSystemWatcher::new(fast_config(temp_dir.path()));

    watcher
        .add_listener(|_: &[ChangeBatch]| -> Result<(), ListenerError> {
            panic!("listener bug")
        })
        .unwrap();
    watcher
        .add_listener(|_: &[ChangeBatch]| -> Result<(), ListenerError> {
            Err(ListenerError::failed("broken", "always fails"))
        })
        .unwrap();
    watcher.add_listener(ChannelListener::new(tx)).unwrap();
    watcher.start().unwrap();

    let a = temp_dir.path().join("a");
    fs::write(&a, b"a").unwrap();
    assert!(single_batch(next_changes(&rx)).contains(&a, ChangeKind::Add));

    // The worker survived the panic and keeps scanning
    let b = temp_dir.path().join("b");
    fs::write(&b, b"b").unwrap();
    assert!(single_batch(next_changes(&rx)).contains(&b, ChangeKind::Add));
    assert!(watcher.is_running());
    watcher.stop();
}

#[test]
fn test_initial_predicate_filters_reports() {
    let temp_dir = TempDir::new().unwrap();
    let (watcher, rx) = watch(fast_config(temp_dir.path()));
    watcher.set_predicate(Arc::new(|path: &Path| {
        path.extension().is_some_and(|ext| ext == "csv")
    }));
    watcher.start().unwrap();

    fs::write(temp_dir.path().join("ignored.txt"), b"x").unwrap();
    let csv = temp_dir.path().join("data.csv");
    fs::write(&csv, b"1,2").unwrap();

    let batch = single_batch(next_changes(&rx));
    assert_eq!(batch.len(), 1);
    assert!(batch.contains(&csv, ChangeKind::Add));
    watcher.stop();
}

#[test]
fn test_runtime_predicate_and_timing_swap() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    let (watcher, rx) = watch(fast_config(root));
    watcher.start().unwrap();

    let first = root.join("first.txt");
    fs::write(&first, b"1").unwrap();
    assert!(single_batch(next_changes(&rx)).contains(&first, ChangeKind::Add));

    watcher.set_predicate(Arc::new(SuffixFilter::new(["csv"]).unwrap()));
    // Let the cycle that read the old predicate finish
    thread::sleep(Duration::from_millis(500));

    let excluded = root.join("second.txt");
    let included = root.join("second.csv");
    fs::write(&excluded, b"2").unwrap();
    fs::write(&included, b"2").unwrap();
    let batch = single_batch(next_changes(&rx));
    assert_eq!(batch.len(), 1, "only the csv file may be reported: {batch}");
    assert!(batch.contains(&included, ChangeKind::Add));

    // Two cycles at the new spacing instead of 200ms each
    watcher
        .set_timing(Duration::from_millis(1000), Duration::from_millis(100))
        .unwrap();
    let swapped = Instant::now();
    watcher.set_remaining_scans(2).unwrap();
    assert!(wait_until_stopped(&watcher));
    let elapsed = swapped.elapsed();
    assert!(elapsed >= Duration::from_millis(1900), "cycles too short: {elapsed:?}");
    assert!(elapsed < Duration::from_millis(4500), "cycles too long: {elapsed:?}");
}

#[test]
fn test_graceful_stop_finishes_counted_cycles() {
    let temp_dir = TempDir::new().unwrap();
    let config = WatcherConfig::builder()
        .directory(temp_dir.path())
        .timing_ms(300, 100)
        .build()
        .unwrap();
    let (watcher, rx) = watch(config);
    watcher.start().unwrap();

    let late = temp_dir.path().join("late.txt");
    let elapsed = thread::scope(|scope| {
        let stopper = scope.spawn(|| {
            let asked = Instant::now();
            watcher.stop_after(2);
            asked.elapsed()
        });
        thread::sleep(Duration::from_millis(30));
        fs::write(&late, b"late").unwrap();

        // Still a single worker while it winds down
        assert!(watcher.is_running());
        assert!(matches!(watcher.start(), Err(WatchError::AlreadyStarted)));
        stopper.join().unwrap()
    });

    assert!(single_batch(next_changes(&rx)).contains(&late, ChangeKind::Add));
    assert!(elapsed >= Duration::from_millis(550), "returned early: {elapsed:?}");
    assert!(elapsed < Duration::from_millis(3000), "returned late: {elapsed:?}");
    assert!(!watcher.is_running());
    assert_eq!(watcher.phase(), ScanPhase::Stopped);
    assert!(rx.try_recv().is_err());
}

#[test]
fn test_multiple_roots_report_separate_batches() {
    let first = TempDir::new().unwrap();
    let second = TempDir::new().unwrap();
    let config = WatcherConfig::builder()
        .directories([first.path(), second.path()])
        .timing_ms(300, 150)
        .build()
        .unwrap();
    let (watcher, rx) = watch(config);
    watcher.start().unwrap();

    fs::write(first.path().join("one"), b"1").unwrap();
    fs::write(second.path().join("two"), b"2").unwrap();

    let mut seen = Vec::new();
    let deadline = Instant::now() + WAIT;
    while seen.len() < 2 && Instant::now() < deadline {
        if let Ok(changes) = rx.recv_timeout(Duration::from_millis(100)) {
            seen.extend(changes);
        }
    }
    assert_eq!(seen.len(), 2);
    assert!(seen.iter().any(|b| b.directory() == first.path()));
    assert!(seen.iter().any(|b| b.directory() == second.path()));
    watcher.stop();
}

#[test]
fn test_restart_uses_persisted_state() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().join("watched");
    fs::create_dir(&root).unwrap();
    let snapshot = temp_dir.path().join("state.snapshot");

    let config = WatcherConfig::builder()
        .directory(&root)
        .timing_ms(200, 50)
        .snapshot_file(&snapshot)
        .strict(false)
        .build()
        .unwrap();

    let a = root.join("a.txt");
    {
        let (watcher, rx) = watch(config.clone());
        watcher.start().unwrap();
        fs::write(&a, b"a").unwrap();
        assert!(single_batch(next_changes(&rx)).contains(&a, ChangeKind::Add));
        watcher.stop();
    }
    assert!(snapshot.exists());

    // Changes made while nothing was watching
    let b = root.join("b.txt");
    fs::write(&b, b"b").unwrap();
    fs::remove_file(&a).unwrap();

    let (watcher, rx) = watch(config);
    watcher.start().unwrap();
    let batch = single_batch(next_changes(&rx));
    assert_eq!(batch.len(), 2);
    assert!(batch.contains(&a, ChangeKind::Delete));
    assert!(batch.contains(&b, ChangeKind::Add));
    watcher.stop();
}

#[test]
fn test_memory_repository_survives_restart() {
    let temp_dir = TempDir::new().unwrap();
    let (tx, rx) = crossbeam_channel::unbounded();
    let watcher = FileSystemWatcher::with_repository(
        fast_config(temp_dir.path()),
        Arc::new(MemoryRepository::new()),
    );
    watcher.add_listener(ChannelListener::new(tx)).unwrap();

    watcher.start().unwrap();
    let a = temp_dir.path().join("a");
    fs::write(&a, b"a").unwrap();
    assert!(single_batch(next_changes(&rx)).contains(&a, ChangeKind::Add));
    watcher.stop();

    fs::write(&a, b"longer").unwrap();
    watcher.start().unwrap();
    assert!(single_batch(next_changes(&rx)).contains(&a, ChangeKind::Modify));
    watcher.stop();
}

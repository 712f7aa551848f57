use std::fs;
use std::path::Path;
use std::process::{Command, Output, Stdio};
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

fn pollwatch(dir: &Path, args: &[&str]) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_pollwatch"));
    cmd.current_dir(dir).args(args);
    cmd
}

fn run(dir: &Path, args: &[&str]) -> Output {
    pollwatch(dir, args).output().unwrap()
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn test_init_creates_settings_once() {
    let temp_dir = TempDir::new().unwrap();

    let first = run(temp_dir.path(), &["init"]);
    assert!(first.status.success());
    assert!(stdout(&first).contains("Created configuration file at:"));
    let settings_file = temp_dir.path().join(".pollwatch/settings.toml");
    assert!(settings_file.is_file());

    let second = run(temp_dir.path(), &["init"]);
    assert!(!second.status.success());
    assert!(String::from_utf8_lossy(&second.stderr).contains("--force"));

    let forced = run(temp_dir.path(), &["init", "--force"]);
    assert!(forced.status.success());
}

#[test]
fn test_config_shows_file_values() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("custom.toml");
    fs::write(
        &config_path,
        "[watcher]\ndirectories = [\"/srv/inbox\"]\npoll_interval_ms = 777\n",
    )
    .unwrap();

    let output = run(
        temp_dir.path(),
        &["--config", config_path.to_str().unwrap(), "config"],
    );
    assert!(output.status.success());
    let shown = stdout(&output);
    assert!(shown.contains("poll_interval_ms = 777"));
    assert!(shown.contains("/srv/inbox"));
    assert!(shown.contains("quiet_period_ms = 400"));
}

#[test]
fn test_watch_reports_changes_and_persists() {
    let temp_dir = TempDir::new().unwrap();
    let watched = temp_dir.path().join("inbox");
    fs::create_dir(&watched).unwrap();
    let watched_arg = watched.to_str().unwrap();
    let args = [
        "watch",
        watched_arg,
        "--snapshot",
        "state.snapshot",
        "--poll-ms",
        "200",
        "--quiet-ms",
        "50",
    ];

    // First run: a file appears while the watcher is running
    let child = pollwatch(temp_dir.path(), &args)
        .args(["--scans", "12"])
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();
    thread::sleep(Duration::from_millis(600));
    fs::write(watched.join("first.txt"), b"one").unwrap();
    let output = child.wait_with_output().unwrap();

    assert!(output.status.success());
    let first_path = watched.join("first.txt");
    assert!(stdout(&output).contains(&format!("ADD\t{}", first_path.display())));
    let snapshot = temp_dir.path().join("state.snapshot");
    assert!(fs::metadata(&snapshot).unwrap().len() > 0);

    // Second run: changes made while stopped are reported against the saved state
    fs::write(watched.join("second.txt"), b"two").unwrap();
    fs::remove_file(&first_path).unwrap();
    let output = pollwatch(temp_dir.path(), &args)
        .args(["--scans", "1"])
        .output()
        .unwrap();

    assert!(output.status.success());
    let shown = stdout(&output);
    assert!(shown.contains(&format!("ADD\t{}", watched.join("second.txt").display())));
    assert!(shown.contains(&format!("DELETE\t{}", first_path.display())));

    let inspected = run(temp_dir.path(), &["inspect", "state.snapshot", "--files"]);
    assert!(inspected.status.success());
    let shown = stdout(&inspected);
    assert!(shown.starts_with("format 1.0, 1 directories, 1 files"));
    assert!(shown.contains("second.txt\t3 bytes"));
}

#[test]
fn test_inspect_leaves_corrupt_file() {
    let temp_dir = TempDir::new().unwrap();
    let snapshot = temp_dir.path().join("broken.snapshot");
    fs::write(&snapshot, b"\x00\x03\x31\x2e\x30\x00").unwrap();

    let output = run(temp_dir.path(), &["inspect", "broken.snapshot"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Cannot read snapshot"));
    assert!(snapshot.exists());
}

#[test]
fn test_watch_missing_directory_fails() {
    let temp_dir = TempDir::new().unwrap();
    let output = run(temp_dir.path(), &["watch", "does-not-exist", "--scans", "1"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Invalid watcher configuration"));
}

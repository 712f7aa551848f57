//! Configuration for the polling watcher.
//!
//! Settings are layered the same way for the library and the binary:
//! - Default values
//! - TOML configuration file (`.pollwatch/settings.toml`)
//! - Environment variable overrides
//! - CLI argument overrides (applied by the binary)
//!
//! # Environment Variables
//!
//! Environment variables must be prefixed with `POLLWATCH_` and use double
//! underscores to separate nested levels:
//! - `POLLWATCH_WATCHER__POLL_INTERVAL_MS=2000` sets `watcher.poll_interval_ms`
//! - `POLLWATCH_WATCHER__SNAPSHOT__ENABLED=true` sets `watcher.snapshot.enabled`
//! - `POLLWATCH_LOGGING__DEFAULT=debug` sets `logging.default`
//!
//! [`Settings`] is the raw, serializable form. [`WatcherConfig`] is the
//! validated form the watcher is built from.

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::filter::{MatchPredicate, MatchingStrategy, build_predicate};
use crate::storage::DEFAULT_SNAPSHOT_FILE;

const CONFIG_DIR: &str = ".pollwatch";
const CONFIG_FILE: &str = "settings.toml";
const ENV_PREFIX: &str = "POLLWATCH_";

/// Rejected configuration. The watcher is never started with one of these.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("No directories to watch")]
    EmptyWatchList,

    #[error("Watched directory does not exist: {path}")]
    MissingDirectory { path: PathBuf },

    #[error("Watched path is not a directory: {path}")]
    NotADirectory { path: PathBuf },

    #[error("Watched directory is a symbolic link (not allowed in strict mode): {path}")]
    SymlinkedDirectory { path: PathBuf },

    #[error("Directory is listed more than once: {path}")]
    DuplicateDirectory { path: PathBuf },

    #[error("Cannot resolve {path}: {source}")]
    Unresolvable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{name} must be positive")]
    ZeroDuration { name: &'static str },

    #[error("Poll interval ({poll:?}) must be greater than quiet period ({quiet:?})")]
    PollNotAboveQuiet { poll: Duration, quiet: Duration },

    #[error("Remaining scans must be -1 (forever) or non-negative, got {value}")]
    InvalidRemainingScans { value: i64 },

    #[error("Invalid snapshot file {path}: {reason}")]
    InvalidSnapshotPath { path: PathBuf, reason: &'static str },

    #[error("Invalid thread name: {reason}")]
    InvalidThreadName { reason: &'static str },

    #[error("Invalid filter: {reason}")]
    InvalidFilter { reason: String },
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Settings {
    /// Version of the configuration schema
    #[serde(default = "default_version")]
    pub version: u32,

    /// Log levels
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Watcher configuration
    #[serde(default)]
    pub watcher: WatcherSettings,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct LoggingConfig {
    /// Level used when no module override matches
    #[serde(default = "default_log_level")]
    pub default: String,

    /// Per-target level overrides, e.g. `pollwatch::watcher = "debug"`
    #[serde(default)]
    pub modules: HashMap<String, String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct WatcherSettings {
    /// Roots to watch, relative paths resolve against the working directory
    #[serde(default)]
    pub directories: Vec<PathBuf>,

    /// Target time between the starts of two scan cycles
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// How long a directory must stay unchanged before a scan is trusted
    #[serde(default = "default_quiet_period_ms")]
    pub quiet_period_ms: u64,

    /// Number of cycles to run, -1 for no limit
    #[serde(default = "default_remaining_scans")]
    pub remaining_scans: i64,

    /// Name of the scan thread
    #[serde(default = "default_thread_name")]
    pub thread_name: String,

    /// Reject symlinked roots and require the snapshot file to exist
    #[serde(default = "default_true")]
    pub strict: bool,

    #[serde(default)]
    pub snapshot: SnapshotSettings,

    #[serde(default)]
    pub filter: FilterSettings,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SnapshotSettings {
    /// Persist the committed state between runs
    #[serde(default = "default_false")]
    pub enabled: bool,

    /// Snapshot file location
    #[serde(default = "default_snapshot_path")]
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct FilterSettings {
    /// How `patterns` are interpreted
    #[serde(default)]
    pub strategy: MatchingStrategy,

    /// Suffixes or regular expressions, depending on `strategy`
    #[serde(default)]
    pub patterns: Vec<String>,
}

// Default value functions
fn default_version() -> u32 {
    1
}
fn default_log_level() -> String {
    "warn".to_string()
}
fn default_poll_interval_ms() -> u64 {
    1000
}
fn default_quiet_period_ms() -> u64 {
    400
}
fn default_remaining_scans() -> i64 {
    -1
}
fn default_thread_name() -> String {
    "pollwatch".to_string()
}
fn default_snapshot_path() -> PathBuf {
    PathBuf::from(DEFAULT_SNAPSHOT_FILE)
}
fn default_true() -> bool {
    true
}
fn default_false() -> bool {
    false
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            logging: LoggingConfig::default(),
            watcher: WatcherSettings::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default: default_log_level(),
            modules: HashMap::new(),
        }
    }
}

impl Default for WatcherSettings {
    fn default() -> Self {
        Self {
            directories: Vec::new(),
            poll_interval_ms: default_poll_interval_ms(),
            quiet_period_ms: default_quiet_period_ms(),
            remaining_scans: default_remaining_scans(),
            thread_name: default_thread_name(),
            strict: true,
            snapshot: SnapshotSettings::default(),
            filter: FilterSettings::default(),
        }
    }
}

impl Default for SnapshotSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            path: default_snapshot_path(),
        }
    }
}

impl Settings {
    /// Load configuration from all sources
    pub fn load() -> Result<Self, Box<figment::Error>> {
        let config_path = Self::find_workspace_config()
            .unwrap_or_else(|| Path::new(CONFIG_DIR).join(CONFIG_FILE));
        Self::load_from(config_path)
    }

    /// Load configuration from a specific file, still honoring environment overrides
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, Box<figment::Error>> {
        Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path.as_ref()))
            // Double underscore separates nested levels, single underscores
            // stay inside field names
            .merge(Env::prefixed(ENV_PREFIX).map(|key| {
                key.as_str().to_lowercase().replace("__", ".").into()
            }))
            .extract()
            .map_err(Box::new)
    }

    /// Find `.pollwatch/settings.toml` from the current directory upwards
    fn find_workspace_config() -> Option<PathBuf> {
        Self::workspace_root().map(|root| root.join(CONFIG_DIR).join(CONFIG_FILE))
    }

    /// Get the workspace root directory (where .pollwatch is located)
    pub fn workspace_root() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;

        current
            .ancestors()
            .find(|ancestor| ancestor.join(CONFIG_DIR).is_dir())
            .map(Path::to_path_buf)
    }

    /// Save current configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), Box<dyn std::error::Error>> {
        let parent = path.as_ref().parent().ok_or("Invalid path")?;
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }

        let toml_string = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_string)?;

        Ok(())
    }

    /// Create a default settings file in the current directory
    pub fn init_config_file(force: bool) -> Result<PathBuf, Box<dyn std::error::Error>> {
        let config_path = Path::new(CONFIG_DIR).join(CONFIG_FILE);

        if !force && config_path.exists() {
            return Err("Configuration file already exists. Use --force to overwrite".into());
        }

        let mut settings = Settings::default();
        settings.watcher.directories = vec![PathBuf::from(".")];
        settings.save(&config_path)?;

        Ok(config_path)
    }
}

/// Poll interval and quiet period, validated as a pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    poll_interval: Duration,
    quiet_period: Duration,
}

impl Timing {
    pub fn new(poll_interval: Duration, quiet_period: Duration) -> Result<Self, ConfigError> {
        if poll_interval.is_zero() {
            return Err(ConfigError::ZeroDuration {
                name: "poll interval",
            });
        }
        if quiet_period.is_zero() {
            return Err(ConfigError::ZeroDuration {
                name: "quiet period",
            });
        }
        if poll_interval <= quiet_period {
            return Err(ConfigError::PollNotAboveQuiet {
                poll: poll_interval,
                quiet: quiet_period,
            });
        }
        Ok(Self {
            poll_interval,
            quiet_period,
        })
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn quiet_period(&self) -> Duration {
        self.quiet_period
    }

    /// Time spent sleeping before each stabilization probe starts.
    pub fn idle_wait(&self) -> Duration {
        self.poll_interval - self.quiet_period
    }
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(default_poll_interval_ms()),
            quiet_period: Duration::from_millis(default_quiet_period_ms()),
        }
    }
}

/// Validated watcher configuration.
#[derive(Clone)]
pub struct WatcherConfig {
    directories: Vec<PathBuf>,
    timing: Timing,
    remaining_scans: i64,
    thread_name: String,
    snapshot_file: Option<PathBuf>,
    predicate: Arc<dyn MatchPredicate>,
}

impl WatcherConfig {
    pub fn builder() -> WatcherConfigBuilder {
        WatcherConfigBuilder::default()
    }

    /// Validate loaded settings.
    pub fn from_settings(settings: &WatcherSettings) -> Result<Self, ConfigError> {
        let mut builder = Self::builder()
            .directories(settings.directories.iter().cloned())
            .timing_ms(settings.poll_interval_ms, settings.quiet_period_ms)
            .remaining_scans(settings.remaining_scans)
            .thread_name(settings.thread_name.clone())
            .strict(settings.strict)
            .filter(settings.filter.clone());
        if settings.snapshot.enabled {
            builder = builder.snapshot_file(settings.snapshot.path.clone());
        }
        builder.build()
    }

    /// Absolute watched roots, in configuration order.
    pub fn directories(&self) -> &[PathBuf] {
        &self.directories
    }

    pub fn timing(&self) -> Timing {
        self.timing
    }

    pub fn remaining_scans(&self) -> i64 {
        self.remaining_scans
    }

    pub fn thread_name(&self) -> &str {
        &self.thread_name
    }

    /// Durable snapshot location, `None` when persistence is off.
    pub fn snapshot_file(&self) -> Option<&Path> {
        self.snapshot_file.as_deref()
    }

    pub fn predicate(&self) -> &Arc<dyn MatchPredicate> {
        &self.predicate
    }
}

impl fmt::Debug for WatcherConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatcherConfig")
            .field("directories", &self.directories)
            .field("timing", &self.timing)
            .field("remaining_scans", &self.remaining_scans)
            .field("thread_name", &self.thread_name)
            .field("snapshot_file", &self.snapshot_file)
            .finish_non_exhaustive()
    }
}

enum PredicateSource {
    Filter(FilterSettings),
    Custom(Arc<dyn MatchPredicate>),
}

/// Builder for [`WatcherConfig`]. Nothing is checked until [`build`](Self::build).
pub struct WatcherConfigBuilder {
    directories: Vec<PathBuf>,
    poll_interval: Duration,
    quiet_period: Duration,
    remaining_scans: i64,
    thread_name: String,
    strict: bool,
    snapshot_file: Option<PathBuf>,
    predicate: PredicateSource,
}

impl Default for WatcherConfigBuilder {
    fn default() -> Self {
        let timing = Timing::default();
        Self {
            directories: Vec::new(),
            poll_interval: timing.poll_interval(),
            quiet_period: timing.quiet_period(),
            remaining_scans: default_remaining_scans(),
            thread_name: default_thread_name(),
            strict: true,
            snapshot_file: None,
            predicate: PredicateSource::Filter(FilterSettings::default()),
        }
    }
}

impl WatcherConfigBuilder {
    pub fn directory(mut self, path: impl Into<PathBuf>) -> Self {
        self.directories.push(path.into());
        self
    }

    pub fn directories<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.directories.extend(paths.into_iter().map(Into::into));
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn quiet_period(mut self, period: Duration) -> Self {
        self.quiet_period = period;
        self
    }

    pub fn timing_ms(self, poll_ms: u64, quiet_ms: u64) -> Self {
        self.poll_interval(Duration::from_millis(poll_ms))
            .quiet_period(Duration::from_millis(quiet_ms))
    }

    pub fn remaining_scans(mut self, scans: i64) -> Self {
        self.remaining_scans = scans;
        self
    }

    pub fn thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn snapshot_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.snapshot_file = Some(path.into());
        self
    }

    /// Select a predicate from filter settings. Replaces any earlier predicate.
    pub fn filter(mut self, settings: FilterSettings) -> Self {
        self.predicate = PredicateSource::Filter(settings);
        self
    }

    /// Use a caller-supplied predicate. Replaces any earlier filter.
    pub fn predicate(mut self, predicate: Arc<dyn MatchPredicate>) -> Self {
        self.predicate = PredicateSource::Custom(predicate);
        self
    }

    pub fn build(self) -> Result<WatcherConfig, ConfigError> {
        if self.directories.is_empty() {
            return Err(ConfigError::EmptyWatchList);
        }
        let mut directories: Vec<PathBuf> = Vec::with_capacity(self.directories.len());
        for raw in &self.directories {
            let dir = validate_directory(raw, self.strict)?;
            if directories.contains(&dir) {
                return Err(ConfigError::DuplicateDirectory { path: dir });
            }
            directories.push(dir);
        }

        let timing = Timing::new(self.poll_interval, self.quiet_period)?;

        if self.remaining_scans < -1 {
            return Err(ConfigError::InvalidRemainingScans {
                value: self.remaining_scans,
            });
        }

        if self.thread_name.contains('\0') {
            return Err(ConfigError::InvalidThreadName {
                reason: "contains a NUL byte",
            });
        }

        let snapshot_file = self
            .snapshot_file
            .as_deref()
            .map(|path| validate_snapshot_file(path, self.strict))
            .transpose()?;

        let predicate = match self.predicate {
            PredicateSource::Filter(settings) => build_predicate(&settings)?,
            PredicateSource::Custom(predicate) => predicate,
        };

        Ok(WatcherConfig {
            directories,
            timing,
            remaining_scans: self.remaining_scans,
            thread_name: self.thread_name,
            snapshot_file,
            predicate,
        })
    }
}

fn absolute(path: &Path) -> Result<PathBuf, ConfigError> {
    std::path::absolute(path).map_err(|source| ConfigError::Unresolvable {
        path: path.to_path_buf(),
        source,
    })
}

fn validate_directory(raw: &Path, strict: bool) -> Result<PathBuf, ConfigError> {
    let path = absolute(raw)?;
    let link_meta = match std::fs::symlink_metadata(&path) {
        Ok(meta) => meta,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ConfigError::MissingDirectory { path });
        }
        Err(source) => return Err(ConfigError::Unresolvable { path, source }),
    };
    if link_meta.file_type().is_symlink() {
        if strict {
            return Err(ConfigError::SymlinkedDirectory { path });
        }
        if !path.is_dir() {
            return Err(ConfigError::NotADirectory { path });
        }
    } else if !link_meta.is_dir() {
        return Err(ConfigError::NotADirectory { path });
    }
    Ok(path)
}

fn validate_snapshot_file(raw: &Path, strict: bool) -> Result<PathBuf, ConfigError> {
    let path = absolute(raw)?;
    match std::fs::symlink_metadata(&path) {
        Ok(meta) if meta.file_type().is_symlink() && strict => {
            Err(ConfigError::InvalidSnapshotPath {
                path,
                reason: "is a symbolic link",
            })
        }
        Ok(_) if path.is_dir() => Err(ConfigError::InvalidSnapshotPath {
            path,
            reason: "is a directory",
        }),
        Ok(meta) if strict && !meta.is_file() => Err(ConfigError::InvalidSnapshotPath {
            path,
            reason: "is not a regular file",
        }),
        Ok(_) => Ok(path),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound && !strict => Ok(path),
        Err(_) => Err(ConfigError::InvalidSnapshotPath {
            path,
            reason: "does not exist (create it, or disable strict mode)",
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.version, 1);
        assert_eq!(settings.logging.default, "warn");
        assert_eq!(settings.watcher.poll_interval_ms, 1000);
        assert_eq!(settings.watcher.quiet_period_ms, 400);
        assert_eq!(settings.watcher.remaining_scans, -1);
        assert!(settings.watcher.strict);
        assert!(!settings.watcher.snapshot.enabled);
        assert_eq!(
            settings.watcher.snapshot.path,
            PathBuf::from("pollwatch.snapshot")
        );
        assert_eq!(settings.watcher.filter.strategy, MatchingStrategy::Any);
    }

    #[test]
    fn test_load_from_toml() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("settings.toml");

        let toml_content = r#"
version = 2

[logging]
default = "info"

[watcher]
directories = ["/srv/inbox", "/srv/outbox"]
poll_interval_ms = 5000
quiet_period_ms = 1500
remaining_scans = 3
thread_name = "inbox-scan"

[watcher.snapshot]
enabled = true
path = "/var/lib/pollwatch/state"

[watcher.filter]
strategy = "suffix"
patterns = ["csv", "json"]
"#;

        fs::write(&config_path, toml_content).unwrap();

        let settings = Settings::load_from(&config_path).unwrap();
        assert_eq!(settings.version, 2);
        assert_eq!(settings.logging.default, "info");
        assert_eq!(
            settings.watcher.directories,
            vec![PathBuf::from("/srv/inbox"), PathBuf::from("/srv/outbox")]
        );
        assert_eq!(settings.watcher.poll_interval_ms, 5000);
        assert_eq!(settings.watcher.quiet_period_ms, 1500);
        assert_eq!(settings.watcher.remaining_scans, 3);
        assert_eq!(settings.watcher.thread_name, "inbox-scan");
        assert!(settings.watcher.snapshot.enabled);
        assert_eq!(settings.watcher.filter.strategy, MatchingStrategy::Suffix);
        assert_eq!(settings.watcher.filter.patterns, vec!["csv", "json"]);
        // Untouched values keep their defaults
        assert!(settings.watcher.strict);
    }

    #[test]
    fn test_save_settings() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nested/settings.toml");

        let mut settings = Settings::default();
        settings.watcher.directories = vec![PathBuf::from("/data")];
        settings.watcher.quiet_period_ms = 250;
        settings
            .logging
            .modules
            .insert("pollwatch::watcher".to_string(), "debug".to_string());

        settings.save(&config_path).unwrap();

        let loaded = Settings::load_from(&config_path).unwrap();
        assert_eq!(loaded, settings);
    }

    #[test]
    fn test_partial_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("settings.toml");

        fs::write(&config_path, "[watcher]\nquiet_period_ms = 100\n").unwrap();

        let settings = Settings::load_from(&config_path).unwrap();
        assert_eq!(settings.watcher.quiet_period_ms, 100);
        assert_eq!(settings.watcher.poll_interval_ms, 1000);
        assert_eq!(settings.version, 1);
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let settings = Settings::load_from(temp_dir.path().join("absent.toml")).unwrap();
        assert_eq!(settings.watcher, WatcherSettings::default());
    }

    #[test]
    fn test_timing_validation() {
        let ms = Duration::from_millis;
        let timing = Timing::new(ms(1000), ms(400)).unwrap();
        assert_eq!(timing.idle_wait(), ms(600));
        assert_eq!(timing, Timing::default());

        assert!(matches!(
            Timing::new(ms(0), ms(400)),
            Err(ConfigError::ZeroDuration { .. })
        ));
        assert!(matches!(
            Timing::new(ms(1000), ms(0)),
            Err(ConfigError::ZeroDuration { .. })
        ));
        assert!(matches!(
            Timing::new(ms(400), ms(400)),
            Err(ConfigError::PollNotAboveQuiet { .. })
        ));
    }

    #[test]
    fn test_builder_resolves_directories() {
        let temp_dir = TempDir::new().unwrap();
        let config = WatcherConfig::builder()
            .directory(temp_dir.path())
            .build()
            .unwrap();
        assert_eq!(config.directories(), &[temp_dir.path().to_path_buf()]);
        assert_eq!(config.remaining_scans(), -1);
        assert_eq!(config.thread_name(), "pollwatch");
        assert!(config.snapshot_file().is_none());
        assert!(config.predicate().accept(Path::new("anything")));
    }

    #[test]
    fn test_builder_rejects_bad_directories() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("plain.txt");
        fs::write(&file, b"x").unwrap();

        assert!(matches!(
            WatcherConfig::builder().build(),
            Err(ConfigError::EmptyWatchList)
        ));
        assert!(matches!(
            WatcherConfig::builder()
                .directory(temp_dir.path().join("missing"))
                .build(),
            Err(ConfigError::MissingDirectory { .. })
        ));
        assert!(matches!(
            WatcherConfig::builder().directory(&file).build(),
            Err(ConfigError::NotADirectory { .. })
        ));
        assert!(matches!(
            WatcherConfig::builder()
                .directory(temp_dir.path())
                .directory(temp_dir.path())
                .build(),
            Err(ConfigError::DuplicateDirectory { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_root_needs_lenient_mode() {
        let temp_dir = TempDir::new().unwrap();
        let real = temp_dir.path().join("real");
        fs::create_dir(&real).unwrap();
        let link = temp_dir.path().join("link");
        std::os::unix::fs::symlink(&real, &link).unwrap();

        assert!(matches!(
            WatcherConfig::builder().directory(&link).build(),
            Err(ConfigError::SymlinkedDirectory { .. })
        ));
        let config = WatcherConfig::builder()
            .directory(&link)
            .strict(false)
            .build()
            .unwrap();
        assert_eq!(config.directories(), &[link]);
    }

    #[test]
    fn test_remaining_scans_bounds() {
        let temp_dir = TempDir::new().unwrap();
        for ok in [-1, 0, 1, 500] {
            let config = WatcherConfig::builder()
                .directory(temp_dir.path())
                .remaining_scans(ok)
                .build()
                .unwrap();
            assert_eq!(config.remaining_scans(), ok);
        }
        assert!(matches!(
            WatcherConfig::builder()
                .directory(temp_dir.path())
                .remaining_scans(-2)
                .build(),
            Err(ConfigError::InvalidRemainingScans { value: -2 })
        ));
    }

    #[test]
    fn test_snapshot_file_strict_and_lenient() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("state.snapshot");

        assert!(matches!(
            WatcherConfig::builder()
                .directory(temp_dir.path())
                .snapshot_file(&missing)
                .build(),
            Err(ConfigError::InvalidSnapshotPath { .. })
        ));

        let lenient = WatcherConfig::builder()
            .directory(temp_dir.path())
            .snapshot_file(&missing)
            .strict(false)
            .build()
            .unwrap();
        assert_eq!(lenient.snapshot_file(), Some(missing.as_path()));

        fs::write(&missing, b"").unwrap();
        let strict = WatcherConfig::builder()
            .directory(temp_dir.path())
            .snapshot_file(&missing)
            .build()
            .unwrap();
        assert_eq!(strict.snapshot_file(), Some(missing.as_path()));

        assert!(matches!(
            WatcherConfig::builder()
                .directory(temp_dir.path())
                .snapshot_file(temp_dir.path())
                .strict(false)
                .build(),
            Err(ConfigError::InvalidSnapshotPath { .. })
        ));
    }

    #[test]
    fn test_from_settings() {
        let temp_dir = TempDir::new().unwrap();
        let mut settings = WatcherSettings {
            directories: vec![temp_dir.path().to_path_buf()],
            poll_interval_ms: 300,
            quiet_period_ms: 100,
            remaining_scans: 2,
            ..WatcherSettings::default()
        };
        settings.filter = FilterSettings {
            strategy: MatchingStrategy::Regex,
            patterns: vec![r".*\.log".to_string()],
        };

        let config = WatcherConfig::from_settings(&settings).unwrap();
        assert_eq!(config.timing().poll_interval(), Duration::from_millis(300));
        assert_eq!(config.timing().quiet_period(), Duration::from_millis(100));
        assert_eq!(config.remaining_scans(), 2);
        assert!(config.predicate().accept(Path::new("/x/app.log")));
        assert!(!config.predicate().accept(Path::new("/x/app.txt")));
        // Snapshot path is ignored while persistence is disabled
        assert!(config.snapshot_file().is_none());

        settings.filter.patterns.clear();
        assert!(matches!(
            WatcherConfig::from_settings(&settings),
            Err(ConfigError::InvalidFilter { .. })
        ));
    }
}

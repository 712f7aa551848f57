//! Logging setup and event macros.
//!
//! Events carry a component tag (`[scan]`, `[snapshot]`, `[listener]`) so the
//! output of a long-running watcher can be grepped per concern. Levels come
//! from the `[logging]` settings table:
//!
//! ```toml
//! [logging]
//! default = "warn"               # quiet by default
//!
//! [logging.modules]
//! "pollwatch::watcher" = "debug" # every scan cycle
//! ```
//!
//! `RUST_LOG` takes precedence over the settings file:
//! ```bash
//! RUST_LOG=info pollwatch watch ./inbox
//! RUST_LOG=pollwatch::storage=debug pollwatch watch --snapshot state.bin ./inbox
//! ```

use std::sync::Once;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::config::LoggingConfig;

static INIT: Once = Once::new();

/// Compact time format: HH:MM:SS.mmm
struct CompactTime;

impl FormatTime for CompactTime {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", chrono::Local::now().format("%H:%M:%S%.3f"))
    }
}

/// Filter directives for `config`: the default level followed by one
/// `target=level` entry per module, sorted so the result is stable.
pub fn filter_directives(config: &LoggingConfig) -> String {
    let mut modules: Vec<_> = config.modules.iter().collect();
    modules.sort();
    modules
        .into_iter()
        .fold(config.default.clone(), |mut directives, (module, level)| {
            directives.push_str(&format!(",{module}={level}"));
            directives
        })
}

/// Install the global subscriber.
///
/// Only the first call has an effect, so both the binary and tests may call
/// it freely. The `RUST_LOG` environment variable overrides `config`.
pub fn init_with_config(config: &LoggingConfig) {
    INIT.call_once(|| {
        let filter = if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            EnvFilter::new(filter_directives(config))
        };

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_names(true)
            .with_timer(CompactTime)
            .with_level(true)
            .with_writer(std::io::stderr)
            .with_filter(filter);

        // Another subscriber may already be installed when embedded
        if tracing_subscriber::registry().with(fmt_layer).try_init().is_err() {
            tracing::debug!("[logging] global subscriber already set");
        }
    });
}

/// Initialize logging with `LoggingConfig::default()` (`warn`).
pub fn init() {
    init_with_config(&LoggingConfig::default());
}

/// Log an event with component context.
///
/// # Examples
/// ```ignore
/// log_event!("scan", "committed", "{} changes", count);
/// log_event!("watcher", "started");
/// ```
#[macro_export]
macro_rules! log_event {
    ($component:expr, $event:expr) => {
        tracing::info!("[{}] {}", $component, $event)
    };
    ($component:expr, $event:expr, $($arg:tt)*) => {
        tracing::info!("[{}] {}: {}", $component, $event, format!($($arg)*))
    };
}

/// Debug-only event logging.
///
/// # Examples
/// ```ignore
/// debug_event!("scan", "probe", "{} unstable", root.display());
/// ```
#[macro_export]
macro_rules! debug_event {
    ($component:expr, $event:expr) => {
        tracing::debug!("[{}] {}", $component, $event)
    };
    ($component:expr, $event:expr, $($arg:tt)*) => {
        tracing::debug!("[{}] {}: {}", $component, $event, format!($($arg)*))
    };
}

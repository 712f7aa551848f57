//! CLI argument parsing using clap.

use clap::{
    Args, Parser, Subcommand,
    builder::styling::{AnsiColor, Effects, Styles},
};
use std::path::PathBuf;

fn clap_cargo_style() -> Styles {
    Styles::styled()
        .header(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::Green.on_default())
}

/// Polling file watcher
#[derive(Parser, Debug)]
#[command(
    name = "pollwatch",
    version = env!("CARGO_PKG_VERSION"),
    about = "Polling file watcher",
    long_about = "Report added, modified and deleted files under a set of directories by periodic polling.",
    next_line_help = true,
    styles = clap_cargo_style()
)]
pub struct Cli {
    /// Path to custom settings.toml file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create .pollwatch/settings.toml in the current directory
    Init {
        /// Force overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Show current configuration settings
    Config,

    /// Watch directories and print every change
    Watch(WatchArgs),

    /// Decode a snapshot file without modifying it
    Inspect {
        /// Snapshot file to read
        file: PathBuf,

        /// List every recorded file
        #[arg(long)]
        files: bool,
    },
}

/// Overrides applied on top of the loaded settings.
#[derive(Args, Debug, Default)]
pub struct WatchArgs {
    /// Directories to watch (replace the configured list)
    #[arg(value_name = "DIR")]
    pub directories: Vec<PathBuf>,

    /// Poll interval in milliseconds
    #[arg(long, value_name = "MS")]
    pub poll_ms: Option<u64>,

    /// Quiet period in milliseconds
    #[arg(long, value_name = "MS")]
    pub quiet_ms: Option<u64>,

    /// Number of scans before exiting (-1 runs until interrupted)
    #[arg(long, value_name = "N", allow_negative_numbers = true)]
    pub scans: Option<i64>,

    /// Only report files with this suffix (repeatable)
    #[arg(long, value_name = "SUFFIX", conflicts_with = "regex")]
    pub suffix: Vec<String>,

    /// Only report files whose name fully matches this regex (repeatable)
    #[arg(long, value_name = "REGEX")]
    pub regex: Vec<String>,

    /// Persist state to this file between runs
    #[arg(long, value_name = "FILE")]
    pub snapshot: Option<PathBuf>,

    /// Allow symlinked roots and a snapshot file that does not exist yet
    #[arg(long)]
    pub lenient: bool,
}

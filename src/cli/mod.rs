//! CLI module for the pollwatch binary.
//!
//! Provides command-line interface parsing and command dispatch.

pub mod args;
pub mod commands;

pub use args::{Cli, Commands, WatchArgs};

//! Init and Config commands.

use anyhow::{Context, anyhow};

use crate::config::Settings;

/// Run init command - create configuration file.
pub fn run_init(force: bool) -> anyhow::Result<()> {
    let path = Settings::init_config_file(force).map_err(|e| anyhow!("{e}"))?;
    println!("Created configuration file at: {}", path.display());
    println!("Edit this file to customize your settings.");
    Ok(())
}

/// Run config command - display current configuration.
pub fn run_config(settings: &Settings) -> anyhow::Result<()> {
    let toml_str = toml::to_string_pretty(settings).context("Error displaying config")?;
    println!("{toml_str}");
    Ok(())
}

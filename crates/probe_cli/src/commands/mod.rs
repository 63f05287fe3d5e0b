//! CLI commands.

pub mod capture_path;
pub mod config;
pub mod run;
pub mod watch;

use anyhow::{Context, Result};
use console::style;
use probe_core::{Config, ProbeError};
use std::path::PathBuf;

/// Flags shared by every command.
pub struct Globals {
    pub config_path: Option<PathBuf>,
    pub capture_dir: Option<PathBuf>,
    pub headless: bool,
    pub json: bool,
}

/// File, then environment, then command-line flags, then validation.
pub fn load_config(globals: &Globals) -> Result<Config> {
    let mut config =
        Config::load(globals.config_path.as_deref()).context("Failed to load configuration")?;
    config.apply_env_with(|key| std::env::var(key).ok())?;
    if let Some(dir) = &globals.capture_dir {
        config.capture.root = dir.clone();
    }
    if globals.headless {
        config.transport.headless = true;
    }
    config.validate()?;
    Ok(config)
}

/// Prints the recovery hint for a failed command, if there is one.
pub fn print_hint(err: &ProbeError) {
    if let Some(hint) = err.recovery_suggestion() {
        eprintln!("{} {}", style("hint:").yellow().bold(), hint);
    }
}

//! quoteprobe - drives the scripted quoting conversation and files proof captures.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod render;
mod session;

#[derive(Parser)]
#[command(name = "quoteprobe")]
#[command(about = "Scripted quoting-conversation prober", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file (default: ./quoteprobe.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Directory captures are filed under
    #[arg(long, global = true)]
    capture_dir: Option<PathBuf>,
    /// Run the bridge's browser without a window
    #[arg(long, global = true)]
    headless: bool,
    /// Print host events as JSON lines
    #[arg(long, global = true)]
    json: bool,
    /// Log at info level (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the scenario once and exit
    Run,
    /// Run the scenario every half hour until a run fails or Ctrl-C
    Watch,
    /// Print the effective configuration
    Config,
    /// Show where a capture would be filed
    CapturePath {
        /// Local time, YYYY-MM-DDTHH:MM (default: now)
        #[arg(long)]
        at: Option<String>,
        /// File as the terminal milestone instead of the opening one
        #[arg(long)]
        terminal: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respects RUST_LOG (e.g. RUST_LOG=probe_core=debug); logs go to stderr
    // so stdout carries only host events.
    let default_level = if cli.verbose { "info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let globals = commands::Globals {
        config_path: cli.config,
        capture_dir: cli.capture_dir,
        headless: cli.headless,
        json: cli.json,
    };

    match cli.command {
        Commands::Run => commands::run::run(&globals).await,
        Commands::Watch => commands::watch::run(&globals).await,
        Commands::Config => commands::config::run(&globals),
        Commands::CapturePath { at, terminal } => {
            commands::capture_path::run(&globals, at.as_deref(), terminal)
        }
    }
}

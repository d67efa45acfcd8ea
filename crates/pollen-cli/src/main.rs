// crates/pollen-cli/src/main.rs
//
// CLI entrypoint for the Pollen Protocol developer tools.
//
// Provides subcommands for inspecting the protocol configuration, evaluating
// an issuance schedule, and replaying a scenario of protocol calls against an
// in-memory ledger and price feed.

mod commands;
mod output;

use clap::{Parser, Subcommand};
use commands::schedule::ScheduleCmd;
use commands::simulate::SimulateCmd;
use output::OutputFormat;
use pollen_core::config::ProtocolConfig;

/// Pollen Protocol CLI: developer tools for the DAO accounting engine.
#[derive(Parser, Debug)]
#[command(
    name = "pollen",
    version = "0.1.0",
    about = "Pollen Protocol CLI: vote escrow, issuance, and portfolio accounting tools"
)]
struct Cli {
    /// Path to the TOML protocol configuration.
    #[arg(long, global = true, default_value = "~/.pollen/config.toml")]
    config: String,

    /// Output format.
    #[arg(long, global = true, value_enum, default_value = "table")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level subcommands.
#[derive(Debug, Subcommand)]
enum Commands {
    /// Print the effective protocol configuration.
    Config,

    /// Evaluate an issuance schedule file.
    Schedule(ScheduleCmd),

    /// Replay a scenario file through the protocol engine.
    Simulate(SimulateCmd),
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli.config);

    match &cli.command {
        Commands::Config => commands::config::run(&config, cli.format).await?,
        Commands::Schedule(cmd) => commands::schedule::run(cmd, cli.format).await?,
        Commands::Simulate(cmd) => commands::simulate::run(cmd, config, cli.format).await?,
    }

    Ok(())
}

/// Load the configuration, falling back to defaults if the file is missing
/// or invalid.
fn load_config(path: &str) -> ProtocolConfig {
    let path = expand_tilde(path);
    match ProtocolConfig::load(&path) {
        Ok(config) => {
            tracing::info!("Loaded configuration from {}", path);
            config
        }
        Err(e) => {
            tracing::warn!("Could not load config from {}: {}. Using defaults.", path, e);
            ProtocolConfig::default()
        }
    }
}

/// Expand `~` at the start of a path to the user's home directory.
fn expand_tilde(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest).display().to_string();
        }
    }
    path.to_string()
}

//! notebridge CLI, the main entry point.
//!
//! Commands:
//! - `run`      Start the Telegram source, cleanup scheduler and gateway
//! - `send`     Save one note through the router
//! - `notes`    Print the pending-notes report
//! - `cleanup`  Run one cleanup cycle
//! - `status`   Show the configuration summary
//! - `doctor`   Diagnose configuration problems
//! - `init`     Write a default config file

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use notebridge_config::{AppConfig, ConfigError};

mod commands;

#[derive(Parser)]
#[command(
    name = "notebridge",
    about = "Save chat and voice messages as notes in Notion, Teamly or Yonote",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (default: ~/.notebridge/config.toml)
    #[arg(short, long, global = true, env = "NOTEBRIDGE_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the bot: Telegram polling, periodic cleanup and the HTTP gateway
    Run,

    /// Save a note as if it had been sent from chat
    Send {
        /// Note text
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },

    /// Print pending notes of every backend
    Notes,

    /// Delete completed notes once and print the report
    Cleanup,

    /// Show configuration summary
    Status,

    /// Diagnose configuration problems
    Doctor,

    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config_path = AppConfig::resolve_path(cli.config.as_deref());
    let loaded = AppConfig::load(Some(&config_path));

    // Initialize tracing
    let level = if cli.verbose {
        "debug".to_string()
    } else {
        loaded
            .as_ref()
            .map(|c| c.log_level.clone())
            .unwrap_or_else(|_| "info".to_string())
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new(format!("{level},hyper=warn,reqwest=warn"))
            }),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Run => commands::run::run(require(loaded)?).await?,
        Commands::Send { text } => commands::send::run(require(loaded)?, text.join(" ")).await?,
        Commands::Notes => commands::notes::run(require(loaded)?).await?,
        Commands::Cleanup => commands::cleanup::run(require(loaded)?).await?,
        Commands::Status => commands::status::run(&config_path, require(loaded)?).await?,
        Commands::Doctor => commands::doctor::run(&config_path, loaded).await?,
        Commands::Init { force } => commands::init::run(&config_path, force).await?,
    }

    Ok(())
}

fn require(loaded: Result<AppConfig, ConfigError>) -> Result<AppConfig, String> {
    loaded.map_err(|e| format!("Failed to load config: {e}"))
}

//! CLI parser and dispatch.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::Settings;
use crate::worker::RunMode;

#[derive(Parser)]
#[command(name = "cinescrape")]
#[command(about = "Cinema showtime harvesting and catalog service")]
#[command(version)]
pub struct Cli {
    /// Config file path (defaults to ./cinescrape.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database and seed configured cinemas
    Init,

    /// Run the API server
    Serve {
        /// Bind address (overrides config)
        #[arg(long)]
        host: Option<String>,
        /// Port (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Run the scrape worker
    Worker {
        /// Operating mode
        #[arg(long, value_enum, default_value = "oneshot")]
        mode: RunMode,
        /// Restrict a direct run to one film
        #[arg(long)]
        film_id: Option<i64>,
    },
}

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Init => commands::init::cmd_init(&settings).await,
        Commands::Serve { host, port } => {
            let host = host.unwrap_or_else(|| settings.host.clone());
            let port = port.unwrap_or(settings.port);
            commands::serve::cmd_serve(&settings, &host, port).await
        }
        Commands::Worker { mode, film_id } => {
            commands::worker::cmd_worker(&settings, mode, film_id).await
        }
    }
}

//! ContractLens CLI: the main entry point.
//!
//! Commands:
//! - `serve`   Start the HTTP API
//! - `chat`    Interactive or single-message chat
//! - `ingest`  Add a text file to the contract corpus
//! - `search`  Query the corpus directly
//! - `config`  Print the default configuration

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use contractlens_config::AppConfig;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(
    name = "contractlens",
    about = "ContractLens: ask questions about your contracts",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config.toml (default: ~/.contractlens/config.toml)
    #[arg(short, long, global = true, env = "CONTRACTLENS_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Chat with the contract analyst
    Chat {
        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Ingest a UTF-8 text file
    Ingest {
        path: PathBuf,

        /// Document title (default: file name without extension)
        #[arg(short, long)]
        title: Option<String>,

        /// Replace the document with this id
        #[arg(long)]
        document_id: Option<String>,
    },

    /// Search ingested contracts
    Search {
        query: String,

        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Only search this document
        #[arg(long)]
        document_id: Option<String>,
    },

    /// Print the default configuration
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);

    let config_path = cli.config;
    let load = || AppConfig::load(config_path.as_deref()).context("failed to load configuration");

    match cli.command {
        Commands::Serve { port } => commands::serve::run(load()?, port).await?,
        Commands::Chat { message } => commands::chat::run(load()?, message).await?,
        Commands::Ingest { path, title, document_id } => {
            commands::ingest::run(load()?, path, title, document_id).await?
        }
        Commands::Search { query, top_k, document_id } => {
            commands::search::run(load()?, query, top_k, document_id).await?
        }
        Commands::Config => commands::config_cmd::run(),
    }

    Ok(())
}

/// `RUST_LOG` wins over `--verbose`. Logs go to stderr so command output
/// stays pipeable.
fn init_tracing(verbose: bool, json: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

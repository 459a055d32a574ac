//! sessreg: session registry CLI.
//!
//! Inspects and edits a directory-backed session registry: create and list
//! sessions, resize or deactivate them, add and remove parties, and purge
//! expired records.

mod commands;
mod config;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sessreg_core::{DirBackend, Id, Registry, TerminalParams};
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

/// sessreg: session registry
#[derive(Parser)]
#[command(name = "sessreg", version, about = "Inspect and edit the terminal session registry")]
struct Cli {
    /// Config file path
    #[arg(long, global = true)]
    config: Option<String>,

    /// Registry data directory (overrides config)
    #[arg(long = "data-dir", global = true)]
    data_dir: Option<String>,

    /// Active session TTL in seconds (overrides config)
    #[arg(long, global = true)]
    ttl: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Register a new session and print its ID
    Create {
        /// Login that owns the session
        #[arg(long)]
        login: String,
        /// Terminal size as W:H
        #[arg(long, default_value = "80:24")]
        size: TerminalParams,
    },

    /// List live sessions
    List {
        #[arg(long)]
        json: bool,
    },

    /// Show one session
    Show {
        id: Id,
        #[arg(long)]
        json: bool,
    },

    /// Change a session's terminal size
    Resize {
        id: Id,
        /// New size as W:H
        size: TerminalParams,
    },

    /// Mark a session inactive
    Deactivate { id: Id },

    /// Record activity on a session now
    Touch { id: Id },

    /// Add a party to a session and print the party ID
    Join {
        id: Id,
        /// Login of the joining party
        #[arg(long)]
        user: String,
        #[arg(long)]
        remote_addr: String,
        /// Node the party connected through
        #[arg(long)]
        server_id: String,
    },

    /// Remove a party from a session
    Leave { id: Id, party: Id },

    /// Delete a session record
    Delete { id: Id },

    /// Delete all expired session records
    Purge,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    if let Err(e) = run(cli).await {
        error!("{:#}", e);
        eprintln!("sessreg: {e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.unwrap_or_else(config::default_config_path);
    let cfg = config::Config::load(&config_path, cli.data_dir.as_deref(), cli.ttl)?;
    debug!(data_dir = %cfg.data_dir.display(), ttl_secs = cfg.active_session_ttl.as_secs(), "resolved config");

    let backend = DirBackend::open(&cfg.data_dir)
        .await
        .with_context(|| format!("failed to open registry at {}", cfg.data_dir.display()))?;
    let registry = Registry::new(Arc::new(backend)).with_active_session_ttl(cfg.active_session_ttl);

    match cli.command {
        Command::Create { login, size } => commands::sessions::run_create(&registry, &login, size).await,
        Command::List { json } => commands::sessions::run_list(&registry, json).await,
        Command::Show { id, json } => commands::sessions::run_show(&registry, &id, json).await,
        Command::Resize { id, size } => commands::sessions::run_resize(&registry, &id, size).await,
        Command::Deactivate { id } => commands::sessions::run_deactivate(&registry, &id).await,
        Command::Touch { id } => commands::sessions::run_touch(&registry, &id).await,
        Command::Join {
            id,
            user,
            remote_addr,
            server_id,
        } => commands::parties::run_join(&registry, &id, &user, &remote_addr, &server_id).await,
        Command::Leave { id, party } => commands::parties::run_leave(&registry, &id, &party).await,
        Command::Delete { id } => commands::sessions::run_delete(&registry, &id).await,
        Command::Purge => commands::sessions::run_purge(&registry).await,
    }
}

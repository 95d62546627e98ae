//! asha-sw entry point.
//!
//! Delivers one lifecycle event (install, activate, fetch) to the offline
//! asset cache and prints the outcome as JSON on stdout. Logging goes to
//! stderr so stdout stays machine-readable.

use anyhow::{Context, Result};
use asha_client::{CacheManager, FetchConfig, HttpNetwork, WorkerConfig};
use asha_core::{AppConfig, CacheDb};
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use cli::{Cli, Command};
use commands::print_json;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .json()
        .init();

    let cli = Cli::parse();

    if let Err(err) = run(&cli).await {
        if let Some(cache_err) = err.downcast_ref::<asha_core::Error>() {
            tracing::error!(code = cache_err.code(), error = %cache_err, "command failed");
        }
        return Err(err);
    }
    Ok(())
}

async fn run(cli: &Cli) -> Result<()> {
    let config = load_config(cli)?;

    tracing::debug!(db = %config.db_path.display(), cache = %config.cache_name, "opening cache");

    let db = CacheDb::open(&config.db_path)
        .await
        .with_context(|| format!("opening {}", config.db_path.display()))?;
    let worker = WorkerConfig::from_app_config(&config)?;
    let network = HttpNetwork::new(FetchConfig::from(&config), worker.origin.clone())?;
    let manager = CacheManager::new(worker, db, network);

    match &cli.command {
        Command::Install => print_json(&commands::install_impl(&manager).await?),
        Command::Activate { clients } => print_json(&commands::activate_impl(&manager, clients).await?),
        Command::Run { clients } => print_json(&commands::run_impl(&manager, clients).await?),
        Command::Fetch(args) => print_json(&commands::fetch_impl(&manager, args).await?),
        Command::Status => print_json(&commands::status_impl(&manager).await?),
        Command::Keys { generation } => print_json(&commands::keys_impl(&manager, generation.as_deref()).await?),
    }
}

/// Layered config, then command-line overrides on top.
fn load_config(cli: &Cli) -> Result<AppConfig> {
    let mut config = AppConfig::load_from(cli.config.as_deref()).context("loading configuration")?;

    if let Some(db) = &cli.db {
        config.db_path = db.clone();
    }
    if let Some(name) = &cli.cache_name {
        config.cache_name = name.clone();
    }

    config.validate().context("invalid command-line override")?;
    Ok(config)
}

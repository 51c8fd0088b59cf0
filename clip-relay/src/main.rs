//! cliplink-relay binary entry point.
//!
//! Usage:
//! ```bash
//! cliplink-relay --config relay.toml
//! cliplink-relay --port 9000 serve
//! cliplink-relay clear
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use cliplink_relay::error::RelayError;
use cliplink_relay::http::{build_router, health};
use cliplink_relay::{ClipSync, Config, Database};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Channel-scoped clipboard synchronization server.
#[derive(Parser, Debug)]
#[command(name = "cliplink-relay")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Configuration file (defaults apply when it does not exist)
    #[arg(long, short, default_value = "relay.toml")]
    config: PathBuf,

    /// Override the listening port
    #[arg(long, short)]
    port: Option<u16>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve the HTTP API (default)
    Serve,

    /// Delete all stored data, keeping the schema
    Clear,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = load_config(&cli.config)?;
    if let Some(port) = cli.port {
        config.override_port(port);
    }

    let db = Database::open(&config.storage)
        .await
        .with_context(|| format!("failed to open {}", config.storage.database.display()))?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(config, &db).await.context("relay failed")?,
        Commands::Clear => {
            db.clear().await.context("failed to clear database")?;
            tracing::info!(database = %config.storage.database.display(), "all data cleared");
        }
    }

    db.close().await;
    Ok(())
}

fn load_config(path: &std::path::Path) -> Result<Config, RelayError> {
    if path.exists() {
        tracing::info!(path = %path.display(), "loading configuration");
        Ok(Config::from_file(path)?)
    } else {
        tracing::info!(path = %path.display(), "configuration file not found, using defaults");
        Ok(Config::default())
    }
}

async fn serve(config: Config, db: &Database) -> Result<(), RelayError> {
    health::init_start_time();

    let bind_address = config.http.bind_address.clone();
    let sync = Arc::new(ClipSync::from_database(config, db));
    let app = build_router(sync);

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    tracing::info!(address = %bind_address, "cliplink-relay listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("shutting down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}

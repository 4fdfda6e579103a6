//! Tic-Tac-Toe Server
//!
//! Binds the WebSocket endpoint and serves until Ctrl-C.

use std::sync::Arc;
use anyhow::Context;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use tic_tac_toe::{GameServer, ServerConfig, VERSION};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    let config = ServerConfig::from_env().context("Invalid server configuration")?;

    info!("Tic-Tac-Toe Server v{}", VERSION);
    info!("Bind address: {}", config.bind_addr);
    info!(
        "Turn enforcement: {}, occupied-cell check: {}",
        config.session.enforce_turns, config.session.reject_occupied_cells
    );

    let server = Arc::new(GameServer::new(config));

    let signal_server = server.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl-C received, shutting down");
            signal_server.shutdown();
        }
    });

    server.run().await.context("Server failed")?;

    info!("Server stopped");
    Ok(())
}

//! RPS Escrow Server
//!
//! Serves the escrow over WebSocket on an in-memory ledger.

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use rps_escrow::{network::GameServer, EscrowConfig, VERSION};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = EscrowConfig::from_env().context("reading configuration")?;

    info!("RPS Escrow Server v{}", VERSION);
    info!("House: {}", config.coordinator.house);
    match config.coordinator.reveal_timeout_secs {
        Some(secs) => info!("Forfeit after {}s without a reveal", secs),
        None => info!("Forfeits disabled"),
    }
    if !config.auth.is_configured() {
        warn!("No AUTH_SECRET or AUTH_PUBLIC_KEY_PEM set; every auth attempt will fail");
    }

    let server = GameServer::new(config.server, config.auth, config.coordinator);

    let shutdown = server.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl-C received");
            shutdown.shutdown();
        }
    });

    server.run().await.context("server failed")?;
    info!("Server stopped");
    Ok(())
}

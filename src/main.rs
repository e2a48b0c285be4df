//! NFT Bounty Server
//!
//! Redeem secret claim codes for limited track collectibles

use std::sync::Arc;

use nft_bounty::server::AppState;
use nft_bounty::{Config, LedgerStore, RedemptionEngine};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting NFT Bounty Server");

    let config = Config::load()?;

    let db_path = config.database_path();
    let store = Arc::new(LedgerStore::new(&db_path)?);
    info!("Ledger store initialized at {db_path}");

    let engine = RedemptionEngine::new(store.clone(), &config);

    // Environment overrides for container deployments
    let host = std::env::var("BOUNTY_HOST").unwrap_or_else(|_| config.server.host.clone());
    let port: u16 = std::env::var("BOUNTY_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(config.server.port);

    let state = Arc::new(AppState {
        engine,
        store,
        started_at: std::time::Instant::now(),
    });

    nft_bounty::server::run_server(&host, port, state).await?;

    Ok(())
}

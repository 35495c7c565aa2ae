//! Production ingestion runtime: tails the event feed and keeps the
//! reconciliation store current until Ctrl-C.

use marketflow::coordinator::run_ingestion;
use marketflow::{IngestConfig, JsonlEventSource, SqliteStore};
use std::sync::Arc;
use tokio::sync::watch;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    let config = IngestConfig::from_env()?;

    log::info!("🚀 Starting marketflow...");
    log::info!("📊 Configuration:");
    log::info!("   Feed: {}", config.event_feed_path);
    log::info!("   Database: {}", config.db_path);
    log::info!("   Contracts: {:?}", config.contract_package_hashes);
    log::info!("   Start height: {}", config.start_block_height);

    let store = Arc::new(SqliteStore::open(&config.db_path)?);
    let source = Arc::new(
        JsonlEventSource::new(config.event_feed_path.clone(), true)
            .with_capacity(config.channel_capacity),
    );

    let (stop_tx, stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::info!("🔄 Ctrl-C received, stopping...");
            let _ = stop_tx.send(true);
        }
    });

    run_ingestion(source, store, &config, true, stop_rx).await?;

    log::info!("✅ Marketflow stopped");
    Ok(())
}

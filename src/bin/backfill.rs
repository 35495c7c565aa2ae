//! Offline reprocessing: replays a captured JSONL event feed into the store.
//!
//! Safe to run against a populated database - replayed events are absorbed by
//! the projection's idempotence rules. Optionally seeds the collection
//! catalog first from a JSON file (COLLECTIONS_PATH).
//!
//! Usage: backfill [capture.jsonl]

use marketflow::coordinator::run_ingestion;
use marketflow::{Collection, IngestConfig, JsonlEventSource, SqliteStore};
use std::sync::Arc;
use tokio::sync::watch;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    let config = IngestConfig::from_env()?;
    let capture_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| config.event_feed_path.clone());

    let store = Arc::new(SqliteStore::open(&config.db_path)?);

    if let Ok(collections_path) = std::env::var("COLLECTIONS_PATH") {
        let raw = std::fs::read_to_string(&collections_path)?;
        let collections: Vec<Collection> = serde_json::from_str(&raw)?;
        for collection in &collections {
            store.seed_collection(collection)?;
        }
        log::info!("✅ Seeded {} collections from {}", collections.len(), collections_path);
    }

    log::info!("🚀 Backfill from {} into {}", capture_path, config.db_path);

    let source = Arc::new(
        JsonlEventSource::new(capture_path, false).with_capacity(config.channel_capacity),
    );
    let (_stop_tx, stop_rx) = watch::channel(false);

    run_ingestion(source, store, &config, false, stop_rx).await?;

    log::info!("✅ Backfill complete");
    Ok(())
}

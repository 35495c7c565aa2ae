//! Ingestion coordinator: subscription lifecycle and write pipeline
//!
//! One coordinator owns one subscription (one contract package hash) and is
//! the single writer for that entity family; independent contracts run their
//! own coordinator concurrently. Events of a subscription are parsed,
//! projected and persisted strictly in delivery order.
//!
//! State machine:
//!
//! ```text
//! Disconnected → Subscribing → Streaming ─(error/EOF)→ Reconnecting → Subscribing
//!                                  └──(Stop)→ Stopped
//! ```
//!
//! On reconnect the last persisted checkpoint is the resume point; events
//! re-delivered below it are filtered by the source, duplicates above it are
//! absorbed by the projector's idempotence rules.

use crate::backoff::ExponentialBackoff;
use crate::config::IngestConfig;
use crate::events::{ChainEvent, DomainEvent};
use crate::parser::{parse_chain_event, EventFilter};
use crate::projector::{apply, AssetKey, OrderKey, Snapshot};
use crate::source::EventSource;
use crate::store::{ReconciliationStore, StoreError};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;

/// Bound on optimistic-concurrency re-read/re-apply loops. Heights only
/// advance, so more than a couple of iterations means something is wrong.
const MAX_CONFLICT_RETRIES: u32 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorState {
    Disconnected,
    Subscribing,
    Streaming,
    Reconnecting,
    Stopped,
}

#[derive(Debug)]
pub enum CoordinatorError {
    /// The subscription could not be re-established within the retry budget
    RetriesExhausted,
    /// Storage retries exhausted; ingestion for this contract halted
    Fatal(String),
}

impl std::fmt::Display for CoordinatorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CoordinatorError::RetriesExhausted => {
                write!(f, "subscription retry budget exhausted")
            }
            CoordinatorError::Fatal(msg) => write!(f, "ingestion halted: {}", msg),
        }
    }
}

impl std::error::Error for CoordinatorError {}

enum StreamEnd {
    /// Channel closed: transport connection ended
    Disconnected,
    /// Stop requested and in-flight events drained
    Shutdown,
}

pub struct IngestionCoordinator {
    source: Arc<dyn EventSource>,
    store: Arc<dyn ReconciliationStore>,
    filter: EventFilter,
    start_block_height: u64,
    /// false = bounded replay: treat feed EOF as completion, not disconnect
    follow: bool,
    channel_capacity: usize,
    state: CoordinatorState,
    shutdown: watch::Receiver<bool>,
}

impl IngestionCoordinator {
    pub fn new(
        source: Arc<dyn EventSource>,
        store: Arc<dyn ReconciliationStore>,
        filter: EventFilter,
        start_block_height: u64,
        follow: bool,
        channel_capacity: usize,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            source,
            store,
            filter,
            start_block_height,
            follow,
            channel_capacity,
            state: CoordinatorState::Disconnected,
            shutdown,
        }
    }

    pub fn state(&self) -> CoordinatorState {
        self.state
    }

    /// Drive the subscription until Stop, bounded-replay completion, or an
    /// unrecoverable error.
    pub async fn run(&mut self) -> Result<(), CoordinatorError> {
        let pkg = self.filter.contract_package_hash.clone();
        let mut backoff = ExponentialBackoff::new(500, 60_000, 10);

        loop {
            if *self.shutdown.borrow() {
                self.state = CoordinatorState::Stopped;
                return Ok(());
            }

            self.state = CoordinatorState::Subscribing;
            let resume = match self.resume_height().await {
                Ok(height) => height,
                Err(e) => {
                    log::error!("❌ [{}] Checkpoint read failed: {}", pkg, e);
                    self.state = CoordinatorState::Reconnecting;
                    backoff
                        .sleep()
                        .await
                        .map_err(|_| CoordinatorError::RetriesExhausted)?;
                    continue;
                }
            };

            match self.source.subscribe(resume).await {
                Ok(rx) => {
                    log::info!("✅ [{}] Subscribed from height {}", pkg, resume);
                    backoff.reset();
                    self.state = CoordinatorState::Streaming;

                    match self.stream(rx).await? {
                        StreamEnd::Shutdown => {
                            log::info!("✅ [{}] Stopped after draining in-flight events", pkg);
                            self.state = CoordinatorState::Stopped;
                            return Ok(());
                        }
                        StreamEnd::Disconnected if !self.follow => {
                            log::info!("✅ [{}] Replay complete", pkg);
                            self.state = CoordinatorState::Stopped;
                            return Ok(());
                        }
                        StreamEnd::Disconnected => {
                            log::warn!("⚠️ [{}] Feed disconnected, resubscribing", pkg);
                            self.state = CoordinatorState::Reconnecting;
                            backoff
                                .sleep()
                                .await
                                .map_err(|_| CoordinatorError::RetriesExhausted)?;
                        }
                    }
                }
                Err(e) => {
                    log::error!("❌ [{}] Subscription failed: {}", pkg, e);
                    self.state = CoordinatorState::Reconnecting;
                    backoff
                        .sleep()
                        .await
                        .map_err(|_| CoordinatorError::RetriesExhausted)?;
                }
            }
        }
    }

    /// Resume at the persisted checkpoint height, or at the configured start
    /// height on a fresh database.
    ///
    /// The checkpoint block may have held more events than were applied
    /// before a crash, so it is re-delivered in full; already-applied events
    /// are absorbed by the projection rules.
    async fn resume_height(&self) -> Result<u64, StoreError> {
        let checkpoint = self
            .store
            .checkpoint(&self.filter.contract_package_hash)
            .await?;
        Ok(checkpoint.unwrap_or(self.start_block_height))
    }

    /// Consume one connection's worth of events.
    async fn stream(&self, mut rx: mpsc::Receiver<ChainEvent>) -> Result<StreamEnd, CoordinatorError> {
        let pkg = &self.filter.contract_package_hash;
        let mut shutdown = self.shutdown.clone();
        let mut event_count = 0u64;
        let mut last_log = Instant::now();

        loop {
            tokio::select! {
                maybe_event = rx.recv() => {
                    match maybe_event {
                        Some(event) => {
                            self.process_event(&event).await?;

                            event_count += 1;
                            if last_log.elapsed().as_secs() >= 10 {
                                let rate = event_count as f64 / last_log.elapsed().as_secs_f64();
                                log::info!("📊 [{}] Ingestion rate: {:.1} events/sec", pkg, rate);
                                event_count = 0;
                                last_log = Instant::now();
                            }
                            let queued = rx.len();
                            if queued > self.channel_capacity / 2 {
                                log::warn!(
                                    "⚠️ [{}] Queue usage high: {}/{}",
                                    pkg, queued, self.channel_capacity
                                );
                            }
                        }
                        None => return Ok(StreamEnd::Disconnected),
                    }
                }
                changed = shutdown.changed() => {
                    // A dropped stop handle reads as a stop request
                    let stop = changed.is_err() || *shutdown.borrow();
                    if !stop {
                        continue;
                    }
                    log::info!("🔄 [{}] Stop requested, draining queue", pkg);
                    while let Ok(event) = rx.try_recv() {
                        self.process_event(&event).await?;
                    }
                    return Ok(StreamEnd::Shutdown);
                }
            }
        }
    }

    /// Parse, project and persist one raw event, then advance the checkpoint.
    ///
    /// Filtered events and parse failures still advance the checkpoint: they
    /// are durably "applied" as no-ops and must not be replayed forever.
    async fn process_event(&self, event: &ChainEvent) -> Result<(), CoordinatorError> {
        match parse_chain_event(&self.filter, event) {
            Ok(Some(domain)) => {
                log::debug!(
                    "📥 [{}] {} at height {} ({})",
                    self.filter.contract_package_hash,
                    domain.name(),
                    domain.block_height(),
                    domain.deploy_hash()
                );
                self.apply_with_retries(&domain).await?;
            }
            Ok(None) => {}
            Err(e) => {
                // Schema mismatch between deployed contract and parser:
                // surfaced loudly, event skipped, ingestion continues
                log::error!(
                    "❌ [{}] Parse failure at height {} (deploy {}): {} - event skipped",
                    self.filter.contract_package_hash,
                    event.block_height,
                    event.deploy_hash,
                    e
                );
            }
        }

        self.checkpoint_with_retries(event.block_height).await
    }

    /// One load → apply → write-back pass, with conflict re-reads and
    /// storage backoff. Conflicts never surface; storage exhaustion halts
    /// this contract's ingestion.
    async fn apply_with_retries(&self, domain: &DomainEvent) -> Result<(), CoordinatorError> {
        let mut conflict_attempts = 0u32;
        let mut storage_backoff = ExponentialBackoff::new(200, 30_000, 8);

        loop {
            match self.apply_once(domain).await {
                Ok(()) => return Ok(()),
                Err(e) if e.is_conflict() => {
                    conflict_attempts += 1;
                    if conflict_attempts >= MAX_CONFLICT_RETRIES {
                        return Err(CoordinatorError::Fatal(format!(
                            "conflict retry budget exhausted applying {}: {}",
                            domain.name(),
                            e
                        )));
                    }
                    log::debug!("🔁 Write conflict applying {}, re-reading", domain.name());
                }
                Err(e) => {
                    log::error!("❌ Storage failure applying {}: {}", domain.name(), e);
                    if storage_backoff.sleep().await.is_err() {
                        log::error!(
                            "❌ FATAL [{}]: storage retries exhausted, halting ingestion",
                            self.filter.contract_package_hash
                        );
                        return Err(CoordinatorError::Fatal(e.to_string()));
                    }
                }
            }
        }
    }

    async fn apply_once(&self, domain: &DomainEvent) -> Result<(), StoreError> {
        let scoped = self.load_snapshot(domain).await?;
        let next = apply(&scoped, domain);
        self.write_back(&scoped, &next).await
    }

    /// Load the entities this event can touch into a scoped snapshot.
    async fn load_snapshot(&self, domain: &DomainEvent) -> Result<Snapshot, StoreError> {
        let mut snapshot = Snapshot::default();

        match domain {
            DomainEvent::SellOrderCreated {
                creator,
                contract_hash,
                token_id,
                start_time,
                ..
            } => {
                let key = OrderKey {
                    creator: creator.clone(),
                    contract_hash: contract_hash.clone(),
                    token_id: token_id.clone(),
                    start_time: *start_time,
                };
                if let Some(order) = self.store.get_sell_order(&key).await? {
                    snapshot.sell_orders.insert(key, order);
                }
            }
            DomainEvent::SellOrderCancelled {
                creator,
                contract_hash,
                token_id,
                ..
            } => {
                if let Some(order) = self
                    .store
                    .pending_sell_order(creator, contract_hash, token_id)
                    .await?
                {
                    snapshot.sell_orders.insert(order.key(), order);
                }
            }
            DomainEvent::SellOrderAccepted {
                creator,
                contract_hash,
                token_id,
                ..
            } => {
                if let Some(order) = self
                    .store
                    .pending_sell_order(creator, contract_hash, token_id)
                    .await?
                {
                    snapshot.sell_orders.insert(order.key(), order);
                }
                let asset_key = AssetKey {
                    contract_hash: contract_hash.clone(),
                    token_id: token_id.clone(),
                };
                if let Some(asset) = self.store.get_asset(&asset_key).await? {
                    snapshot.assets.insert(asset_key, asset);
                }
            }
            DomainEvent::BuyOrderCreated {
                collection,
                token_id,
                ..
            } => {
                snapshot.buy_orders = self
                    .store
                    .buy_orders_for_token(collection, token_id)
                    .await?;
            }
            DomainEvent::TokenMinted {
                contract_hash,
                token_id,
                ..
            }
            | DomainEvent::TokenTransferred {
                contract_hash,
                token_id,
                ..
            } => {
                let key = AssetKey {
                    contract_hash: contract_hash.clone(),
                    token_id: token_id.clone(),
                };
                if let Some(asset) = self.store.get_asset(&key).await? {
                    snapshot.assets.insert(key, asset);
                }
            }
        }

        Ok(snapshot)
    }

    /// Persist what the event changed, stating the height each entity was
    /// read at so a concurrent pass is detected as a conflict.
    async fn write_back(&self, before: &Snapshot, after: &Snapshot) -> Result<(), StoreError> {
        for (key, order) in &after.sell_orders {
            let prior = before.sell_orders.get(key);
            if prior != Some(order) {
                let expected = prior.map(|o| o.last_applied_block_height);
                self.store.upsert_sell_order(order, expected).await?;
            }
        }

        for (key, asset) in &after.assets {
            let prior = before.assets.get(key);
            if prior != Some(asset) {
                let expected = prior.map(|a| a.last_applied_block_height);
                self.store.upsert_asset(asset, expected).await?;
            }
        }

        for order in &after.buy_orders {
            let already = before
                .buy_orders
                .iter()
                .any(|b| b.deploy_hash == order.deploy_hash);
            if !already {
                self.store.append_buy_order(order).await?;
            }
        }

        Ok(())
    }

    /// The checkpoint is the durable resume cursor; losing one write would
    /// only cause re-delivery, but a persistent failure halts ingestion like
    /// any other storage error.
    async fn checkpoint_with_retries(&self, block_height: u64) -> Result<(), CoordinatorError> {
        let pkg = &self.filter.contract_package_hash;
        let mut storage_backoff = ExponentialBackoff::new(200, 30_000, 8);

        loop {
            match self.store.save_checkpoint(pkg, block_height).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    log::error!("❌ [{}] Checkpoint write failed: {}", pkg, e);
                    if storage_backoff.sleep().await.is_err() {
                        return Err(CoordinatorError::Fatal(e.to_string()));
                    }
                }
            }
        }
    }
}

/// Spawn one coordinator per configured contract package hash and wait for
/// all of them. Subscriptions progress independently; the first error wins.
pub async fn run_ingestion(
    source: Arc<dyn EventSource>,
    store: Arc<dyn ReconciliationStore>,
    config: &IngestConfig,
    follow: bool,
    shutdown: watch::Receiver<bool>,
) -> Result<(), CoordinatorError> {
    let mut tasks = JoinSet::new();

    for pkg in &config.contract_package_hashes {
        let filter = if config.event_names.is_empty() {
            EventFilter::all_events(pkg.clone())
        } else {
            EventFilter::new(pkg.clone(), config.event_names.clone())
        };
        let mut coordinator = IngestionCoordinator::new(
            source.clone(),
            store.clone(),
            filter,
            config.start_block_height,
            follow,
            config.channel_capacity,
            shutdown.clone(),
        );
        tasks.spawn(async move { coordinator.run().await });
    }

    let mut result = Ok(());
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                log::error!("❌ Coordinator failed: {}", e);
                if result.is_ok() {
                    result = Err(e);
                }
            }
            Err(e) => {
                log::error!("❌ Coordinator task panicked: {}", e);
                if result.is_ok() {
                    result = Err(CoordinatorError::Fatal(e.to_string()));
                }
            }
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projector::OrderStatus;
    use crate::source::ScriptedEventSource;
    use crate::store::SqliteStore;
    use serde_json::json;
    use tempfile::NamedTempFile;

    const PKG: &str = "5ede076610dedae5ec3aa581efcc9548c8a141350ce5b9713d87ed5d9bc56954";

    fn chain_event(name: &str, height: u64, deploy: &str, payload: serde_json::Value) -> ChainEvent {
        ChainEvent {
            deploy_hash: deploy.to_string(),
            block_height: height,
            timestamp: 1_700_000_000 + height as i64,
            contract_package_hash: PKG.to_string(),
            event_name: name.to_string(),
            raw_payload: payload,
        }
    }

    fn sell_order_created(height: u64, deploy: &str, token: &str) -> ChainEvent {
        chain_event(
            "SellOrderCreated",
            height,
            deploy,
            json!({
                "creator": "seller-1",
                "collection": "contract-nft",
                "token_id": token,
                "price": "100",
                "start_time": 1_700_000_000u64,
            }),
        )
    }

    fn sell_order_accepted(height: u64, deploy: &str, token: &str, buyer: &str) -> ChainEvent {
        chain_event(
            "SellOrderAccepted",
            height,
            deploy,
            json!({
                "creator": "seller-1",
                "collection": "contract-nft",
                "token_id": token,
                "buyer": buyer,
            }),
        )
    }

    fn coordinator_for(
        source: Arc<dyn EventSource>,
        store: Arc<SqliteStore>,
        follow: bool,
    ) -> (IngestionCoordinator, watch::Sender<bool>) {
        let (stop_tx, stop_rx) = watch::channel(false);
        let coordinator = IngestionCoordinator::new(
            source,
            store,
            EventFilter::all_events(PKG),
            0,
            follow,
            100,
            stop_rx,
        );
        (coordinator, stop_tx)
    }

    fn test_store() -> (NamedTempFile, Arc<SqliteStore>) {
        let temp = NamedTempFile::new().unwrap();
        let store = Arc::new(SqliteStore::open(temp.path().to_str().unwrap()).unwrap());
        (temp, store)
    }

    #[tokio::test]
    async fn test_bounded_replay_applies_and_checkpoints() {
        let (_temp, store) = test_store();
        let source = Arc::new(ScriptedEventSource::new(vec![vec![
            sell_order_created(10, "deploy-1", "7"),
            sell_order_accepted(11, "deploy-2", "7", "buyer-b"),
        ]]));

        let (mut coordinator, _stop) = coordinator_for(source, store.clone(), false);
        coordinator.run().await.unwrap();
        assert_eq!(coordinator.state(), CoordinatorState::Stopped);

        let order = store
            .pending_sell_order("seller-1", "contract-nft", "7")
            .await
            .unwrap();
        assert!(order.is_none());

        let order = store
            .get_sell_order(&OrderKey {
                creator: "seller-1".to_string(),
                contract_hash: "contract-nft".to_string(),
                token_id: "7".to_string(),
                start_time: 1_700_000_000,
            })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(order.status, OrderStatus::Succeeded);
        assert_eq!(order.buyer.as_deref(), Some("buyer-b"));

        let asset = store
            .get_asset(&AssetKey {
                contract_hash: "contract-nft".to_string(),
                token_id: "7".to_string(),
            })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(asset.owner, "buyer-b");

        assert_eq!(store.checkpoint(PKG).await.unwrap(), Some(11));
    }

    #[tokio::test]
    async fn test_reconnect_resumes_and_absorbs_duplicates() {
        let (_temp, store) = test_store();
        // Connection 1 delivers the creation; connection 2 re-delivers it
        // (at-least-once) along with the acceptance
        let source = Arc::new(ScriptedEventSource::new(vec![
            vec![sell_order_created(10, "deploy-1", "7")],
            vec![
                sell_order_created(10, "deploy-1", "7"),
                sell_order_accepted(12, "deploy-2", "7", "buyer-b"),
            ],
        ]));

        let (mut coordinator, stop_tx) = coordinator_for(source, store.clone(), true);
        let handle = tokio::spawn(async move { coordinator.run().await });

        tokio::time::sleep(std::time::Duration::from_millis(1500)).await;
        stop_tx.send(true).unwrap();
        tokio::time::timeout(std::time::Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap()
            .unwrap();

        // Exactly one order despite the duplicate creation
        let order = store
            .get_sell_order(&OrderKey {
                creator: "seller-1".to_string(),
                contract_hash: "contract-nft".to_string(),
                token_id: "7".to_string(),
                start_time: 1_700_000_000,
            })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(order.status, OrderStatus::Succeeded);
        assert_eq!(store.checkpoint(PKG).await.unwrap(), Some(12));
    }

    #[tokio::test]
    async fn test_resume_redelivers_events_at_checkpoint_height() {
        let (_temp, store) = test_store();
        // A crash between two events of one block leaves the checkpoint at
        // that height with a sibling unapplied; the whole block must be
        // re-delivered on resume
        store.save_checkpoint(PKG, 9).await.unwrap();

        let source = Arc::new(ScriptedEventSource::new(vec![vec![chain_event(
            "Mint",
            9,
            "deploy-mint",
            json!({"recipient": "owner-a", "token_id": "4", "token_meta": "{}"}),
        )]]));
        let (mut coordinator, _stop) = coordinator_for(source, store.clone(), false);
        coordinator.run().await.unwrap();

        let asset = store
            .get_asset(&AssetKey {
                contract_hash: PKG.to_string(),
                token_id: "4".to_string(),
            })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(asset.owner, "owner-a");
        assert_eq!(store.checkpoint(PKG).await.unwrap(), Some(9));
    }

    #[tokio::test]
    async fn test_parse_failure_skips_event_and_continues() {
        let (_temp, store) = test_store();
        let source = Arc::new(ScriptedEventSource::new(vec![vec![
            // price missing: matching but malformed
            chain_event(
                "SellOrderCreated",
                5,
                "deploy-bad",
                json!({
                    "creator": "seller-1",
                    "collection": "contract-nft",
                    "token_id": "1",
                    "start_time": 1u64,
                }),
            ),
            sell_order_created(6, "deploy-ok", "2"),
        ]]));

        let (mut coordinator, _stop) = coordinator_for(source, store.clone(), false);
        coordinator.run().await.unwrap();

        // The malformed event is skipped but acknowledged; the next one lands
        let order = store
            .pending_sell_order("seller-1", "contract-nft", "2")
            .await
            .unwrap();
        assert!(order.is_some());
        assert_eq!(store.checkpoint(PKG).await.unwrap(), Some(6));
    }

    #[tokio::test]
    async fn test_unrelated_contract_events_are_acknowledged_only() {
        let (_temp, store) = test_store();
        let mut foreign = sell_order_created(9, "deploy-x", "5");
        foreign.contract_package_hash = "00".repeat(32);

        let source = Arc::new(ScriptedEventSource::new(vec![vec![foreign]]));
        let (mut coordinator, _stop) = coordinator_for(source, store.clone(), false);
        coordinator.run().await.unwrap();

        let order = store
            .pending_sell_order("seller-1", "contract-nft", "5")
            .await
            .unwrap();
        assert!(order.is_none());
        assert_eq!(store.checkpoint(PKG).await.unwrap(), Some(9));
    }
}

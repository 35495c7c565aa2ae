//! Durable reconciliation store backed by SQLite
//!
//! One row per sell order, buy order and asset, each carrying
//! `last_applied_block_height` for optimistic concurrency: an upsert states
//! the height it read, and the write is rejected with a conflict when the
//! stored row has advanced past that expectation. The coordinator re-reads
//! and re-applies on conflict instead of overwriting.
//!
//! Also holds the per-contract resume checkpoint and the read-only collection
//! catalog (seeded out-of-band).

use crate::projector::{Asset, AssetKey, BuyOrder, OrderKey, OrderStatus, SellOrder};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

/// Catalog entry for a tracked NFT collection. Written out-of-band, read-only
/// to ingestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    pub contract_hash: String,
    pub contract_package_hash: String,
    pub slug: String,
    pub name: String,
    pub symbol: String,
    pub description: String,
    pub image: String,
    pub twitter: Option<String>,
    pub discord: Option<String>,
    pub website: Option<String>,
}

#[derive(Debug)]
pub enum StoreError {
    /// Optimistic-concurrency loss: stored height differs from expectation
    Conflict {
        entity: &'static str,
        expected: Option<u64>,
        found: Option<u64>,
    },
    /// Durable failure to read or write
    Storage(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Conflict {
                entity,
                expected,
                found,
            } => write!(
                f,
                "write conflict on {}: expected height {:?}, found {:?}",
                entity, expected, found
            ),
            StoreError::Storage(msg) => write!(f, "storage error: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Storage(err.to_string())
    }
}

impl StoreError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }
}

/// Read/write surface the coordinator drives. Entity-granularity upserts are
/// atomic; the expected-height argument is the caller's last read
/// (`None` = "I believe this row does not exist yet").
#[async_trait]
pub trait ReconciliationStore: Send + Sync {
    async fn get_sell_order(&self, key: &OrderKey) -> Result<Option<SellOrder>, StoreError>;

    /// The pending order a cancel/accept event addresses.
    async fn pending_sell_order(
        &self,
        creator: &str,
        contract_hash: &str,
        token_id: &str,
    ) -> Result<Option<SellOrder>, StoreError>;

    async fn upsert_sell_order(
        &self,
        order: &SellOrder,
        expected_last_height: Option<u64>,
    ) -> Result<(), StoreError>;

    /// Append-only; a re-delivered deploy hash is silently collapsed.
    async fn append_buy_order(&self, order: &BuyOrder) -> Result<(), StoreError>;

    async fn buy_orders_for_token(
        &self,
        collection: &str,
        token_id: &str,
    ) -> Result<Vec<BuyOrder>, StoreError>;

    async fn get_asset(&self, key: &AssetKey) -> Result<Option<Asset>, StoreError>;

    async fn upsert_asset(
        &self,
        asset: &Asset,
        expected_last_height: Option<u64>,
    ) -> Result<(), StoreError>;

    async fn get_collection(&self, contract_hash: &str) -> Result<Option<Collection>, StoreError>;

    /// Last durably applied block height for a contract package, if any.
    async fn checkpoint(&self, contract_package_hash: &str) -> Result<Option<u64>, StoreError>;

    /// Advance the resume cursor. Never moves backwards.
    async fn save_checkpoint(
        &self,
        contract_package_hash: &str,
        block_height: u64,
    ) -> Result<(), StoreError>;
}

/// Embedded schema; every statement is idempotent so opening an existing
/// database is safe.
const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS sell_orders (
    creator                   TEXT NOT NULL,
    contract_hash             TEXT NOT NULL,
    token_id                  TEXT NOT NULL,
    start_time                INTEGER NOT NULL,
    pay_token                 TEXT,
    price                     TEXT NOT NULL,
    buyer                     TEXT,
    additional_recipient      TEXT,
    status                    TEXT NOT NULL,
    created_deploy_hash       TEXT NOT NULL,
    last_applied_block_height INTEGER NOT NULL,
    updated_at                INTEGER NOT NULL,
    created_at                INTEGER NOT NULL,
    PRIMARY KEY (creator, contract_hash, token_id, start_time)
);

CREATE INDEX IF NOT EXISTS idx_sell_orders_pending
    ON sell_orders (contract_hash, token_id, status);

CREATE TABLE IF NOT EXISTS buy_orders (
    id                   INTEGER PRIMARY KEY AUTOINCREMENT,
    creator              TEXT NOT NULL,
    collection           TEXT NOT NULL,
    token_id             TEXT NOT NULL,
    owner                TEXT NOT NULL,
    pay_token            TEXT,
    price                TEXT NOT NULL,
    start_time           INTEGER NOT NULL,
    additional_recipient TEXT,
    deploy_hash          TEXT NOT NULL UNIQUE,
    block_height         INTEGER NOT NULL,
    created_at           INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_buy_orders_token
    ON buy_orders (collection, token_id);

CREATE TABLE IF NOT EXISTS assets (
    contract_hash             TEXT NOT NULL,
    token_id                  TEXT NOT NULL,
    owner                     TEXT NOT NULL,
    mint_date                 INTEGER NOT NULL,
    metadata                  TEXT NOT NULL,
    last_applied_block_height INTEGER NOT NULL,
    updated_at                INTEGER NOT NULL,
    PRIMARY KEY (contract_hash, token_id)
);

CREATE TABLE IF NOT EXISTS collections (
    contract_hash         TEXT NOT NULL UNIQUE,
    contract_package_hash TEXT NOT NULL UNIQUE,
    slug                  TEXT NOT NULL UNIQUE,
    name                  TEXT NOT NULL,
    symbol                TEXT NOT NULL,
    description           TEXT NOT NULL,
    image                 TEXT NOT NULL,
    twitter               TEXT,
    discord               TEXT,
    website               TEXT
);

CREATE TABLE IF NOT EXISTS checkpoints (
    contract_package_hash TEXT PRIMARY KEY,
    block_height          INTEGER NOT NULL,
    updated_at            INTEGER NOT NULL
);
"#;

/// SQLite implementation of `ReconciliationStore`.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (or create) the database at `db_path`, enable WAL and run the
    /// embedded schema.
    pub fn open(db_path: &str) -> Result<Self, StoreError> {
        let conn = Connection::open(db_path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.execute_batch(SCHEMA)?;
        log::info!("📊 Opened reconciliation store: {} (WAL)", db_path);
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Out-of-band catalog setup; not part of the ingestion surface.
    pub fn seed_collection(&self, collection: &Collection) -> Result<(), StoreError> {
        let conn = self.lock();
        conn.execute(
            r#"
            INSERT INTO collections (
                contract_hash, contract_package_hash, slug, name, symbol,
                description, image, twitter, discord, website
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(contract_hash) DO UPDATE SET
                name = excluded.name,
                symbol = excluded.symbol,
                description = excluded.description,
                image = excluded.image,
                twitter = excluded.twitter,
                discord = excluded.discord,
                website = excluded.website
            "#,
            params![
                collection.contract_hash,
                collection.contract_package_hash,
                collection.slug,
                collection.name,
                collection.symbol,
                collection.description,
                collection.image,
                collection.twitter,
                collection.discord,
                collection.website,
            ],
        )?;
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        // Poisoning only happens if a holder panicked; propagating the panic
        // is the right outcome for a writer that shares one connection
        self.conn.lock().unwrap()
    }

    fn sell_order_from_row(row: &Row<'_>) -> rusqlite::Result<SellOrder> {
        let status_raw: String = row.get("status")?;
        Ok(SellOrder {
            creator: row.get("creator")?,
            contract_hash: row.get("contract_hash")?,
            token_id: row.get("token_id")?,
            start_time: row.get::<_, i64>("start_time")? as u64,
            pay_token: row.get("pay_token")?,
            price: row.get("price")?,
            buyer: row.get("buyer")?,
            additional_recipient: row.get("additional_recipient")?,
            status: OrderStatus::from_str(&status_raw).unwrap_or(OrderStatus::Pending),
            created_deploy_hash: row.get("created_deploy_hash")?,
            last_applied_block_height: row.get::<_, i64>("last_applied_block_height")? as u64,
        })
    }

    fn buy_order_from_row(row: &Row<'_>) -> rusqlite::Result<BuyOrder> {
        Ok(BuyOrder {
            creator: row.get("creator")?,
            collection: row.get("collection")?,
            token_id: row.get("token_id")?,
            owner: row.get("owner")?,
            pay_token: row.get("pay_token")?,
            price: row.get("price")?,
            start_time: row.get::<_, i64>("start_time")? as u64,
            additional_recipient: row.get("additional_recipient")?,
            deploy_hash: row.get("deploy_hash")?,
            block_height: row.get::<_, i64>("block_height")? as u64,
        })
    }

    fn asset_from_row(row: &Row<'_>) -> rusqlite::Result<Asset> {
        Ok(Asset {
            contract_hash: row.get("contract_hash")?,
            token_id: row.get("token_id")?,
            owner: row.get("owner")?,
            mint_date: row.get("mint_date")?,
            metadata: row.get("metadata")?,
            last_applied_block_height: row.get::<_, i64>("last_applied_block_height")? as u64,
        })
    }
}

/// Stored-vs-expected height comparison shared by both upserts.
fn check_expectation(
    entity: &'static str,
    stored: Option<u64>,
    expected: Option<u64>,
) -> Result<(), StoreError> {
    if stored == expected {
        Ok(())
    } else {
        Err(StoreError::Conflict {
            entity,
            expected,
            found: stored,
        })
    }
}

#[async_trait]
impl ReconciliationStore for SqliteStore {
    async fn get_sell_order(&self, key: &OrderKey) -> Result<Option<SellOrder>, StoreError> {
        let conn = self.lock();
        let order = conn
            .query_row(
                "SELECT * FROM sell_orders
                 WHERE creator = ? AND contract_hash = ? AND token_id = ? AND start_time = ?",
                params![key.creator, key.contract_hash, key.token_id, key.start_time as i64],
                Self::sell_order_from_row,
            )
            .optional()?;
        Ok(order)
    }

    async fn pending_sell_order(
        &self,
        creator: &str,
        contract_hash: &str,
        token_id: &str,
    ) -> Result<Option<SellOrder>, StoreError> {
        let conn = self.lock();
        let order = conn
            .query_row(
                "SELECT * FROM sell_orders
                 WHERE creator = ? AND contract_hash = ? AND token_id = ? AND status = 'pending'
                 ORDER BY start_time DESC
                 LIMIT 1",
                params![creator, contract_hash, token_id],
                Self::sell_order_from_row,
            )
            .optional()?;
        Ok(order)
    }

    async fn upsert_sell_order(
        &self,
        order: &SellOrder,
        expected_last_height: Option<u64>,
    ) -> Result<(), StoreError> {
        let conn = self.lock();

        let stored: Option<u64> = conn
            .query_row(
                "SELECT last_applied_block_height FROM sell_orders
                 WHERE creator = ? AND contract_hash = ? AND token_id = ? AND start_time = ?",
                params![
                    order.creator,
                    order.contract_hash,
                    order.token_id,
                    order.start_time as i64
                ],
                |row| row.get::<_, i64>(0).map(|h| h as u64),
            )
            .optional()?;
        check_expectation("sell_order", stored, expected_last_height)?;

        let now = chrono::Utc::now().timestamp();
        conn.execute(
            r#"
            INSERT INTO sell_orders (
                creator, contract_hash, token_id, start_time,
                pay_token, price, buyer, additional_recipient, status,
                created_deploy_hash, last_applied_block_height,
                updated_at, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(creator, contract_hash, token_id, start_time) DO UPDATE SET
                pay_token = excluded.pay_token,
                price = excluded.price,
                buyer = excluded.buyer,
                additional_recipient = excluded.additional_recipient,
                status = excluded.status,
                created_deploy_hash = excluded.created_deploy_hash,
                last_applied_block_height = excluded.last_applied_block_height,
                updated_at = excluded.updated_at
            "#,
            params![
                order.creator,
                order.contract_hash,
                order.token_id,
                order.start_time as i64,
                order.pay_token,
                order.price,
                order.buyer,
                order.additional_recipient,
                order.status.as_str(),
                order.created_deploy_hash,
                order.last_applied_block_height as i64,
                now,
                now,
            ],
        )?;
        Ok(())
    }

    async fn append_buy_order(&self, order: &BuyOrder) -> Result<(), StoreError> {
        let conn = self.lock();
        let now = chrono::Utc::now().timestamp();
        // UNIQUE(deploy_hash) + OR IGNORE collapses at-least-once replays
        conn.execute(
            r#"
            INSERT OR IGNORE INTO buy_orders (
                creator, collection, token_id, owner, pay_token, price,
                start_time, additional_recipient, deploy_hash, block_height, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                order.creator,
                order.collection,
                order.token_id,
                order.owner,
                order.pay_token,
                order.price,
                order.start_time as i64,
                order.additional_recipient,
                order.deploy_hash,
                order.block_height as i64,
                now,
            ],
        )?;
        Ok(())
    }

    async fn buy_orders_for_token(
        &self,
        collection: &str,
        token_id: &str,
    ) -> Result<Vec<BuyOrder>, StoreError> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT * FROM buy_orders WHERE collection = ? AND token_id = ? ORDER BY id",
        )?;
        let orders = stmt
            .query_map(params![collection, token_id], Self::buy_order_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(orders)
    }

    async fn get_asset(&self, key: &AssetKey) -> Result<Option<Asset>, StoreError> {
        let conn = self.lock();
        let asset = conn
            .query_row(
                "SELECT * FROM assets WHERE contract_hash = ? AND token_id = ?",
                params![key.contract_hash, key.token_id],
                Self::asset_from_row,
            )
            .optional()?;
        Ok(asset)
    }

    async fn upsert_asset(
        &self,
        asset: &Asset,
        expected_last_height: Option<u64>,
    ) -> Result<(), StoreError> {
        let conn = self.lock();

        let stored: Option<u64> = conn
            .query_row(
                "SELECT last_applied_block_height FROM assets
                 WHERE contract_hash = ? AND token_id = ?",
                params![asset.contract_hash, asset.token_id],
                |row| row.get::<_, i64>(0).map(|h| h as u64),
            )
            .optional()?;
        check_expectation("asset", stored, expected_last_height)?;

        let now = chrono::Utc::now().timestamp();
        conn.execute(
            r#"
            INSERT INTO assets (
                contract_hash, token_id, owner, mint_date, metadata,
                last_applied_block_height, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(contract_hash, token_id) DO UPDATE SET
                owner = excluded.owner,
                mint_date = excluded.mint_date,
                metadata = excluded.metadata,
                last_applied_block_height = excluded.last_applied_block_height,
                updated_at = excluded.updated_at
            "#,
            params![
                asset.contract_hash,
                asset.token_id,
                asset.owner,
                asset.mint_date,
                asset.metadata,
                asset.last_applied_block_height as i64,
                now,
            ],
        )?;
        Ok(())
    }

    async fn get_collection(&self, contract_hash: &str) -> Result<Option<Collection>, StoreError> {
        let conn = self.lock();
        let collection = conn
            .query_row(
                "SELECT * FROM collections WHERE contract_hash = ?",
                params![contract_hash],
                |row| {
                    Ok(Collection {
                        contract_hash: row.get("contract_hash")?,
                        contract_package_hash: row.get("contract_package_hash")?,
                        slug: row.get("slug")?,
                        name: row.get("name")?,
                        symbol: row.get("symbol")?,
                        description: row.get("description")?,
                        image: row.get("image")?,
                        twitter: row.get("twitter")?,
                        discord: row.get("discord")?,
                        website: row.get("website")?,
                    })
                },
            )
            .optional()?;
        Ok(collection)
    }

    async fn checkpoint(&self, contract_package_hash: &str) -> Result<Option<u64>, StoreError> {
        let conn = self.lock();
        let height = conn
            .query_row(
                "SELECT block_height FROM checkpoints WHERE contract_package_hash = ?",
                params![contract_package_hash],
                |row| row.get::<_, i64>(0).map(|h| h as u64),
            )
            .optional()?;
        Ok(height)
    }

    async fn save_checkpoint(
        &self,
        contract_package_hash: &str,
        block_height: u64,
    ) -> Result<(), StoreError> {
        let conn = self.lock();
        let now = chrono::Utc::now().timestamp();
        conn.execute(
            r#"
            INSERT INTO checkpoints (contract_package_hash, block_height, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(contract_package_hash) DO UPDATE SET
                block_height = excluded.block_height,
                updated_at = excluded.updated_at
            WHERE excluded.block_height > checkpoints.block_height
            "#,
            params![contract_package_hash, block_height as i64, now],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn create_test_store() -> (NamedTempFile, SqliteStore) {
        let temp_file = NamedTempFile::new().unwrap();
        let store = SqliteStore::open(temp_file.path().to_str().unwrap()).unwrap();
        (temp_file, store)
    }

    fn make_order(token_id: &str, height: u64) -> SellOrder {
        SellOrder {
            creator: "seller-1".to_string(),
            contract_hash: "contract-nft".to_string(),
            token_id: token_id.to_string(),
            pay_token: None,
            price: "1000000000".to_string(),
            start_time: 1_700_000_000,
            buyer: None,
            additional_recipient: None,
            status: OrderStatus::Pending,
            created_deploy_hash: "deploy-1".to_string(),
            last_applied_block_height: height,
        }
    }

    fn make_asset(token_id: &str, owner: &str, height: u64) -> Asset {
        Asset {
            contract_hash: "contract-nft".to_string(),
            token_id: token_id.to_string(),
            owner: owner.to_string(),
            mint_date: 1_699_999_000,
            metadata: "{}".to_string(),
            last_applied_block_height: height,
        }
    }

    #[tokio::test]
    async fn test_sell_order_round_trip() {
        let (_temp, store) = create_test_store();
        let order = make_order("7", 10);

        store.upsert_sell_order(&order, None).await.unwrap();

        let loaded = store.get_sell_order(&order.key()).await.unwrap().unwrap();
        assert_eq!(loaded, order);
        assert_eq!(loaded.last_applied_block_height, 10);
    }

    #[tokio::test]
    async fn test_upsert_with_matching_expectation() {
        let (_temp, store) = create_test_store();
        let order = make_order("7", 10);
        store.upsert_sell_order(&order, None).await.unwrap();

        let mut updated = order.clone();
        updated.status = OrderStatus::Succeeded;
        updated.buyer = Some("buyer-b".to_string());
        updated.last_applied_block_height = 11;

        store.upsert_sell_order(&updated, Some(10)).await.unwrap();

        let loaded = store.get_sell_order(&order.key()).await.unwrap().unwrap();
        assert_eq!(loaded.status, OrderStatus::Succeeded);
        assert_eq!(loaded.last_applied_block_height, 11);
    }

    #[tokio::test]
    async fn test_stale_expectation_conflicts() {
        let (_temp, store) = create_test_store();
        let order = make_order("7", 10);
        store.upsert_sell_order(&order, None).await.unwrap();

        // Another pass already advanced the row to height 10; a writer that
        // read height 9 must lose
        let mut stale = order.clone();
        stale.last_applied_block_height = 12;
        let err = store.upsert_sell_order(&stale, Some(9)).await.unwrap_err();
        assert!(err.is_conflict());

        // Believing the row is new when it exists is also a conflict
        let err = store.upsert_sell_order(&stale, None).await.unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn test_asset_round_trip_and_conflict() {
        let (_temp, store) = create_test_store();
        let asset = make_asset("3", "owner-a", 1);
        store.upsert_asset(&asset, None).await.unwrap();

        let loaded = store.get_asset(&asset.key()).await.unwrap().unwrap();
        assert_eq!(loaded, asset);

        let mut moved = asset.clone();
        moved.owner = "owner-c".to_string();
        moved.last_applied_block_height = 2;
        store.upsert_asset(&moved, Some(1)).await.unwrap();

        let err = store.upsert_asset(&moved, Some(1)).await.unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn test_buy_order_append_collapses_replay() {
        let (_temp, store) = create_test_store();
        let order = BuyOrder {
            creator: "bidder-1".to_string(),
            collection: "contract-nft".to_string(),
            token_id: "9".to_string(),
            owner: "seller-1".to_string(),
            pay_token: None,
            price: "250".to_string(),
            start_time: 1_700_000_500,
            additional_recipient: None,
            deploy_hash: "deploy-b".to_string(),
            block_height: 20,
        };

        store.append_buy_order(&order).await.unwrap();
        store.append_buy_order(&order).await.unwrap();

        let orders = store
            .buy_orders_for_token("contract-nft", "9")
            .await
            .unwrap();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0], order);
    }

    #[tokio::test]
    async fn test_pending_sell_order_lookup() {
        let (_temp, store) = create_test_store();

        let mut closed = make_order("7", 10);
        closed.start_time = 1_600_000_000;
        closed.status = OrderStatus::Canceled;
        store.upsert_sell_order(&closed, None).await.unwrap();

        let open = make_order("7", 12);
        store.upsert_sell_order(&open, None).await.unwrap();

        let found = store
            .pending_sell_order("seller-1", "contract-nft", "7")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.start_time, open.start_time);
        assert_eq!(found.status, OrderStatus::Pending);
    }

    #[tokio::test]
    async fn test_checkpoint_round_trip_and_monotonicity() {
        let (_temp, store) = create_test_store();
        let pkg = "5ede076610dedae5ec3aa581efcc9548c8a141350ce5b9713d87ed5d9bc56954";

        assert_eq!(store.checkpoint(pkg).await.unwrap(), None);

        store.save_checkpoint(pkg, 100).await.unwrap();
        assert_eq!(store.checkpoint(pkg).await.unwrap(), Some(100));

        // Re-delivered older height never moves the cursor backwards
        store.save_checkpoint(pkg, 90).await.unwrap();
        assert_eq!(store.checkpoint(pkg).await.unwrap(), Some(100));

        store.save_checkpoint(pkg, 120).await.unwrap();
        assert_eq!(store.checkpoint(pkg).await.unwrap(), Some(120));
    }

    #[tokio::test]
    async fn test_collection_seed_and_read() {
        let (_temp, store) = create_test_store();
        let collection = Collection {
            contract_hash: "contract-nft".to_string(),
            contract_package_hash: "package-nft".to_string(),
            slug: "kunft".to_string(),
            name: "KUNFT".to_string(),
            symbol: "KNFT".to_string(),
            description: "test collection".to_string(),
            image: "https://example.com/kunft.png".to_string(),
            twitter: None,
            discord: None,
            website: Some("https://example.com".to_string()),
        };

        store.seed_collection(&collection).unwrap();
        // Seeding again with the same hashes must not fail
        store.seed_collection(&collection).unwrap();

        let loaded = store
            .get_collection("contract-nft")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded, collection);
    }
}

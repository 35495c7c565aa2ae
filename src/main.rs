//! Marketflow - chain-event ingestion and order-book reconciliation engine
//!
//! Consumes a marketplace contract's processed-deploy event feed, decodes the
//! events it recognizes, and maintains a consistent off-chain projection of
//! sell orders, buy orders and token ownership in SQLite.
//!
//! Pipeline:
//!
//! ```text
//! EventSource (feed) → parser → projector → ReconciliationStore (SQLite)
//!                          └── driven by IngestionCoordinator ──┘
//! ```
//!
//! Delivery from the feed is at-least-once and may reorder across reconnect
//! boundaries, so every projection rule is idempotent and discards updates
//! whose block height is not newer than the entity's last applied height.


pub mod backoff;
pub mod config;
pub mod coordinator;
pub mod events;
pub mod parser;
pub mod projector;
pub mod source;
pub mod store;

pub use config::{ConfigError, IngestConfig};
pub use coordinator::{CoordinatorError, CoordinatorState, IngestionCoordinator};
pub use events::{ChainEvent, DomainEvent};
pub use parser::{parse_chain_event, EventFilter, ParseError};
pub use projector::{apply, Asset, AssetKey, BuyOrder, OrderKey, OrderStatus, SellOrder, Snapshot};
pub use source::{EventSource, JsonlEventSource, ScriptedEventSource, TransportError};
pub use store::{Collection, ReconciliationStore, SqliteStore, StoreError};

//! Event types flowing through the ingestion pipeline
//!
//! `ChainEvent` is the raw envelope as delivered by the event feed (one per
//! emitted contract event inside a processed deploy). `DomainEvent` is the
//! closed set of marketplace/token events the projector knows how to apply.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Raw event envelope as observed on the processed-deploy stream.
///
/// Immutable once observed. `raw_payload` is the undecoded field map of the
/// contract event; decoding happens in the parser so that a schema mismatch
/// is a parse-time decision, not a runtime surprise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainEvent {
    /// Hash of the deploy that emitted this event (64 hex chars)
    pub deploy_hash: String,
    /// Height of the block the deploy was included in
    pub block_height: u64,
    /// Block timestamp, unix seconds
    pub timestamp: i64,
    /// Stable contract package hash of the emitting contract
    pub contract_package_hash: String,
    /// Contract-defined event name (e.g. "SellOrderCreated", "Mint")
    pub event_name: String,
    /// Undecoded event field map
    pub raw_payload: Value,
}

/// Typed marketplace/token events the projector applies.
///
/// Every variant carries the originating deploy hash (for duplicate-delivery
/// no-ops) and block height (for the stale-update tie-break). Prices and
/// start times stay as fixed-precision decimal strings; monetary values are
/// never floats.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DomainEvent {
    SellOrderCreated {
        deploy_hash: String,
        block_height: u64,
        creator: String,
        contract_hash: String,
        token_id: String,
        pay_token: Option<String>,
        price: String,
        start_time: u64,
    },
    SellOrderCancelled {
        deploy_hash: String,
        block_height: u64,
        creator: String,
        contract_hash: String,
        token_id: String,
    },
    SellOrderAccepted {
        deploy_hash: String,
        block_height: u64,
        creator: String,
        contract_hash: String,
        token_id: String,
        buyer: String,
        additional_recipient: Option<String>,
    },
    BuyOrderCreated {
        deploy_hash: String,
        block_height: u64,
        creator: String,
        collection: String,
        token_id: String,
        owner: String,
        pay_token: Option<String>,
        price: String,
        start_time: u64,
        additional_recipient: Option<String>,
    },
    TokenMinted {
        deploy_hash: String,
        block_height: u64,
        contract_hash: String,
        token_id: String,
        recipient: String,
        mint_date: i64,
        metadata: String,
    },
    TokenTransferred {
        deploy_hash: String,
        block_height: u64,
        contract_hash: String,
        token_id: String,
        recipient: String,
    },
}

impl DomainEvent {
    pub fn deploy_hash(&self) -> &str {
        match self {
            DomainEvent::SellOrderCreated { deploy_hash, .. }
            | DomainEvent::SellOrderCancelled { deploy_hash, .. }
            | DomainEvent::SellOrderAccepted { deploy_hash, .. }
            | DomainEvent::BuyOrderCreated { deploy_hash, .. }
            | DomainEvent::TokenMinted { deploy_hash, .. }
            | DomainEvent::TokenTransferred { deploy_hash, .. } => deploy_hash,
        }
    }

    pub fn block_height(&self) -> u64 {
        match self {
            DomainEvent::SellOrderCreated { block_height, .. }
            | DomainEvent::SellOrderCancelled { block_height, .. }
            | DomainEvent::SellOrderAccepted { block_height, .. }
            | DomainEvent::BuyOrderCreated { block_height, .. }
            | DomainEvent::TokenMinted { block_height, .. }
            | DomainEvent::TokenTransferred { block_height, .. } => *block_height,
        }
    }

    /// Event name as it appears on the wire, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            DomainEvent::SellOrderCreated { .. } => "SellOrderCreated",
            DomainEvent::SellOrderCancelled { .. } => "SellOrderCancelled",
            DomainEvent::SellOrderAccepted { .. } => "SellOrderAccepted",
            DomainEvent::BuyOrderCreated { .. } => "BuyOrderCreated",
            DomainEvent::TokenMinted { .. } => "Mint",
            DomainEvent::TokenTransferred { .. } => "Transfer",
        }
    }
}

//! Order-book projection: pure application of domain events
//!
//! `apply` is a pure function from (snapshot, event) to a new snapshot so it
//! can be tested in isolation and re-run safely during backfill. The feed is
//! at-least-once and may reorder across reconnects, so every rule is
//! idempotent and discards updates whose block height is not greater than the
//! entity's last applied height.

use crate::events::DomainEvent;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Sell order lifecycle. Transitions only leave `Pending`, never re-enter it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Pending,
    Succeeded,
    Canceled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Succeeded => "succeeded",
            OrderStatus::Canceled => "canceled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(OrderStatus::Pending),
            "succeeded" => Some(OrderStatus::Succeeded),
            "canceled" => Some(OrderStatus::Canceled),
            _ => None,
        }
    }
}

/// Natural key of a sell order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OrderKey {
    pub creator: String,
    pub contract_hash: String,
    pub token_id: String,
    pub start_time: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SellOrder {
    pub creator: String,
    pub contract_hash: String,
    pub token_id: String,
    pub pay_token: Option<String>,
    /// Fixed-precision decimal string, never a float
    pub price: String,
    pub start_time: u64,
    pub buyer: Option<String>,
    pub additional_recipient: Option<String>,
    pub status: OrderStatus,
    /// Deploy that created the order, for duplicate-delivery no-ops
    pub created_deploy_hash: String,
    pub last_applied_block_height: u64,
}

impl SellOrder {
    pub fn key(&self) -> OrderKey {
        OrderKey {
            creator: self.creator.clone(),
            contract_hash: self.contract_hash.clone(),
            token_id: self.token_id.clone(),
            start_time: self.start_time,
        }
    }
}

/// Append-only buy offer. No mutation is defined for these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuyOrder {
    pub creator: String,
    pub collection: String,
    pub token_id: String,
    pub owner: String,
    pub pay_token: Option<String>,
    pub price: String,
    pub start_time: u64,
    pub additional_recipient: Option<String>,
    pub deploy_hash: String,
    pub block_height: u64,
}

/// Natural key of a token asset.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AssetKey {
    pub contract_hash: String,
    pub token_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    pub contract_hash: String,
    pub token_id: String,
    pub owner: String,
    /// Unix seconds; 0 when the asset was first observed through a transfer
    /// or sale rather than its mint event
    pub mint_date: i64,
    pub metadata: String,
    pub last_applied_block_height: u64,
}

impl Asset {
    pub fn key(&self) -> AssetKey {
        AssetKey {
            contract_hash: self.contract_hash.clone(),
            token_id: self.token_id.clone(),
        }
    }
}

/// Scoped view of the entities a single event can touch.
///
/// The coordinator loads the relevant entities from the store, applies the
/// event, and writes back what changed. The projector itself holds no state
/// across calls.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub sell_orders: BTreeMap<OrderKey, SellOrder>,
    pub buy_orders: Vec<BuyOrder>,
    pub assets: BTreeMap<AssetKey, Asset>,
}

/// Apply one domain event to a snapshot, returning the new snapshot.
///
/// Applying the same event twice yields the same snapshot as applying it
/// once, and an event whose block height is not greater than the entity's
/// last applied height is discarded.
pub fn apply(snapshot: &Snapshot, event: &DomainEvent) -> Snapshot {
    let mut next = snapshot.clone();

    match event {
        DomainEvent::SellOrderCreated {
            deploy_hash,
            block_height,
            creator,
            contract_hash,
            token_id,
            pay_token,
            price,
            start_time,
        } => {
            let key = OrderKey {
                creator: creator.clone(),
                contract_hash: contract_hash.clone(),
                token_id: token_id.clone(),
                start_time: *start_time,
            };
            if let Some(existing) = next.sell_orders.get(&key) {
                // Replay of the creating deploy, an older observation, or a
                // collision with a closed order: succeeded and canceled are
                // terminal and a later create must not reopen them
                if existing.created_deploy_hash == *deploy_hash
                    || *block_height <= existing.last_applied_block_height
                    || existing.status != OrderStatus::Pending
                {
                    return next;
                }
            }
            next.sell_orders.insert(
                key,
                SellOrder {
                    creator: creator.clone(),
                    contract_hash: contract_hash.clone(),
                    token_id: token_id.clone(),
                    pay_token: pay_token.clone(),
                    price: price.clone(),
                    start_time: *start_time,
                    buyer: None,
                    additional_recipient: None,
                    status: OrderStatus::Pending,
                    created_deploy_hash: deploy_hash.clone(),
                    last_applied_block_height: *block_height,
                },
            );
        }

        DomainEvent::SellOrderCancelled {
            block_height,
            creator,
            contract_hash,
            token_id,
            ..
        } => {
            if let Some(order) =
                find_pending_order(&mut next, creator, contract_hash, token_id, *block_height)
            {
                order.status = OrderStatus::Canceled;
                order.last_applied_block_height = *block_height;
            }
        }

        DomainEvent::SellOrderAccepted {
            block_height,
            creator,
            contract_hash,
            token_id,
            buyer,
            additional_recipient,
            ..
        } => {
            let accepted =
                match find_pending_order(&mut next, creator, contract_hash, token_id, *block_height)
                {
                    Some(order) => {
                        order.status = OrderStatus::Succeeded;
                        order.buyer = Some(buyer.clone());
                        order.additional_recipient = additional_recipient.clone();
                        order.last_applied_block_height = *block_height;
                        true
                    }
                    None => false,
                };

            // Sale side-effect: ownership moves to the buyer
            if accepted {
                transfer_ownership(&mut next, contract_hash, token_id, buyer, *block_height);
            }
        }

        DomainEvent::BuyOrderCreated {
            deploy_hash,
            block_height,
            creator,
            collection,
            token_id,
            owner,
            pay_token,
            price,
            start_time,
            additional_recipient,
        } => {
            // Append-only; the deploy hash collapses at-least-once replays
            if next.buy_orders.iter().any(|b| b.deploy_hash == *deploy_hash) {
                return next;
            }
            next.buy_orders.push(BuyOrder {
                creator: creator.clone(),
                collection: collection.clone(),
                token_id: token_id.clone(),
                owner: owner.clone(),
                pay_token: pay_token.clone(),
                price: price.clone(),
                start_time: *start_time,
                additional_recipient: additional_recipient.clone(),
                deploy_hash: deploy_hash.clone(),
                block_height: *block_height,
            });
        }

        DomainEvent::TokenMinted {
            block_height,
            contract_hash,
            token_id,
            recipient,
            mint_date,
            metadata,
            ..
        } => {
            let key = AssetKey {
                contract_hash: contract_hash.clone(),
                token_id: token_id.clone(),
            };
            // Duplicate token id for the same contract is a no-op; a replayed
            // mint must not clobber ownership set by a later transfer
            if next.assets.contains_key(&key) {
                return next;
            }
            next.assets.insert(
                key,
                Asset {
                    contract_hash: contract_hash.clone(),
                    token_id: token_id.clone(),
                    owner: recipient.clone(),
                    mint_date: *mint_date,
                    metadata: metadata.clone(),
                    last_applied_block_height: *block_height,
                },
            );
        }

        DomainEvent::TokenTransferred {
            block_height,
            contract_hash,
            token_id,
            recipient,
            ..
        } => {
            transfer_ownership(&mut next, contract_hash, token_id, recipient, *block_height);
        }
    }

    next
}

/// Locate the pending order for (creator, contract, token) that a cancel or
/// accept event addresses, honoring the block-height tie-break. Orders that
/// already left `Pending` ignore further mutation events.
fn find_pending_order<'a>(
    snapshot: &'a mut Snapshot,
    creator: &str,
    contract_hash: &str,
    token_id: &str,
    block_height: u64,
) -> Option<&'a mut SellOrder> {
    snapshot.sell_orders.values_mut().find(|order| {
        order.status == OrderStatus::Pending
            && order.creator == creator
            && order.contract_hash == contract_hash
            && order.token_id == token_id
            && block_height > order.last_applied_block_height
    })
}

/// Last-write-wins ownership update by block height. An asset first observed
/// through a transfer or a sale (mint not yet seen after a gap) is created
/// with what is known.
fn transfer_ownership(
    snapshot: &mut Snapshot,
    contract_hash: &str,
    token_id: &str,
    new_owner: &str,
    block_height: u64,
) {
    let key = AssetKey {
        contract_hash: contract_hash.to_string(),
        token_id: token_id.to_string(),
    };
    match snapshot.assets.get_mut(&key) {
        Some(asset) => {
            if block_height > asset.last_applied_block_height {
                asset.owner = new_owner.to_string();
                asset.last_applied_block_height = block_height;
            }
        }
        None => {
            snapshot.assets.insert(
                key,
                Asset {
                    contract_hash: contract_hash.to_string(),
                    token_id: token_id.to_string(),
                    owner: new_owner.to_string(),
                    mint_date: 0,
                    metadata: String::new(),
                    last_applied_block_height: block_height,
                },
            );
        }
    }
}

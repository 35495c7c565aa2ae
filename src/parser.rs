//! Decoding of raw chain events into typed domain events
//!
//! Filtering (wrong contract package, event name not on the allow-list) is
//! the common case and yields `Ok(None)`. A payload that *matches* the filter
//! but fails structural decoding is a `ParseError` - that indicates a schema
//! mismatch between the deployed contract and this parser and is surfaced,
//! never silently dropped.

use crate::events::{ChainEvent, DomainEvent};
use serde_json::{Map, Value};

/// Marketplace contract event names handled by the projector.
pub const MARKETPLACE_EVENTS: &[&str] = &[
    "SellOrderCreated",
    "SellOrderCancelled",
    "SellOrderAccepted",
    "BuyOrderCreated",
];

/// Token (CEP-47 style) contract event names handled by the projector.
pub const TOKEN_EVENTS: &[&str] = &["Mint", "Transfer"];

/// Per-subscription event filter: one contract package hash plus the event
/// names worth decoding for it.
#[derive(Debug, Clone)]
pub struct EventFilter {
    pub contract_package_hash: String,
    pub event_names: Vec<String>,
}

impl EventFilter {
    pub fn new(contract_package_hash: impl Into<String>, event_names: Vec<String>) -> Self {
        Self {
            contract_package_hash: contract_package_hash.into(),
            event_names,
        }
    }

    /// Filter allowing every event name this parser understands.
    pub fn all_events(contract_package_hash: impl Into<String>) -> Self {
        let event_names = MARKETPLACE_EVENTS
            .iter()
            .chain(TOKEN_EVENTS.iter())
            .map(|s| s.to_string())
            .collect();
        Self::new(contract_package_hash, event_names)
    }

    pub fn matches(&self, event: &ChainEvent) -> bool {
        event.contract_package_hash == self.contract_package_hash
            && self.event_names.iter().any(|n| n == &event.event_name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParseError {
    /// Payload is not a JSON object (field map)
    PayloadNotObject(String),
    /// A required field is absent from the payload
    MissingField { event: String, field: &'static str },
    /// A field is present but structurally invalid
    InvalidField {
        event: String,
        field: &'static str,
        reason: String,
    },
    /// Event name passed the allow-list but the parser has no decoder for it
    UnknownEventTag(String),
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::PayloadNotObject(event) => {
                write!(f, "{}: payload is not a field map", event)
            }
            ParseError::MissingField { event, field } => {
                write!(f, "{}: missing field '{}'", event, field)
            }
            ParseError::InvalidField {
                event,
                field,
                reason,
            } => write!(f, "{}: invalid field '{}': {}", event, field, reason),
            ParseError::UnknownEventTag(name) => {
                write!(f, "no decoder for allow-listed event '{}'", name)
            }
        }
    }
}

impl std::error::Error for ParseError {}

/// Decode a raw chain event against a filter.
///
/// Returns `Ok(None)` when the event does not match the filter (expected,
/// common), `Ok(Some(..))` on a successful decode, and `Err(ParseError)`
/// when a matching payload fails structural decoding.
pub fn parse_chain_event(
    filter: &EventFilter,
    event: &ChainEvent,
) -> Result<Option<DomainEvent>, ParseError> {
    if !filter.matches(event) {
        return Ok(None);
    }

    let fields = event
        .raw_payload
        .as_object()
        .ok_or_else(|| ParseError::PayloadNotObject(event.event_name.clone()))?;

    let parsed = match event.event_name.as_str() {
        "SellOrderCreated" => DomainEvent::SellOrderCreated {
            deploy_hash: event.deploy_hash.clone(),
            block_height: event.block_height,
            creator: require_str(fields, &event.event_name, "creator")?,
            contract_hash: require_str(fields, &event.event_name, "collection")?,
            token_id: require_str(fields, &event.event_name, "token_id")?,
            pay_token: optional_str(fields, "pay_token"),
            price: require_decimal(fields, &event.event_name, "price")?,
            start_time: require_u64(fields, &event.event_name, "start_time")?,
        },
        "SellOrderCancelled" => DomainEvent::SellOrderCancelled {
            deploy_hash: event.deploy_hash.clone(),
            block_height: event.block_height,
            creator: require_str(fields, &event.event_name, "creator")?,
            contract_hash: require_str(fields, &event.event_name, "collection")?,
            token_id: require_str(fields, &event.event_name, "token_id")?,
        },
        "SellOrderAccepted" => DomainEvent::SellOrderAccepted {
            deploy_hash: event.deploy_hash.clone(),
            block_height: event.block_height,
            creator: require_str(fields, &event.event_name, "creator")?,
            contract_hash: require_str(fields, &event.event_name, "collection")?,
            token_id: require_str(fields, &event.event_name, "token_id")?,
            buyer: require_str(fields, &event.event_name, "buyer")?,
            additional_recipient: optional_str(fields, "additional_recipient"),
        },
        "BuyOrderCreated" => DomainEvent::BuyOrderCreated {
            deploy_hash: event.deploy_hash.clone(),
            block_height: event.block_height,
            creator: require_str(fields, &event.event_name, "creator")?,
            collection: require_str(fields, &event.event_name, "collection")?,
            token_id: require_str(fields, &event.event_name, "token_id")?,
            owner: require_str(fields, &event.event_name, "owner")?,
            pay_token: optional_str(fields, "pay_token"),
            price: require_decimal(fields, &event.event_name, "price")?,
            start_time: require_u64(fields, &event.event_name, "start_time")?,
            additional_recipient: optional_str(fields, "additional_recipient"),
        },
        "Mint" => DomainEvent::TokenMinted {
            deploy_hash: event.deploy_hash.clone(),
            block_height: event.block_height,
            contract_hash: event.contract_package_hash.clone(),
            token_id: require_str(fields, &event.event_name, "token_id")?,
            recipient: require_str(fields, &event.event_name, "recipient")?,
            mint_date: event.timestamp,
            metadata: optional_str(fields, "token_meta").unwrap_or_default(),
        },
        "Transfer" => DomainEvent::TokenTransferred {
            deploy_hash: event.deploy_hash.clone(),
            block_height: event.block_height,
            contract_hash: event.contract_package_hash.clone(),
            token_id: require_str(fields, &event.event_name, "token_id")?,
            recipient: require_str(fields, &event.event_name, "recipient")?,
        },
        other => return Err(ParseError::UnknownEventTag(other.to_string())),
    };

    Ok(Some(parsed))
}

fn require_str(
    fields: &Map<String, Value>,
    event: &str,
    field: &'static str,
) -> Result<String, ParseError> {
    match fields.get(field) {
        Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
        Some(Value::String(_)) => Err(ParseError::InvalidField {
            event: event.to_string(),
            field,
            reason: "empty string".to_string(),
        }),
        Some(other) => Err(ParseError::InvalidField {
            event: event.to_string(),
            field,
            reason: format!("expected string, got {}", json_kind(other)),
        }),
        None => Err(ParseError::MissingField {
            event: event.to_string(),
            field,
        }),
    }
}

/// An absent key or JSON null both read as "not set".
fn optional_str(fields: &Map<String, Value>, field: &'static str) -> Option<String> {
    match fields.get(field) {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

/// Monetary amounts arrive as fixed-precision decimal strings and stay that
/// way; only the digit-string shape is validated here.
fn require_decimal(
    fields: &Map<String, Value>,
    event: &str,
    field: &'static str,
) -> Result<String, ParseError> {
    let raw = require_str(fields, event, field)?;
    if raw.bytes().all(|b| b.is_ascii_digit()) {
        Ok(raw)
    } else {
        Err(ParseError::InvalidField {
            event: event.to_string(),
            field,
            reason: format!("expected decimal digit string, got '{}'", raw),
        })
    }
}

/// Timestamps are emitted either as JSON numbers or as decimal strings
/// depending on the SDK that serialized the deploy; accept both.
fn require_u64(
    fields: &Map<String, Value>,
    event: &str,
    field: &'static str,
) -> Result<u64, ParseError> {
    match fields.get(field) {
        Some(Value::Number(n)) => n.as_u64().ok_or_else(|| ParseError::InvalidField {
            event: event.to_string(),
            field,
            reason: format!("expected unsigned integer, got {}", n),
        }),
        Some(Value::String(s)) => s.parse::<u64>().map_err(|_| ParseError::InvalidField {
            event: event.to_string(),
            field,
            reason: format!("expected unsigned integer, got '{}'", s),
        }),
        Some(other) => Err(ParseError::InvalidField {
            event: event.to_string(),
            field,
            reason: format!("expected unsigned integer, got {}", json_kind(other)),
        }),
        None => Err(ParseError::MissingField {
            event: event.to_string(),
            field,
        }),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const PKG: &str = "5ede076610dedae5ec3aa581efcc9548c8a141350ce5b9713d87ed5d9bc56954";

    fn make_event(name: &str, payload: serde_json::Value) -> ChainEvent {
        ChainEvent {
            deploy_hash: "ab".repeat(32),
            block_height: 42,
            timestamp: 1_700_000_000,
            contract_package_hash: PKG.to_string(),
            event_name: name.to_string(),
            raw_payload: payload,
        }
    }

    #[test]
    fn test_non_matching_package_is_none() {
        let filter = EventFilter::all_events("00".repeat(32));
        let event = make_event("SellOrderCreated", json!({}));
        assert_eq!(parse_chain_event(&filter, &event), Ok(None));
    }

    #[test]
    fn test_non_allowlisted_name_is_none() {
        let filter = EventFilter::new(PKG, vec!["SellOrderCreated".to_string()]);
        let event = make_event("Approve", json!({"spender": "x"}));
        assert_eq!(parse_chain_event(&filter, &event), Ok(None));
    }

    #[test]
    fn test_sell_order_created_decodes() {
        let filter = EventFilter::all_events(PKG);
        let event = make_event(
            "SellOrderCreated",
            json!({
                "creator": "account-hash-aa",
                "collection": "contract-bb",
                "token_id": "7",
                "price": "1000000000",
                "start_time": "1700000100",
            }),
        );

        let parsed = parse_chain_event(&filter, &event).unwrap().unwrap();
        match parsed {
            DomainEvent::SellOrderCreated {
                creator,
                token_id,
                price,
                start_time,
                pay_token,
                ..
            } => {
                assert_eq!(creator, "account-hash-aa");
                assert_eq!(token_id, "7");
                assert_eq!(price, "1000000000");
                assert_eq!(start_time, 1_700_000_100);
                assert_eq!(pay_token, None);
            }
            other => panic!("unexpected variant: {:?}", other),
        }
    }

    #[test]
    fn test_matching_but_malformed_is_error() {
        let filter = EventFilter::all_events(PKG);
        // price missing entirely
        let event = make_event(
            "SellOrderCreated",
            json!({
                "creator": "account-hash-aa",
                "collection": "contract-bb",
                "token_id": "7",
                "start_time": 1,
            }),
        );

        let err = parse_chain_event(&filter, &event).unwrap_err();
        assert_eq!(
            err,
            ParseError::MissingField {
                event: "SellOrderCreated".to_string(),
                field: "price"
            }
        );
    }

    #[test]
    fn test_price_must_be_digit_string() {
        let filter = EventFilter::all_events(PKG);
        let event = make_event(
            "SellOrderCreated",
            json!({
                "creator": "a",
                "collection": "b",
                "token_id": "7",
                "price": "10.5",
                "start_time": 1,
            }),
        );

        match parse_chain_event(&filter, &event) {
            Err(ParseError::InvalidField { field: "price", .. }) => {}
            other => panic!("expected invalid price, got {:?}", other),
        }
    }

    #[test]
    fn test_allowlisted_unknown_tag_is_error() {
        let filter = EventFilter::new(PKG, vec!["SellOrderExpired".to_string()]);
        let event = make_event("SellOrderExpired", json!({}));
        assert_eq!(
            parse_chain_event(&filter, &event),
            Err(ParseError::UnknownEventTag("SellOrderExpired".to_string()))
        );
    }

    #[test]
    fn test_mint_uses_envelope_timestamp() {
        let filter = EventFilter::all_events(PKG);
        let event = make_event(
            "Mint",
            json!({
                "recipient": "account-hash-cc",
                "token_id": "3",
                "token_meta": "{\"name\":\"KUNFT #3\"}",
            }),
        );

        let parsed = parse_chain_event(&filter, &event).unwrap().unwrap();
        match parsed {
            DomainEvent::TokenMinted {
                recipient,
                mint_date,
                metadata,
                contract_hash,
                ..
            } => {
                assert_eq!(recipient, "account-hash-cc");
                assert_eq!(mint_date, 1_700_000_000);
                assert_eq!(metadata, "{\"name\":\"KUNFT #3\"}");
                assert_eq!(contract_hash, PKG);
            }
            other => panic!("unexpected variant: {:?}", other),
        }
    }
}

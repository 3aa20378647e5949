//! Shape reconciliation: any raw listing item → [`CanonicalRecord`].
//!
//! Each extraction strategy sees a different key vocabulary (`priceUsd`
//! vs `price` vs `lastPrice`, `ticker` vs `symbol`, nested `liquidity.usd`).
//! Every canonical field probes its aliases in a fixed order; numeric fields
//! always pass through [`parse_value`] whatever the source type.

use crate::normalize::number::parse_value;
use crate::types::CanonicalRecord;
use chrono::{DateTime, Utc};
use serde_json::Value;

const PAIR_KEYS: &[&str] = &["pairAddress", "address", "id"];
const NAME_KEYS: &[&str] = &["name", "tokenName", "title", "baseTokenName", "baseToken.name"];
const SYMBOL_KEYS: &[&str] = &["symbol", "ticker", "baseTokenSymbol", "baseToken.symbol"];
const PRICE_KEYS: &[&str] = &["priceUsd", "price", "lastPrice", "priceText"];
const MARKET_CAP_KEYS: &[&str] = &["marketCap", "mcap", "market_cap", "mcapUsd", "fdv"];
const LIQUIDITY_KEYS: &[&str] = &["liquidity", "liq", "poolLiquidity", "liquidity.usd"];
const VOLUME_KEYS: &[&str] = &["volume24h", "vol24h", "volume", "24h", "volume.h24"];
const CHANGE_KEYS: &[&str] = &[
    "priceChange24h",
    "change24h",
    "delta24h",
    "change",
    "priceChange.h24",
];
const URL_KEYS: &[&str] = &["dexscreenerUrl", "url", "link"];

/// Normalize raw items, stamping each with the current instant.
pub fn normalize_records(items: &[Value]) -> Vec<CanonicalRecord> {
    normalize_records_at(items, Utc::now())
}

/// Normalize raw items, stamping each with `captured_at`.
///
/// Never drops an item; filtering is the caller's decision.
pub fn normalize_records_at(items: &[Value], captured_at: DateTime<Utc>) -> Vec<CanonicalRecord> {
    items
        .iter()
        .map(|item| normalize_one(item, captured_at))
        .collect()
}

fn normalize_one(item: &Value, captured_at: DateTime<Utc>) -> CanonicalRecord {
    CanonicalRecord {
        pair_address: first_text(item, PAIR_KEYS),
        name: first_text(item, NAME_KEYS),
        symbol: first_text(item, SYMBOL_KEYS),
        price_usd: first_number(item, PRICE_KEYS),
        liquidity: first_number(item, LIQUIDITY_KEYS),
        market_cap: first_number(item, MARKET_CAP_KEYS),
        volume_24h: first_number(item, VOLUME_KEYS),
        price_change_24h: first_number(item, CHANGE_KEYS),
        dexscreener_url: first_text(item, URL_KEYS),
        timestamp: captured_at,
    }
}

/// Look up `key` in `item`; dots walk into nested objects.
fn lookup<'a>(item: &'a Value, key: &str) -> Option<&'a Value> {
    if let Some(direct) = item.get(key) {
        return Some(direct);
    }
    if !key.contains('.') {
        return None;
    }
    key.split('.')
        .try_fold(item, |current, segment| current.get(segment))
}

/// First alias holding a non-empty string or a non-zero number.
fn first_text(item: &Value, keys: &[&str]) -> String {
    for key in keys {
        match lookup(item, key) {
            Some(Value::String(s)) if !s.is_empty() => return s.clone(),
            Some(Value::Number(n)) if n.as_f64() != Some(0.0) => return n.to_string(),
            _ => {}
        }
    }
    String::new()
}

/// First alias holding a string or number, parsed; nested objects are skipped
/// so a later dotted alias can resolve them.
fn first_number(item: &Value, keys: &[&str]) -> f64 {
    for key in keys {
        match lookup(item, key) {
            Some(v @ (Value::String(_) | Value::Number(_))) => return parse_value(v),
            _ => {}
        }
    }
    0.0
}

//! Canonical record, snapshot and metrics shapes shared by every layer.
//!
//! Field names serialize camelCase so the persisted files stay readable by
//! the dashboard and monitoring scripts that consume them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One trading pair as captured from the listing page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalRecord {
    /// Pair identifier; the identity key across acquisitions.
    pub pair_address: String,
    pub name: String,
    pub symbol: String,
    pub price_usd: f64,
    pub liquidity: f64,
    pub market_cap: f64,
    #[serde(rename = "volume24h")]
    pub volume_24h: f64,
    #[serde(rename = "priceChange24h")]
    pub price_change_24h: f64,
    pub dexscreener_url: String,
    /// Capture instant.
    pub timestamp: DateTime<Utc>,
}

/// The persisted artifact: records captured together plus when.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub last_updated: Option<DateTime<Utc>>,
    #[serde(default)]
    pub data: Vec<CanonicalRecord>,
}

impl Snapshot {
    pub fn new(last_updated: DateTime<Utc>, data: Vec<CanonicalRecord>) -> Self {
        Self {
            last_updated: Some(last_updated),
            data,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Health counters rewritten after every daemon tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DaemonMetrics {
    pub last_scrape: DateTime<Utc>,
    pub last_count: usize,
    pub consecutive_failures: u32,
    pub last_success_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_serializes_camel_case() {
        let record = CanonicalRecord {
            pair_address: "abc".into(),
            name: "Alpha".into(),
            symbol: "ALP".into(),
            price_usd: 1.5,
            liquidity: 10.0,
            market_cap: 20.0,
            volume_24h: 30.0,
            price_change_24h: -4.0,
            dexscreener_url: "https://dexscreener.com/solana/abc".into(),
            timestamp: Utc::now(),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["pairAddress"], "abc");
        assert_eq!(json["priceUsd"], 1.5);
        assert_eq!(json["volume24h"], 30.0);
        assert_eq!(json["priceChange24h"], -4.0);
        assert_eq!(json["dexscreenerUrl"], "https://dexscreener.com/solana/abc");
    }

    #[test]
    fn test_snapshot_tolerates_missing_data_field() {
        let snap: Snapshot = serde_json::from_str(r#"{"lastUpdated": null}"#).unwrap();
        assert!(snap.last_updated.is_none());
        assert!(snap.is_empty());
    }
}

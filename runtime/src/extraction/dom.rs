//! Direct structural read of the rendered listing table.

use super::queries::ROWS_QUERY_JS;
use super::{pair_id_from_href, Extractor};
use crate::normalize::number::leading_float;
use crate::normalize::normalize_records_at;
use crate::renderer::RenderContext;
use crate::types::CanonicalRecord;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};

/// Rows with fewer cells are headers or layout rows.
const MIN_CELLS: usize = 8;

/// One row as returned by [`ROWS_QUERY_JS`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawRow {
    #[serde(default)]
    pub href: String,
    #[serde(default)]
    pub cells: Vec<String>,
}

/// Reads table rows straight from the live DOM.
pub struct DomExtractor;

#[async_trait]
impl Extractor for DomExtractor {
    fn name(&self) -> &'static str {
        "dom"
    }

    async fn extract(
        &self,
        page: &dyn RenderContext,
        captured_at: DateTime<Utc>,
    ) -> Result<Vec<CanonicalRecord>> {
        let value = page
            .execute_js(ROWS_QUERY_JS)
            .await
            .context("row query failed")?;
        let rows: Vec<RawRow> = match value {
            Value::Null => Vec::new(),
            other => serde_json::from_value(other).context("unexpected row query result")?,
        };
        Ok(rows_to_records(&rows, captured_at))
    }
}

/// Map raw rows to records by cell position.
///
/// Cell 1 is the symbol, 2 the name, 3 to 7 price, market cap, liquidity,
/// 24h volume and 24h change.
pub fn rows_to_records(rows: &[RawRow], captured_at: DateTime<Utc>) -> Vec<CanonicalRecord> {
    let items: Vec<Value> = rows
        .iter()
        .filter(|row| row.cells.len() >= MIN_CELLS && !row.cells[1].is_empty())
        .map(|row| {
            let cell = |i: usize| row.cells[i].as_str();
            json!({
                "pairAddress": pair_id_from_href(&row.href),
                "symbol": cell(1),
                "name": cell(2),
                "priceUsd": light_parse(cell(3), &['$', ',']),
                "marketCap": light_parse(cell(4), &['$', ',']),
                "liquidity": light_parse(cell(5), &['$', ',']),
                "volume24h": light_parse(cell(6), &['$', ',']),
                "priceChange24h": light_parse(cell(7), &['%', ',']),
                "dexscreenerUrl": row.href,
            })
        })
        .collect();
    normalize_records_at(&items, captured_at)
}

/// Strip `strip` characters and take the leading float; 0 otherwise.
fn light_parse(text: &str, strip: &[char]) -> f64 {
    let cleaned: String = text.chars().filter(|c| !strip.contains(c)).collect();
    leading_float(cleaned.trim())
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

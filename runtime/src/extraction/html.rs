//! Static parse of the serialized listing document.

use super::{pair_id_from_href, Extractor};
use crate::normalize::normalize_records_at;
use crate::renderer::RenderContext;
use crate::types::CanonicalRecord;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use scraper::{ElementRef, Html, Selector};
use serde_json::{json, Value};
use url::Url;

const ANCHOR_ROW: &str = "a.ds-dex-table-row";
const GENERIC_ROWS: &[&str] = &[
    ".token-list > div",
    r#"[data-testid="pair-table"] tr"#,
    ".table-wrap tr",
    ".token-info-row",
];
const GENERIC_CELLS: &str = r#"div[role="cell"], td"#;
const MIN_GENERIC_CELLS: usize = 4;

/// Parses the page HTML without touching the live DOM.
pub struct HtmlExtractor {
    origin: String,
}

impl HtmlExtractor {
    pub fn new(origin: &str) -> Self {
        Self {
            origin: origin.to_string(),
        }
    }
}

#[async_trait]
impl Extractor for HtmlExtractor {
    fn name(&self) -> &'static str {
        "html"
    }

    async fn extract(
        &self,
        page: &dyn RenderContext,
        captured_at: DateTime<Utc>,
    ) -> Result<Vec<CanonicalRecord>> {
        let html = page.get_html().await.context("reading page HTML failed")?;
        tracing::debug!(bytes = html.len(), "parsing page HTML");
        Ok(parse_listing_html(&html, &self.origin, captured_at))
    }
}

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("static selector")
}

fn text_of(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

fn first_text(row: ElementRef<'_>, css: &str) -> String {
    row.select(&selector(css))
        .next()
        .map(text_of)
        .unwrap_or_default()
}

/// First non-empty text among `candidates`.
fn first_text_of(row: ElementRef<'_>, candidates: &[&str]) -> String {
    candidates
        .iter()
        .map(|css| first_text(row, css))
        .find(|t| !t.is_empty())
        .unwrap_or_default()
}

fn resolve_href(origin: Option<&Url>, href: &str) -> String {
    if href.is_empty() {
        return String::new();
    }
    origin
        .and_then(|base| base.join(href).ok())
        .map(|u| u.to_string())
        .unwrap_or_else(|| href.to_string())
}

/// Parse a listing document: anchor-row layout first, then generic tables.
pub fn parse_listing_html(
    html: &str,
    origin: &str,
    captured_at: DateTime<Utc>,
) -> Vec<CanonicalRecord> {
    let document = Html::parse_document(html);
    let base = Url::parse(origin).ok();

    let items = anchor_rows(&document, base.as_ref());
    if !items.is_empty() {
        tracing::debug!(count = items.len(), "anchor rows matched");
        return normalize_records_at(&items, captured_at);
    }

    for css in GENERIC_ROWS {
        let items = generic_rows(&document, css, base.as_ref());
        if !items.is_empty() {
            tracing::debug!(selector = css, count = items.len(), "generic rows matched");
            return normalize_records_at(&items, captured_at);
        }
    }

    Vec::new()
}

fn anchor_rows(document: &Html, base: Option<&Url>) -> Vec<Value> {
    document
        .select(&selector(ANCHOR_ROW))
        .filter_map(|row| {
            let href = row.value().attr("href").unwrap_or_default();
            let name = first_text(row, ".ds-dex-table-row-base-token-name-text");
            let symbol = first_text(row, ".ds-dex-table-row-base-token-symbol");
            let symbol = if symbol.is_empty() { name.clone() } else { symbol };
            if symbol.is_empty() {
                return None;
            }
            Some(json!({
                "pairAddress": pair_id_from_href(href),
                "symbol": symbol,
                "name": name,
                "priceUsd": first_text(row, ".ds-dex-table-row-col-price"),
                "priceChange24h": first_text_of(
                    row,
                    &[".ds-change-perc", ".ds-dex-table-row-col-price-change-h24"],
                ),
                "liquidity": first_text(row, ".ds-dex-table-row-col-liquidity"),
                "marketCap": first_text(row, ".ds-dex-table-row-col-market-cap"),
                "volume24h": first_text_of(
                    row,
                    &[".ds-dex-table-row-col-volume", ".ds-dex-table-row-col-24h-volume"],
                ),
                "dexscreenerUrl": resolve_href(base, href),
            }))
        })
        .collect()
}

fn generic_rows(document: &Html, css: &str, base: Option<&Url>) -> Vec<Value> {
    let cell_sel = selector(GENERIC_CELLS);
    let link_sel = selector("a");
    document
        .select(&selector(css))
        .filter_map(|row| {
            let cells: Vec<String> = row.select(&cell_sel).map(text_of).collect();
            if cells.len() < MIN_GENERIC_CELLS || cells[1].is_empty() {
                return None;
            }
            let cell = |i: usize| cells.get(i).cloned().unwrap_or_default();
            let href = row
                .select(&link_sel)
                .next()
                .and_then(|a| a.value().attr("href"))
                .unwrap_or_default();
            Some(json!({
                "pairAddress": pair_id_from_href(href),
                "symbol": cell(1),
                "name": cell(2),
                "priceUsd": cell(3),
                "marketCap": cell(4),
                "liquidity": cell(5),
                "volume24h": cell(6),
                "priceChange24h": cell(7),
                "dexscreenerUrl": resolve_href(base, href),
            }))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORIGIN: &str = "https://dexscreener.com";

    #[test]
    fn test_anchor_rows() {
        let html = r#"<html><body><div class="ds-dex-table">
          <a class="ds-dex-table-row ds-dex-table-row-top" href="/solana/pairAAA">
            <div class="ds-table-data-cell ds-dex-table-row-col-token">
              <span class="ds-dex-table-row-base-token-symbol">AAA</span>
              <span class="ds-dex-table-row-base-token-name-text">Alpha Token</span>
            </div>
            <div class="ds-table-data-cell ds-dex-table-row-col-price">$0.001234</div>
            <div class="ds-table-data-cell ds-dex-table-row-col-price-change-h24"><span class="ds-change-perc">-4.5%</span></div>
            <div class="ds-table-data-cell ds-dex-table-row-col-liquidity">$45K</div>
            <div class="ds-table-data-cell ds-dex-table-row-col-market-cap">$1.2M</div>
            <div class="ds-table-data-cell ds-dex-table-row-col-volume">$300K</div>
          </a>
          <a class="ds-dex-table-row" href="/solana/pairBBB">
            <span class="ds-dex-table-row-base-token-name-text">Beta</span>
            <div class="ds-dex-table-row-col-price">$2</div>
            <div class="ds-dex-table-row-col-24h-volume">1,000</div>
          </a>
          <a class="ds-dex-table-row" href="/solana/empty"></a>
        </div></body></html>"#;

        let out = parse_listing_html(html, ORIGIN, Utc::now());
        assert_eq!(out.len(), 2);
        let a = &out[0];
        assert_eq!(a.pair_address, "pairAAA");
        assert_eq!(a.symbol, "AAA");
        assert_eq!(a.name, "Alpha Token");
        assert_eq!(a.price_usd, 0.001234);
        assert_eq!(a.price_change_24h, -4.5);
        assert_eq!(a.liquidity, 45_000.0);
        assert_eq!(a.market_cap, 1_200_000.0);
        assert_eq!(a.volume_24h, 300_000.0);
        assert_eq!(a.dexscreener_url, "https://dexscreener.com/solana/pairAAA");

        let b = &out[1];
        assert_eq!(b.symbol, "Beta");
        assert_eq!(b.volume_24h, 1000.0);
    }

    #[test]
    fn test_generic_table_fallback() {
        let html = r#"<html><body><table class="table-wrap">
          <tr><th>#</th><th>Token</th></tr>
          <tr><td>1</td><td>GEN</td><td>Generic</td><td>$0.5</td><td>$10k</td><td>$2k</td><td>$7k</td><td>(1.5%)</td>
              <td><a href="https://dexscreener.com/solana/gen1">view</a></td></tr>
          <tr><td>2</td><td></td><td>Blank</td><td>1</td></tr>
        </table></body></html>"#;

        let out = parse_listing_html(html, ORIGIN, Utc::now());
        assert_eq!(out.len(), 1);
        let r = &out[0];
        assert_eq!(r.symbol, "GEN");
        assert_eq!(r.pair_address, "gen1");
        assert_eq!(r.market_cap, 10_000.0);
        assert_eq!(r.liquidity, 2_000.0);
        assert_eq!(r.volume_24h, 7_000.0);
        assert_eq!(r.price_change_24h, -1.5);
    }

    #[test]
    fn test_no_rows() {
        assert!(parse_listing_html("<html><p>nothing</p></html>", ORIGIN, Utc::now()).is_empty());
    }
}

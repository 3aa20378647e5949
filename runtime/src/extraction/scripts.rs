//! Mining listing arrays out of embedded `<script>` state.
//!
//! Single-page listings often ship their initial data as a JS assignment
//! (`window.__INITIAL_STATE__ = {...}`). The object is cut out with a
//! string-aware brace matcher and parsed as JSON; any array whose first
//! element looks like a listing item contributes candidates.

use super::queries::SCRIPT_TEXTS_JS;
use super::Extractor;
use crate::normalize::normalize_records_at;
use crate::renderer::RenderContext;
use crate::types::CanonicalRecord;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::OnceLock;

const MIN_SCRIPT_LEN: usize = 100;
const MAX_SCRIPT_LEN: usize = 5 * 1024 * 1024;
/// Minimum size of an anonymous blob worth parsing.
const MIN_BLOB_LEN: usize = 500;
/// A candidate array's first element must carry one of these keys.
const SENTINEL_KEYS: &[&str] = &["symbol", "name", "price", "priceUsd"];

fn assignment_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?:window\.__INITIAL_STATE__|\b__INITIAL_STATE__|window\.__DATA__|\bvar\s+initialState)\s*=\s*\{",
        )
        .expect("valid regex")
    })
}

/// Mines embedded script state.
pub struct ScriptExtractor;

#[async_trait]
impl Extractor for ScriptExtractor {
    fn name(&self) -> &'static str {
        "scripts"
    }

    async fn extract(
        &self,
        page: &dyn RenderContext,
        captured_at: DateTime<Utc>,
    ) -> Result<Vec<CanonicalRecord>> {
        let scripts = match page.execute_js(SCRIPT_TEXTS_JS).await {
            Ok(value) => serde_json::from_value::<Vec<String>>(value).unwrap_or_default(),
            Err(e) => {
                tracing::warn!("reading script elements failed: {e:#}");
                return Ok(Vec::new());
            }
        };
        Ok(mine_scripts(&scripts, captured_at))
    }
}

/// Extract, normalize and dedupe listing items from script texts.
pub fn mine_scripts(scripts: &[String], captured_at: DateTime<Utc>) -> Vec<CanonicalRecord> {
    let mut candidates: Vec<Value> = Vec::new();

    for text in scripts {
        if text.len() < MIN_SCRIPT_LEN || text.len() > MAX_SCRIPT_LEN {
            continue;
        }

        let before = candidates.len();
        for m in assignment_pattern().find_iter(text) {
            let brace = m.end() - 1;
            if let Some(obj) = extract_json_object(text, brace) {
                if let Ok(value) = serde_json::from_str::<Value>(obj) {
                    collect_listing_arrays(&value, &mut candidates);
                }
            }
        }

        if candidates.len() == before {
            collect_from_blobs(text, &mut candidates);
        }
    }

    let records = normalize_records_at(&candidates, captured_at);
    dedupe(
        records
            .into_iter()
            .filter(|r| !r.name.is_empty() || !r.symbol.is_empty())
            .collect(),
    )
}

/// Try every top-level `{...}` blob long enough to hold a listing.
/// Blobs that fail to parse are searched for nested blobs.
fn collect_from_blobs(text: &str, out: &mut Vec<Value>) {
    let mut pos = 0;
    while let Some(offset) = text[pos..].find('{') {
        let start = pos + offset;
        // A stray `{` (string or regex literal) never balances; skip it.
        let Some(obj) = extract_json_object(text, start) else {
            pos = start + 1;
            continue;
        };
        if obj.len() <= MIN_BLOB_LEN {
            pos = start + obj.len();
            continue;
        }
        match serde_json::from_str::<Value>(obj) {
            Ok(value) => {
                collect_listing_arrays(&value, out);
                pos = start + obj.len();
            }
            Err(_) => pos = start + 1,
        }
    }
}

/// Balanced `{...}` starting at byte `start`, honouring JSON strings.
fn extract_json_object(payload: &str, start: usize) -> Option<&str> {
    let mut depth = 0usize;
    let mut in_str = false;
    let mut escape = false;
    for (offset, ch) in payload[start..].char_indices() {
        if in_str {
            if escape {
                escape = false;
            } else if ch == '\\' {
                escape = true;
            } else if ch == '"' {
                in_str = false;
            }
            continue;
        }
        match ch {
            '"' => in_str = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    let end = start + offset + 1;
                    return Some(&payload[start..end]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Walk `value` and push the items of every listing-shaped array.
fn collect_listing_arrays(value: &Value, out: &mut Vec<Value>) {
    match value {
        Value::Array(items) => {
            let looks_like_listing = items
                .first()
                .and_then(Value::as_object)
                .is_some_and(|first| SENTINEL_KEYS.iter().any(|k| first.contains_key(*k)));
            if looks_like_listing {
                out.extend(items.iter().cloned());
            }
            for item in items {
                collect_listing_arrays(item, out);
            }
        }
        Value::Object(map) => {
            for v in map.values() {
                collect_listing_arrays(v, out);
            }
        }
        _ => {}
    }
}

/// Case-insensitive dedupe on pair id, then symbol, then name. First wins.
fn dedupe(records: Vec<CanonicalRecord>) -> Vec<CanonicalRecord> {
    let mut seen = HashSet::new();
    records
        .into_iter()
        .filter(|r| {
            let key = [&r.pair_address, &r.symbol, &r.name]
                .into_iter()
                .find(|k| !k.is_empty())
                .map(|k| k.to_lowercase());
            match key {
                Some(k) => seen.insert(k),
                None => false,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::NavigationResult;

    fn padded(body: &str) -> String {
        format!("{body}\n// {}", "x".repeat(120))
    }

    #[test]
    fn test_initial_state_assignment() {
        let script = padded(
            r#"window.__INITIAL_STATE__ = {"pairs": {"list": [
                {"pairAddress": "p1", "symbol": "AAA", "priceUsd": "0.5", "liquidity": "10k"},
                {"pairAddress": "p2", "symbol": "BBB", "price": 2}
            ]}};"#,
        );
        let out = mine_scripts(&[script], Utc::now());
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].symbol, "AAA");
        assert_eq!(out[0].price_usd, 0.5);
        assert_eq!(out[0].liquidity, 10_000.0);
        assert_eq!(out[1].price_usd, 2.0);
    }

    #[test]
    fn test_braces_inside_strings_do_not_cut_object() {
        let script = padded(
            r#"var initialState = {"note": "a } brace", "rows": [{"symbol": "CCC", "name": "C {x}"}]};"#,
        );
        let out = mine_scripts(&[script], Utc::now());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].name, "C {x}");
    }

    #[test]
    fn test_dedupe_first_seen_case_insensitive() {
        let script = padded(
            r#"window.__DATA__ = {"a": [
                {"pairAddress": "PX", "symbol": "ONE"},
                {"pairAddress": "px", "symbol": "TWO"},
                {"symbol": "Sym"},
                {"symbol": "SYM"}
            ]};"#,
        );
        let out = mine_scripts(&[script], Utc::now());
        let symbols: Vec<_> = out.iter().map(|r| r.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["ONE", "Sym"]);
    }

    #[test]
    fn test_items_without_name_or_symbol_rejected() {
        let script = padded(r#"window.__DATA__ = {"a": [{"price": 1}, {"price": 2, "name": "N"}]};"#);
        let out = mine_scripts(&[script], Utc::now());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].name, "N");
    }

    #[test]
    fn test_blob_fallback() {
        let items: Vec<String> = (0..20)
            .map(|i| format!(r#"{{"pairAddress": "b{i}", "symbol": "T{i}", "priceUsd": "{i}.5"}}"#))
            .collect();
        let script = format!(
            r#"self.__next_f.push(function() {{ return 1; }}); const payload = {{"pairs": [{}]}};"#,
            items.join(",")
        );
        assert!(script.len() > MIN_BLOB_LEN);
        let out = mine_scripts(&[script], Utc::now());
        assert_eq!(out.len(), 20);
        assert_eq!(out[3].pair_address, "b3");
        assert_eq!(out[3].price_usd, 3.5);
    }

    #[test]
    fn test_unclosed_brace_before_blob_is_skipped() {
        let items: Vec<String> = (0..20)
            .map(|i| format!(r#"{{"pairAddress": "r{i}", "symbol": "R{i}", "priceUsd": "1"}}"#))
            .collect();
        let script = format!(
            r#"var re = /\{{/; const payload = {{"pairs": [{}]}};"#,
            items.join(",")
        );
        let out = mine_scripts(&[script], Utc::now());
        assert_eq!(out.len(), 20);
        assert_eq!(out[0].pair_address, "r0");
    }

    #[test]
    fn test_oversized_scripts_skipped() {
        let body = r#"window.__DATA__ = {"a": [{"symbol": "BIG", "name": "Big"}]};"#;
        let fits = padded(body);
        assert_eq!(mine_scripts(&[fits], Utc::now()).len(), 1);

        let huge = format!("{body}\n// {}", "x".repeat(MAX_SCRIPT_LEN));
        assert!(huge.len() > MAX_SCRIPT_LEN);
        assert!(mine_scripts(&[huge], Utc::now()).is_empty());
    }

    struct ScriptsUnreadable;

    #[async_trait]
    impl RenderContext for ScriptsUnreadable {
        async fn navigate(&mut self, url: &str, _timeout_ms: u64) -> Result<NavigationResult> {
            Ok(NavigationResult {
                final_url: url.to_string(),
                load_time_ms: 0,
            })
        }

        async fn execute_js(&self, _script: &str) -> Result<Value> {
            anyhow::bail!("Execution context was destroyed")
        }

        async fn get_html(&self) -> Result<String> {
            Ok(String::new())
        }

        async fn close(self: Box<Self>) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_unreadable_scripts_yield_no_candidates() {
        let out = ScriptExtractor
            .extract(&ScriptsUnreadable, Utc::now())
            .await
            .unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_short_scripts_skipped() {
        let script = r#"window.__DATA__={"a":[{"symbol":"X"}]}"#.to_string();
        assert!(script.len() < MIN_SCRIPT_LEN);
        assert!(mine_scripts(&[script], Utc::now()).is_empty());
    }

    #[test]
    fn test_unbalanced_object_ignored() {
        assert_eq!(extract_json_object(r#"{"a": {"b": 1}"#, 0), None);
        assert_eq!(extract_json_object(r#"{"a": "}"} tail"#, 0), Some(r#"{"a": "}"}"#));
    }
}

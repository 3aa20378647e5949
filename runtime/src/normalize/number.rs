//! Tolerant numeric-text parsing.
//!
//! Listing pages render numbers for humans: `$1,234.56`, `15k`, `2.5M`,
//! `(5.2%)`. [`parse_number`] turns any of these into an `f64` and never
//! fails; unparseable text becomes `0.0`.

use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

/// Currency symbols stripped before matching.
const CURRENCY_SYMBOLS: &[char] = &['$', '€', '£', '¥'];

fn primary_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(-?[0-9]*\.?[0-9]+)([kKmMbB])?%?$").expect("valid regex"))
}

fn leading_float_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[+-]?(?:[0-9]+\.?[0-9]*|\.[0-9]+)(?:[eE][+-]?[0-9]+)?").expect("valid regex")
    })
}

/// Parse loosely formatted numeric text.
///
/// Percentages keep their literal value (`"12.5%"` is `12.5`), text wrapped
/// in parentheses is negated, and `k`/`m`/`b` suffixes scale by a thousand,
/// a million and a billion. The result is always finite.
pub fn parse_number(text: &str) -> f64 {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return 0.0;
    }

    let negate = trimmed.len() >= 2 && trimmed.starts_with('(') && trimmed.ends_with(')');
    let core = trimmed.trim_matches(|c: char| c == '(' || c == ')' || c.is_whitespace());

    let cleaned: String = core
        .chars()
        .filter(|c| !CURRENCY_SYMBOLS.contains(c) && *c != ',' && !c.is_whitespace())
        .collect();

    let value = match primary_pattern().captures(&cleaned) {
        Some(caps) => {
            let base: f64 = caps[1].parse().unwrap_or(0.0);
            let scale = match caps.get(2).map(|m| m.as_str()) {
                Some("k") | Some("K") => 1e3,
                Some("m") | Some("M") => 1e6,
                Some("b") | Some("B") => 1e9,
                _ => 1.0,
            };
            base * scale
        }
        None => leading_float(&cleaned.replace('%', "")).unwrap_or(0.0),
    };

    if !value.is_finite() {
        return 0.0;
    }
    if negate {
        -value
    } else {
        value
    }
}

/// Parse a JSON value that may hold a number or numeric text.
///
/// Null, booleans, arrays and objects are `0.0`.
pub fn parse_value(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite()).unwrap_or(0.0),
        Value::String(s) => parse_number(s),
        _ => 0.0,
    }
}

/// Longest leading float prefix of `text` (`"12abc"` is `12`).
pub fn leading_float(text: &str) -> Option<f64> {
    let m = leading_float_pattern().find(text.trim_start())?;
    m.as_str().parse::<f64>().ok()
}

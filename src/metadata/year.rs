//! Publication-year parsing.
//!
//! Sources report years as integers, bare strings, or full dates. Every value
//! passes through here so that only plausible years (1900 through the current
//! calendar year) ever reach an [`super::ArticleMetadata`].

use std::sync::LazyLock;

use chrono::Datelike;
use regex::Regex;

/// Earliest year accepted from any source.
pub const MIN_YEAR: i32 = 1900;

static YEAR_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r"\b(19\d{2}|20\d{2})\b"));

/// Compiles a hard-coded regex pattern, panicking on invalid pattern text.
pub(crate) fn compile_static_regex(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|e| panic!("invalid static regex '{pattern}': {e}"))
}

/// Accepts `year` only when it falls in `[1900, current year]`.
#[must_use]
pub fn plausible_year(year: i64) -> Option<i32> {
    let current = chrono::Local::now().year();
    i32::try_from(year)
        .ok()
        .filter(|y| (MIN_YEAR..=current).contains(y))
}

/// Parses a year from free text such as `"2021"`, `"2021-03-04"` or `"May 2019"`.
///
/// A string that is entirely an integer is taken as-is; otherwise the first
/// `19xx`/`20xx` token is used.
#[must_use]
pub fn parse_year(raw: &str) -> Option<i32> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(value) = trimmed.parse::<i64>() {
        return plausible_year(value);
    }
    YEAR_TOKEN
        .captures(trimmed)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<i64>().ok())
        .and_then(plausible_year)
}

/// Parses a year from a JSON value (number or string).
#[must_use]
pub fn parse_year_value(value: &serde_json::Value) -> Option<i32> {
    match value {
        serde_json::Value::Number(n) => n.as_i64().and_then(plausible_year),
        serde_json::Value::String(s) => parse_year(s),
        _ => None,
    }
}

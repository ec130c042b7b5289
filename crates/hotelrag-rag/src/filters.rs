//! Structured filter extraction from free-text queries

use regex::Regex;
use serde_json::{Map, Value};
use std::sync::{Arc, LazyLock};
use tracing::{debug, warn};

use hotelrag_core::{Error, Filter, GenerativeBackend, Result};

static CODE_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```[A-Za-z]*\s*(.*?)\s*```").expect("code fence pattern is valid")
});

/// Asks a generative backend for the price bounds a query mentions.
///
/// Extraction is an optimization: `extract` never fails and degrades to an
/// unconstrained filter.
pub struct FilterExtractor {
    backend: Arc<dyn GenerativeBackend>,
}

impl FilterExtractor {
    pub fn new(backend: Arc<dyn GenerativeBackend>) -> Self {
        Self { backend }
    }

    pub fn prompt(query: &str) -> String {
        format!(
            "Extract the price constraints from this hotel search request.\n\
            Respond with only a JSON object of the form \
            {{\"min_price\": number or null, \"max_price\": number or null}}.\n\
            Prices are nightly rates in Japanese yen. Use null for any bound the request does not mention.\n\
            \n\
            Request: {}",
            query
        )
    }

    /// Extract a filter, surfacing backend and parse failures.
    pub async fn try_extract(&self, query: &str) -> Result<Filter> {
        let raw = self
            .backend
            .generate(&Self::prompt(query))
            .await
            .map_err(|e| Error::FilterExtraction(e.to_string()))?;
        debug!(raw = %raw, "Filter extraction reply");
        parse_filter(&raw)
    }

    /// Extract a filter, falling back to an unconstrained one on any failure.
    pub async fn extract(&self, query: &str) -> Filter {
        match self.try_extract(query).await {
            Ok(filter) => filter,
            Err(e) => {
                warn!(error = %e, "Filter extraction failed, searching unconstrained");
                Filter::unconstrained()
            }
        }
    }
}

/// Parse a generator reply into a filter.
///
/// Tolerates markdown code fences and prose around the object, camelCase
/// keys, and prices written as strings such as `"¥12,000"`.
pub fn parse_filter(raw: &str) -> Result<Filter> {
    let payload = strip_wrappers(raw);
    let value: Value = serde_json::from_str(payload)
        .map_err(|e| Error::FilterExtraction(format!("reply is not JSON: {e}")))?;

    let Value::Object(fields) = value else {
        return Err(Error::FilterExtraction("reply is not a JSON object".to_string()));
    };

    Ok(Filter::new(
        price_field(&fields, &["min_price", "minPrice"]),
        price_field(&fields, &["max_price", "maxPrice"]),
    ))
}

fn strip_wrappers(raw: &str) -> &str {
    let trimmed = raw.trim();
    let inner = CODE_FENCE
        .captures(trimmed)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .unwrap_or(trimmed);

    match (inner.find('{'), inner.rfind('}')) {
        (Some(start), Some(end)) if start < end => &inner[start..=end],
        _ => inner,
    }
}

fn price_field(fields: &Map<String, Value>, keys: &[&str]) -> Option<f64> {
    keys.iter()
        .find_map(|key| fields.get(*key))
        .and_then(|value| match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => parse_price(s),
            _ => None,
        })
}

/// A price written as text. Currency marks, group separators and spaces are
/// ignored; anything else (a sign, a range, a unit) makes the bound unknown.
fn parse_price(raw: &str) -> Option<f64> {
    let amount: String = raw
        .chars()
        .filter(|c| !matches!(c, '¥' | '￥' | '$' | '€' | '£' | ',' | '_') && !c.is_whitespace())
        .collect();
    if amount.is_empty() || !amount.chars().all(|c| c.is_ascii_digit() || c == '.') {
        return None;
    }
    amount.parse().ok()
}

//! Encoding for the string-list columns (`products.images`, `products.sizes`).
//!
//! A list is stored as a JSON array of strings. An empty list is stored as
//! NULL. Decoding never fails: NULL, malformed JSON, or JSON that is not an
//! array all decode to an empty list, and non-string array items are skipped.

use log::warn;
use serde_json::Value;

pub fn decode(raw: Option<&str>) -> Vec<String> {
    let raw = match raw {
        Some(r) if !r.trim().is_empty() => r,
        _ => return Vec::new(),
    };

    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s),
                _ => None,
            })
            .collect(),
        Ok(_) => Vec::new(),
        Err(e) => {
            warn!("Discarding malformed list column: {}", e);
            Vec::new()
        }
    }
}

pub fn encode(items: &[String]) -> Option<String> {
    if items.is_empty() {
        return None;
    }
    serde_json::to_string(items).ok()
}

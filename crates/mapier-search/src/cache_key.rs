//! Canonical cache keys.
//!
//! | Key | TTL |
//! |-----|-----|
//! | `search:{hash}` | 5 minutes |
//! | `place:{id}` | 30 minutes |
//! | `place:autocomplete:{hash}` | 30 days |
//!
//! Hashes are SHA-256 over the parameters flattened to `path=value` pairs
//! sorted by path, so the key never depends on client-side field order.

use std::collections::BTreeMap;

use serde_json::{json, Value as JsonValue};
use sha2::{Digest, Sha256};

use mapier_core::{AutocompleteQuery, SearchQuery};

pub const SEARCH_PREFIX: &str = "search:";
pub const PLACE_PREFIX: &str = "place:";
pub const AUTOCOMPLETE_PREFIX: &str = "place:autocomplete:";

/// Hex SHA-256 of the canonical form of `params`.
///
/// Nested objects are flattened with dotted paths; nulls are dropped so an
/// absent field and an explicit null hash the same.
pub fn params_hash(params: &JsonValue) -> String {
    let mut flat = BTreeMap::new();
    flatten("", params, &mut flat);
    let canonical = flat
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");
    hex::encode(Sha256::digest(canonical.as_bytes()))
}

fn flatten(prefix: &str, value: &JsonValue, out: &mut BTreeMap<String, String>) {
    match value {
        JsonValue::Null => {}
        JsonValue::Object(map) => {
            for (k, v) in map {
                let path = if prefix.is_empty() {
                    k.clone()
                } else {
                    format!("{}.{}", prefix, k)
                };
                flatten(&path, v, out);
            }
        }
        other => {
            out.insert(prefix.to_string(), other.to_string());
        }
    }
}

/// Key for a search. Free text and category are compared trimmed and
/// case-folded.
pub fn search_key(query: &SearchQuery) -> String {
    let params = json!({
        "location": {
            "lat": query.location.lat,
            "lon": query.location.lon,
            "radius_m": query.location.radius_m,
        },
        "query": query.text().map(str::to_lowercase),
        "category": query.category_filter().map(str::to_lowercase),
        "limit": query.limit,
        "offset": query.offset,
    });
    format!("{}{}", SEARCH_PREFIX, params_hash(&params))
}

/// Key for a place detail lookup.
pub fn place_key(id: &str) -> String {
    format!("{}{}", PLACE_PREFIX, id)
}

/// Key for an autocomplete request.
pub fn autocomplete_key(query: &AutocompleteQuery) -> String {
    let params = json!({
        "input": query.input.trim().to_lowercase(),
        "lat": query.lat,
        "lon": query.lon,
    });
    format!("{}{}", AUTOCOMPLETE_PREFIX, params_hash(&params))
}

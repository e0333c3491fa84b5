//! Test helpers for orchestrator tests.
//!
//! Provides an in-memory cache and place/suggestion builders.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use mapier_providers::{MockProvider, ProviderRegistry};
use mapier_search::{
    AutocompleteSuggestion, CacheGateway, GeoPoint, Place, SearchOrchestrator,
};

/// Origin used by all searches in these tests.
pub const ORIGIN: (f64, f64) = (41.7937, -87.5937);

/// Roughly one meter of latitude in degrees.
pub const METER_LAT: f64 = 1.0 / 111_195.0;

/// HashMap-backed cache that records writes.
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, String>>,
    writes: Mutex<Vec<(String, Duration)>>,
}

impl MemoryCache {
    pub fn contains(&self, key: &str) -> bool {
        self.entries.lock().unwrap().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn writes(&self) -> Vec<(String, Duration)> {
        self.writes.lock().unwrap().clone()
    }
}

#[async_trait]
impl CacheGateway for MemoryCache {
    async fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().unwrap().get(key).cloned()
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        self.writes.lock().unwrap().push((key.to_string(), ttl));
    }

    async fn invalidate(&self, key: &str) {
        self.entries.lock().unwrap().remove(key);
    }
}

/// A place `north_m` meters north of [`ORIGIN`].
pub fn place_at(id: &str, name: &str, north_m: f64, confidence: f64, provider: &str) -> Place {
    Place::new(
        id,
        name,
        GeoPoint::new(ORIGIN.0 + north_m * METER_LAT, ORIGIN.1),
        confidence,
        provider,
    )
}

pub fn suggestion(text: &str, provider: &str) -> AutocompleteSuggestion {
    AutocompleteSuggestion {
        text: text.to_string(),
        secondary_text: None,
        place_id: None,
        provider: provider.to_string(),
    }
}

/// Orchestrator over `providers` sharing `cache`.
pub fn orchestrator(providers: &[MockProvider], cache: Arc<MemoryCache>) -> SearchOrchestrator {
    let mut registry = ProviderRegistry::new();
    for p in providers {
        registry.register(Arc::new(p.clone()));
    }
    SearchOrchestrator::new(registry, cache)
}

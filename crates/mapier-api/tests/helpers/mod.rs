//! Test harness for router tests.
//!
//! Wires the real router over in-memory stand-ins for the PostgreSQL
//! repositories, mock providers and an in-process cache.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use serde_json::Value;
use tower::ServiceExt;

use mapier_api::services::{BridgeLookup, IdentityResolver, PlaceCache};
use mapier_api::{build_router, parse_allowed_origins, AppState, RateLimitConfig};
use mapier_core::{
    haversine_m, name_similarity, CacheGateway, CandidateMatch, CandidateQuery, Error, GeoPoint,
    MatchCandidateSource, MatchedSource, NearbyPlace, NewCustomPlace, Place, PlaceRepository,
    Platform, Result, SourceType,
};
use mapier_db::{ExportQuery, FeatureCollection, FeatureSource};
use mapier_providers::{MockProvider, ProviderRegistry};
use mapier_search::SearchOrchestrator;

/// Times Square, used as the default observation point.
pub const ORIGIN: (f64, f64) = (40.758, -73.9855);

/// Roughly one meter of latitude in degrees.
pub const METER_LAT: f64 = 1.0 / 111_195.0;

pub fn place_at(id: &str, name: &str, north_m: f64) -> Place {
    Place::new(
        id,
        name,
        GeoPoint::new(ORIGIN.0 + north_m * METER_LAT, ORIGIN.1),
        0.9,
        "local",
    )
}

// =============================================================================
// PLACE REPOSITORY
// =============================================================================

/// Vec-backed repository enforcing one holder per platform identifier.
#[derive(Default)]
pub struct MemoryPlaces {
    places: Mutex<Vec<Place>>,
    /// Inserted by the next `insert_custom`, which then reports a conflict,
    /// as if a concurrent request had won the race.
    race_winner: Mutex<Option<Place>>,
    always_conflict: Mutex<bool>,
    inserts: Mutex<usize>,
}

impl MemoryPlaces {
    pub fn add(&self, place: Place) {
        self.places.lock().unwrap().push(place);
    }

    pub fn get(&self, id: &str) -> Option<Place> {
        self.places.lock().unwrap().iter().find(|p| p.id == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.places.lock().unwrap().len()
    }

    pub fn all(&self) -> Vec<Place> {
        self.places.lock().unwrap().clone()
    }

    pub fn lose_next_insert_to(&self, winner: Place) {
        *self.race_winner.lock().unwrap() = Some(winner);
    }

    pub fn always_conflict(&self) {
        *self.always_conflict.lock().unwrap() = true;
    }

    pub fn insert_attempts(&self) -> usize {
        *self.inserts.lock().unwrap()
    }

    fn holder_of(places: &[Place], platform: Platform, identifier: &str) -> Option<String> {
        places
            .iter()
            .find(|p| p.platform_id(platform) == Some(identifier))
            .map(|p| p.id.clone())
    }
}

#[async_trait]
impl PlaceRepository for MemoryPlaces {
    async fn fetch(&self, id: &str) -> Result<Option<Place>> {
        Ok(self.get(id))
    }

    async fn find_by_platform_id(&self, platform: Platform, identifier: &str) -> Result<Option<Place>> {
        Ok(self
            .places
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.platform_id(platform) == Some(identifier))
            .cloned())
    }

    async fn insert_custom(&self, new: NewCustomPlace) -> Result<Place> {
        *self.inserts.lock().unwrap() += 1;
        if *self.always_conflict.lock().unwrap() {
            return Err(Error::Conflict("duplicate key value".into()));
        }
        let mut places = self.places.lock().unwrap();
        if let Some(winner) = self.race_winner.lock().unwrap().take() {
            places.push(winner);
            return Err(Error::Conflict("duplicate key value".into()));
        }
        for platform in Platform::ALL {
            let id = match platform {
                Platform::Google => new.google_place_id.as_deref(),
                Platform::Apple => new.apple_place_id.as_deref(),
            };
            if let Some(id) = id {
                if Self::holder_of(&places, platform, id).is_some() {
                    return Err(Error::Conflict(format!("{} already held", platform.column())));
                }
            }
        }

        let mut place = Place::new(new.id, new.name, new.location, 0.5, "local");
        place.source_type = SourceType::Custom;
        place.category.primary = new.category;
        place.websites = new.website.into_iter().collect();
        place.phones = new.phone.into_iter().collect();
        place.google_place_id = new.google_place_id;
        place.apple_place_id = new.apple_place_id;
        places.push(place.clone());
        Ok(place)
    }

    async fn link_platform_id(&self, place_id: &str, platform: Platform, identifier: &str) -> Result<bool> {
        let mut places = self.places.lock().unwrap();
        if let Some(holder) = Self::holder_of(&places, platform, identifier) {
            if holder != place_id {
                return Err(Error::Conflict(format!("{} already held by {}", platform.column(), holder)));
            }
        }
        match places.iter_mut().find(|p| p.id == place_id) {
            Some(place) if place.platform_id(platform).is_none() => {
                place.set_platform_id(platform, identifier);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

// =============================================================================
// CANDIDATE SOURCE
// =============================================================================

/// Distance and name similarity over a [`MemoryPlaces`] store.
pub struct MemoryCandidates {
    places: Arc<MemoryPlaces>,
    failing: Mutex<bool>,
    nearby_radii: Mutex<Vec<f64>>,
}

impl MemoryCandidates {
    pub fn new(places: Arc<MemoryPlaces>) -> Self {
        Self {
            places,
            failing: Mutex::new(false),
            nearby_radii: Mutex::new(Vec::new()),
        }
    }

    pub fn fail(&self) {
        *self.failing.lock().unwrap() = true;
    }

    pub fn nearby_radii(&self) -> Vec<f64> {
        self.nearby_radii.lock().unwrap().clone()
    }

    fn check(&self) -> Result<()> {
        if *self.failing.lock().unwrap() {
            return Err(Error::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }
}

fn distance(place: &Place, point: &GeoPoint) -> f64 {
    haversine_m(place.location.lat, place.location.lon, point.lat, point.lon)
}

/// Both sides carry an identifier for the platform and they differ.
fn conflicts(held: &Option<String>, wanted: &Option<String>) -> bool {
    matches!((held, wanted), (Some(h), Some(w)) if h != w)
}

#[async_trait]
impl MatchCandidateSource for MemoryCandidates {
    async fn find_candidates(&self, query: &CandidateQuery) -> Result<Vec<CandidateMatch>> {
        self.check()?;
        let mut matches: Vec<CandidateMatch> = self
            .places
            .all()
            .into_iter()
            .filter(|p| {
                !conflicts(&p.google_place_id, &query.google_place_id)
                    && !conflicts(&p.apple_place_id, &query.apple_place_id)
            })
            .filter_map(|p| {
                let distance_m = distance(&p, &query.location);
                let similarity = name_similarity(&p.name, &query.name);
                (distance_m <= query.radius_m && similarity > query.name_threshold).then(|| CandidateMatch {
                    matched_id: p.id.clone(),
                    matched_source: MatchedSource::Canonical,
                    matched_name: p.name.clone(),
                    match_confidence: similarity * (1.0 - distance_m / query.radius_m / 2.0),
                    distance_m,
                    name_similarity: similarity,
                    google_place_id: p.google_place_id.clone(),
                    apple_place_id: p.apple_place_id.clone(),
                })
            })
            .collect();
        matches.sort_by(|a, b| b.match_confidence.total_cmp(&a.match_confidence));
        Ok(matches)
    }

    async fn find_nearby(&self, point: GeoPoint, radius_m: f64) -> Result<Option<NearbyPlace>> {
        self.check()?;
        self.nearby_radii.lock().unwrap().push(radius_m);
        Ok(self
            .places
            .all()
            .into_iter()
            .map(|p| (distance(&p, &point), p))
            .filter(|(d, _)| *d <= radius_m)
            .min_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(distance_m, p)| NearbyPlace {
                id: p.id,
                name: p.name,
                location: p.location,
                distance_m,
                category: p.category.primary,
                address: p.address,
                google_place_id: p.google_place_id,
                apple_place_id: p.apple_place_id,
            }))
    }
}

// =============================================================================
// EXPORT
// =============================================================================

/// Exports a fixed place list filtered by bbox, recording each query.
#[derive(Default)]
pub struct MemoryExporter {
    places: Mutex<Vec<Place>>,
    queries: Mutex<Vec<ExportQuery>>,
}

impl MemoryExporter {
    pub fn add(&self, place: Place) {
        self.places.lock().unwrap().push(place);
    }

    pub fn queries(&self) -> Vec<ExportQuery> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl FeatureSource for MemoryExporter {
    async fn feature_collection(&self, query: &ExportQuery) -> Result<FeatureCollection> {
        self.queries.lock().unwrap().push(query.clone());
        let places: Vec<Place> = self
            .places
            .lock()
            .unwrap()
            .iter()
            .filter(|p| query.bbox.contains(&p.location))
            .take(query.limit as usize)
            .cloned()
            .collect();
        Ok(FeatureCollection::from_places(&places))
    }
}

// =============================================================================
// APP
// =============================================================================

pub struct TestApp {
    pub router: Router,
    pub places: Arc<MemoryPlaces>,
    pub candidates: Arc<MemoryCandidates>,
    pub exporter: Arc<MemoryExporter>,
    pub cache: Arc<PlaceCache>,
}

pub struct TestAppBuilder {
    providers: Vec<MockProvider>,
    rate_limit: Option<u64>,
}

impl TestAppBuilder {
    pub fn provider(mut self, provider: MockProvider) -> Self {
        self.providers.push(provider);
        self
    }

    pub fn rate_limit(mut self, requests: u64) -> Self {
        self.rate_limit = Some(requests);
        self
    }

    pub fn build(self) -> TestApp {
        let places = Arc::new(MemoryPlaces::default());
        let candidates = Arc::new(MemoryCandidates::new(places.clone()));
        let exporter = Arc::new(MemoryExporter::default());
        let cache = Arc::new(PlaceCache::in_memory(128));

        let mut registry = ProviderRegistry::new();
        for provider in self.providers {
            registry.register(Arc::new(provider));
        }
        let gateway: Arc<dyn CacheGateway> = cache.clone();

        let state = AppState {
            orchestrator: SearchOrchestrator::new(registry, gateway.clone()),
            resolver: IdentityResolver::new(places.clone(), candidates.clone(), gateway),
            bridge: BridgeLookup::new(places.clone(), candidates.clone()),
            exporter: exporter.clone(),
            rate_limiter: self.rate_limit.and_then(|requests| {
                RateLimitConfig {
                    enabled: true,
                    requests,
                    period_secs: 60,
                }
                .build()
            }),
        };

        TestApp {
            router: build_router(state, parse_allowed_origins(None)),
            places,
            candidates,
            exporter,
            cache,
        }
    }
}

/// Response status, headers and body (JSON, or `Value::Null` when empty).
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestApp {
    pub fn builder() -> TestAppBuilder {
        TestAppBuilder {
            providers: Vec::new(),
            rate_limit: None,
        }
    }

    pub async fn get(&self, uri: &str) -> TestResponse {
        self.send(Method::GET, uri, None).await
    }

    pub async fn post(&self, uri: &str, body: Value) -> TestResponse {
        self.send(Method::POST, uri, Some(body.to_string())).await
    }

    pub async fn post_raw(&self, uri: &str, body: &str) -> TestResponse {
        self.send(Method::POST, uri, Some(body.to_string())).await
    }

    async fn send(&self, method: Method, uri: &str, body: Option<String>) -> TestResponse {
        let mut request = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                request = request.header(header::CONTENT_TYPE, "application/json");
                Body::from(json)
            }
            None => Body::empty(),
        };
        let response = self
            .router
            .clone()
            .oneshot(request.body(body).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        TestResponse {
            status,
            headers,
            body,
        }
    }
}

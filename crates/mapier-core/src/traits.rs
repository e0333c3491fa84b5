//! Core traits for mapier abstractions.
//!
//! These traits define the seams between orchestration logic and the
//! concrete data sources, persistence and cache backends, so each side
//! can be swapped or faked in tests.

use std::time::Duration;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use tracing::warn;

use crate::error::Result;
use crate::geo::GeoPoint;
use crate::models::*;

// =============================================================================
// PROVIDER TRAITS
// =============================================================================

/// A source of places (local geodatabase, commercial API, dataset).
///
/// Each implementation owns the normalization of its wire format into
/// [`Place`]; nothing downstream sees provider-specific shapes.
#[async_trait]
pub trait PlaceProvider: Send + Sync {
    /// Stable provider name ("local", "google", ...).
    fn name(&self) -> &str;

    /// Merge priority; lower is more trusted.
    fn priority(&self) -> u8;

    /// Per-call timeout. `None` means the call is not bounded by the
    /// orchestrator.
    fn timeout(&self) -> Option<Duration>;

    /// Places matching `query`, at most `query.limit` of them. When more
    /// match, keep the ones the provider considers best.
    async fn search(&self, query: &SearchQuery) -> Result<Vec<Place>>;

    /// Look up one place by this provider's id.
    async fn get_by_id(&self, id: &str) -> Result<Option<Place>>;

    /// Whether [`PlaceProvider::autocomplete`] returns anything.
    fn supports_autocomplete(&self) -> bool {
        false
    }

    /// Suggestions for a partial input.
    async fn autocomplete(&self, _query: &AutocompleteQuery) -> Result<Vec<AutocompleteSuggestion>> {
        Ok(Vec::new())
    }

    /// Check if the provider is reachable.
    async fn health_check(&self) -> Result<bool>;
}

// =============================================================================
// MATCHING TRAITS
// =============================================================================

/// Parameters for a candidate match lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateQuery {
    pub name: String,
    pub location: GeoPoint,
    pub google_place_id: Option<String>,
    pub apple_place_id: Option<String>,
    pub radius_m: f64,
    pub name_threshold: f64,
}

/// Spatial and fuzzy-name matching against canonical records.
#[async_trait]
pub trait MatchCandidateSource: Send + Sync {
    /// Canonical records within `radius_m` whose name similarity exceeds
    /// `name_threshold`, best match first.
    ///
    /// A record already holding a different identifier for a platform the
    /// query supplies is never a candidate.
    async fn find_candidates(&self, query: &CandidateQuery) -> Result<Vec<CandidateMatch>>;

    /// The single nearest canonical record within `radius_m`.
    async fn find_nearby(&self, point: GeoPoint, radius_m: f64) -> Result<Option<NearbyPlace>>;
}

// =============================================================================
// PERSISTENCE TRAITS
// =============================================================================

/// Canonical place records.
#[async_trait]
pub trait PlaceRepository: Send + Sync {
    /// Fetch a canonical record by id.
    async fn fetch(&self, id: &str) -> Result<Option<Place>>;

    /// Find the record holding `identifier` for `platform`.
    async fn find_by_platform_id(&self, platform: Platform, identifier: &str) -> Result<Option<Place>>;

    /// Create a custom record.
    ///
    /// Returns `Error::Conflict` when a uniqueness constraint rejects the
    /// insert (e.g. another request linked the same identifier first).
    async fn insert_custom(&self, place: NewCustomPlace) -> Result<Place>;

    /// Set `platform`'s identifier on `place_id` only if it is currently
    /// unset, as one conditional update.
    ///
    /// Returns `true` when the row was updated.
    async fn link_platform_id(&self, place_id: &str, platform: Platform, identifier: &str) -> Result<bool>;
}

// =============================================================================
// CACHE TRAITS
// =============================================================================

/// Best-effort key/value cache with per-entry TTL.
///
/// Implementations log and absorb backend failures: a failed read is a
/// miss and a failed write is a no-op.
#[async_trait]
pub trait CacheGateway: Send + Sync {
    async fn get(&self, key: &str) -> Option<String>;

    async fn set(&self, key: &str, value: &str, ttl: Duration);

    async fn invalidate(&self, key: &str);
}

/// Read and decode a JSON entry. Undecodable entries count as misses.
pub async fn cache_get_json<T, C>(cache: &C, key: &str) -> Option<T>
where
    T: DeserializeOwned,
    C: CacheGateway + ?Sized,
{
    let raw = cache.get(key).await?;
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(
                subsystem = "cache",
                cache_key = key,
                error = %e,
                "Discarding undecodable cache entry"
            );
            None
        }
    }
}

/// Encode and store a JSON entry.
pub async fn cache_set_json<T, C>(cache: &C, key: &str, value: &T, ttl: Duration)
where
    T: Serialize + Sync,
    C: CacheGateway + ?Sized,
{
    match serde_json::to_string(value) {
        Ok(raw) => cache.set(key, &raw, ttl).await,
        Err(e) => warn!(
            subsystem = "cache",
            cache_key = key,
            error = %e,
            "Failed to encode cache entry"
        ),
    }
}

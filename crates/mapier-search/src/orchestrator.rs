//! Multi-provider search orchestration.
//!
//! One request fans out to every enabled provider concurrently. Each call
//! is bounded by its provider's own timeout; a provider that times out or
//! errors is left out of the merge and reported in the result metadata.
//! The request fails only when every provider failed.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use tracing::{debug, info, instrument, warn};

use mapier_core::{
    cache_get_json, cache_set_json, defaults, mean_confidence, normalize_name,
    AutocompleteQuery, AutocompleteSuggestion, CacheGateway, Error, Place, PlaceProvider,
    ProviderFailure, ProviderHealthStatus, ProviderOutcome, ProviderResult, ProviderStatus,
    Result, ResultMetadata, SearchQuery,
};
use mapier_providers::ProviderRegistry;

use crate::cache_key::{autocomplete_key, place_key, search_key};
use crate::dedup::{merge_places, Candidate, MergeConfig};
use crate::ranking::rank;

/// Timeout for health probes of providers without their own timeout.
const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

/// Tunables for [`SearchOrchestrator`].
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub merge: MergeConfig,
    pub search_ttl: Duration,
    pub place_ttl: Duration,
    pub autocomplete_ttl: Duration,
    pub autocomplete_limit: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            merge: MergeConfig::default(),
            search_ttl: Duration::from_secs(defaults::CACHE_TTL_SEARCH_SECS),
            place_ttl: Duration::from_secs(defaults::CACHE_TTL_PLACE_SECS),
            autocomplete_ttl: Duration::from_secs(defaults::CACHE_TTL_AUTOCOMPLETE_SECS),
            autocomplete_limit: defaults::AUTOCOMPLETE_LIMIT,
        }
    }
}

impl OrchestratorConfig {
    pub fn from_env() -> Self {
        Self {
            merge: MergeConfig::from_env(),
            ..Self::default()
        }
    }
}

/// Outcome of one bounded provider call.
struct ProviderCall<T> {
    provider: String,
    priority: u8,
    latency_ms: u64,
    result: Result<T>,
}

impl<T> ProviderCall<T> {
    fn status(&self) -> ProviderStatus {
        match &self.result {
            Ok(_) => ProviderStatus::Ok,
            Err(Error::ProviderTimeout { .. }) => ProviderStatus::Timeout,
            Err(_) => ProviderStatus::Error,
        }
    }

    fn failure(&self) -> Option<ProviderFailure> {
        let err = self.result.as_ref().err()?;
        Some(ProviderFailure {
            provider: self.provider.clone(),
            kind: self.status().to_string(),
            message: err.to_string(),
        })
    }
}

/// Run `call` against `provider`, bounded by the provider's timeout.
async fn bounded<'a, T, F>(provider: &'a dyn PlaceProvider, call: F) -> ProviderCall<T>
where
    F: std::future::Future<Output = Result<T>> + 'a,
{
    let start = Instant::now();
    let result = match provider.timeout() {
        Some(limit) => match tokio::time::timeout(limit, call).await {
            Ok(r) => r,
            Err(_) => Err(Error::ProviderTimeout {
                provider: provider.name().to_string(),
            }),
        },
        None => call.await,
    };
    let latency_ms = start.elapsed().as_millis() as u64;

    if let Err(e) = &result {
        warn!(
            subsystem = "search",
            component = "orchestrator",
            provider = provider.name(),
            duration_ms = latency_ms,
            error = %e,
            "Provider call failed, excluding from merge"
        );
    }

    ProviderCall {
        provider: provider.name().to_string(),
        priority: provider.priority(),
        latency_ms,
        result,
    }
}

/// Fans searches out to providers, merges, ranks and caches the results.
#[derive(Clone)]
pub struct SearchOrchestrator {
    registry: ProviderRegistry,
    cache: Arc<dyn CacheGateway>,
    config: OrchestratorConfig,
}

impl SearchOrchestrator {
    pub fn new(registry: ProviderRegistry, cache: Arc<dyn CacheGateway>) -> Self {
        Self::with_config(registry, cache, OrchestratorConfig::default())
    }

    pub fn with_config(
        registry: ProviderRegistry,
        cache: Arc<dyn CacheGateway>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            registry,
            cache,
            config,
        }
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Merged, ranked places for `query`.
    ///
    /// Served from cache when an identical query was answered recently.
    /// Results are cached only when every provider answered.
    #[instrument(skip(self, query), fields(subsystem = "search", component = "orchestrator", op = "search"))]
    pub async fn search(&self, query: &SearchQuery) -> Result<ProviderResult> {
        query.validate()?;
        let start = Instant::now();
        let key = search_key(query);

        if let Some(mut cached) = cache_get_json::<ProviderResult, _>(self.cache.as_ref(), &key).await {
            cached.metadata.cached = true;
            debug!(cache_key = %key, result_count = cached.places.len(), "Search cache hit");
            return Ok(cached);
        }
        debug!(cache_key = %key, "Search cache miss");

        let window = query.candidate_window();
        let calls = join_all(
            self.registry
                .providers()
                .iter()
                .map(|p| bounded(p.as_ref(), p.search(&window))),
        )
        .await;

        let outcomes: Vec<ProviderOutcome> = calls
            .iter()
            .map(|c| ProviderOutcome {
                provider: c.provider.clone(),
                status: c.status(),
                latency_ms: c.latency_ms,
                count: c.result.as_ref().map(Vec::len).unwrap_or(0),
                error: c.result.as_ref().err().map(ToString::to_string),
            })
            .collect();
        let failures: Vec<ProviderFailure> = calls.iter().filter_map(ProviderCall::failure).collect();

        if failures.len() == calls.len() {
            warn!(
                providers_failed = failures.len(),
                "All providers failed"
            );
            return Err(Error::AllProvidersFailed(failures));
        }

        let origin = query.location.point();
        let radius = query.location.radius_m;
        let mut candidates = Vec::new();
        for call in calls {
            let Ok(places) = call.result else { continue };
            for mut place in places {
                if place.distance_m.is_none() {
                    place.measure_from(&origin);
                }
                if place.distance_m.is_some_and(|d| d <= radius) {
                    candidates.push(Candidate::new(place, call.priority));
                }
            }
        }
        let candidate_count = candidates.len();

        let mut merged = merge_places(candidates, &self.config.merge);
        rank(&mut merged);
        let total = merged.len();
        let places: Vec<Place> = merged
            .into_iter()
            .skip(query.offset as usize)
            .take(query.limit as usize)
            .map(|c| c.place)
            .collect();

        let latency_ms = start.elapsed().as_millis() as u64;
        let result = ProviderResult {
            provider: defaults::PROVIDER_AGGREGATE.to_string(),
            metadata: ResultMetadata {
                count: places.len(),
                cached: false,
                latency_ms,
                confidence: mean_confidence(&places),
                total,
                providers: outcomes,
            },
            places,
        };

        info!(
            candidate_count,
            result_count = result.places.len(),
            total,
            providers_ok = result.metadata.providers.len() - failures.len(),
            providers_failed = failures.len(),
            duration_ms = latency_ms,
            "Search complete"
        );

        if failures.is_empty() {
            cache_set_json(self.cache.as_ref(), &key, &result, self.config.search_ttl).await;
        } else {
            debug!(cache_key = %key, "Partial result not cached");
        }
        Ok(result)
    }

    /// Suggestions from every provider that supports autocomplete,
    /// de-duplicated by normalized text in provider priority order.
    #[instrument(skip(self, query), fields(subsystem = "search", component = "orchestrator", op = "autocomplete"))]
    pub async fn autocomplete(&self, query: &AutocompleteQuery) -> Result<Vec<AutocompleteSuggestion>> {
        query.validate()?;
        let key = autocomplete_key(query);
        if let Some(cached) =
            cache_get_json::<Vec<AutocompleteSuggestion>, _>(self.cache.as_ref(), &key).await
        {
            debug!(cache_key = %key, "Autocomplete cache hit");
            return Ok(cached);
        }

        let providers: Vec<&dyn PlaceProvider> = self
            .registry
            .providers()
            .iter()
            .map(|p| p.as_ref())
            .filter(|p| p.supports_autocomplete())
            .collect();
        if providers.is_empty() {
            debug!("No provider supports autocomplete");
            return Ok(Vec::new());
        }

        let calls = join_all(
            providers
                .iter()
                .map(|p| bounded(*p, p.autocomplete(query))),
        )
        .await;
        let failures: Vec<ProviderFailure> = calls.iter().filter_map(ProviderCall::failure).collect();
        if failures.len() == calls.len() {
            return Err(Error::AllProvidersFailed(failures));
        }

        // `calls` follows registry order, which is priority order.
        let mut seen = std::collections::HashSet::new();
        let suggestions: Vec<AutocompleteSuggestion> = calls
            .into_iter()
            .filter_map(|c| c.result.ok())
            .flatten()
            .filter(|s| seen.insert(normalize_name(&s.text)))
            .take(self.config.autocomplete_limit)
            .collect();

        if failures.is_empty() {
            cache_set_json(self.cache.as_ref(), &key, &suggestions, self.config.autocomplete_ttl).await;
        }
        Ok(suggestions)
    }

    /// Place detail: each provider in priority order is asked for `id`;
    /// the first hit is cached under `place:{id}`.
    #[instrument(skip(self), fields(subsystem = "search", component = "orchestrator", op = "get_place"))]
    pub async fn get_place(&self, id: &str) -> Result<Place> {
        let key = place_key(id);
        if let Some(place) = cache_get_json::<Place, _>(self.cache.as_ref(), &key).await {
            debug!(cache_key = %key, "Place cache hit");
            return Ok(place);
        }

        let mut failures = Vec::new();
        for provider in self.registry.providers() {
            let call = bounded(provider.as_ref(), provider.get_by_id(id)).await;
            let status = call.status();
            match call.result {
                Ok(Some(mut place)) => {
                    place.distance_m = None;
                    cache_set_json(self.cache.as_ref(), &key, &place, self.config.place_ttl).await;
                    debug!(provider = %call.provider, place_id = id, "Place found");
                    return Ok(place);
                }
                Ok(None) => {}
                Err(e) => failures.push(ProviderFailure {
                    provider: call.provider,
                    kind: status.to_string(),
                    message: e.to_string(),
                }),
            }
        }

        if !failures.is_empty() && failures.len() == self.registry.len() {
            return Err(Error::AllProvidersFailed(failures));
        }
        Err(Error::NotFound(format!("place {}", id)))
    }

    /// Drop the cached detail entry for `id`.
    pub async fn invalidate_place(&self, id: &str) {
        self.cache.invalidate(&place_key(id)).await;
    }

    /// Probe every enabled provider concurrently.
    #[instrument(skip(self), fields(subsystem = "search", component = "orchestrator", op = "health"))]
    pub async fn health(&self) -> Vec<ProviderHealthStatus> {
        let probes = self.registry.providers().iter().map(|p| async move {
            let start = Instant::now();
            let limit = p.timeout().unwrap_or(HEALTH_TIMEOUT);
            let (healthy, error) = match tokio::time::timeout(limit, p.health_check()).await {
                Ok(Ok(true)) => (true, None),
                Ok(Ok(false)) => (false, Some("health check failed".to_string())),
                Ok(Err(e)) => (false, Some(e.to_string())),
                Err(_) => (false, Some("health check timed out".to_string())),
            };
            ProviderHealthStatus {
                provider: p.name().to_string(),
                priority: p.priority(),
                healthy,
                latency_ms: start.elapsed().as_millis() as u64,
                error,
            }
        });
        join_all(probes).await
    }
}

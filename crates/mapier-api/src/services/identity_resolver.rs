//! Cross-platform identity resolution ("conflation").
//!
//! ## Resolution Order
//!
//! For an observed place, the resolver tries:
//! 1. Exact platform identifier match on a canonical record
//! 2. Spatial + fuzzy-name candidate match (`conflate_place`)
//! 3. Creation of a custom record
//!
//! After a match, any supplied identifier the record lacks is linked with
//! a conditional update that only fills an empty column. Identifiers are
//! never overwritten.
//!
//! ## Races
//!
//! Two requests for the same unseen place can both reach step 3. The
//! loser's insert hits the uniqueness constraint on the identifier column
//! and the match path is re-run, which then finds the winner's record.

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use mapier_core::{
    defaults, CacheGateway, CandidateQuery, Error, MatchCandidateSource, NewCustomPlace, Place,
    PlaceObservation, PlaceRepository, Platform, Resolution, ResolutionMethod, ResolvedPlace,
    Result, SyncStatus,
};
use mapier_search::place_key;

/// Tunables for [`IdentityResolver`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolverConfig {
    /// Candidate search radius in meters.
    pub radius_m: f64,
    /// Name similarity a candidate must exceed.
    pub name_threshold: f64,
    /// Match-path re-runs after a lost creation race.
    pub race_retries: u32,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            radius_m: defaults::CONFLATION_RADIUS_M,
            name_threshold: defaults::CONFLATION_NAME_THRESHOLD,
            race_retries: defaults::CREATE_RACE_RETRIES,
        }
    }
}

impl ResolverConfig {
    /// Reads `CONFLATION_RADIUS_METERS` and `CONFLATION_NAME_THRESHOLD`.
    pub fn from_env() -> Self {
        let base = Self::default();
        Self {
            radius_m: std::env::var("CONFLATION_RADIUS_METERS")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|r: &f64| *r > 0.0)
                .unwrap_or(base.radius_m),
            name_threshold: std::env::var("CONFLATION_NAME_THRESHOLD")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|t: &f64| (0.0..=1.0).contains(t))
                .unwrap_or(base.name_threshold),
            ..base
        }
    }
}

/// Resolves observations to canonical records and manages identifier
/// linkage.
#[derive(Clone)]
pub struct IdentityResolver {
    places: Arc<dyn PlaceRepository>,
    candidates: Arc<dyn MatchCandidateSource>,
    cache: Arc<dyn CacheGateway>,
    config: ResolverConfig,
}

impl IdentityResolver {
    pub fn new(
        places: Arc<dyn PlaceRepository>,
        candidates: Arc<dyn MatchCandidateSource>,
        cache: Arc<dyn CacheGateway>,
    ) -> Self {
        Self::with_config(places, candidates, cache, ResolverConfig::default())
    }

    pub fn with_config(
        places: Arc<dyn PlaceRepository>,
        candidates: Arc<dyn MatchCandidateSource>,
        cache: Arc<dyn CacheGateway>,
        config: ResolverConfig,
    ) -> Self {
        Self {
            places,
            candidates,
            cache,
            config,
        }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Resolve `obs` to a canonical record, creating one if nothing
    /// matches.
    #[instrument(
        skip(self, obs),
        fields(subsystem = "identity", component = "resolver", op = "resolve", source_platform = %obs.source_platform)
    )]
    pub async fn resolve(&self, obs: &PlaceObservation) -> Result<ResolvedPlace> {
        obs.validate()?;
        let obs = &obs.normalized();

        for attempt in 0..=self.config.race_retries {
            if let Some((place, resolution)) = self.find_match(obs).await? {
                let (place, linked) = self.link_missing(place, obs).await?;
                info!(
                    place_id = %place.id,
                    method = %resolution.method,
                    confidence = resolution.confidence,
                    linked = linked.len(),
                    "Observation resolved"
                );
                return Ok(ResolvedPlace {
                    place,
                    resolution,
                    linked,
                });
            }

            match self.places.insert_custom(NewCustomPlace::from_observation(obs)).await {
                Ok(place) => {
                    let linked: Vec<Platform> = obs.platform_ids().map(|(p, _)| p).collect();
                    info!(
                        place_id = %place.id,
                        method = %ResolutionMethod::CreatedNew,
                        "Created custom place for unmatched observation"
                    );
                    return Ok(ResolvedPlace {
                        place,
                        resolution: Resolution {
                            method: ResolutionMethod::CreatedNew,
                            confidence: defaults::CREATED_CONFIDENCE,
                            distance_m: None,
                        },
                        linked,
                    });
                }
                Err(e) if e.is_unique_violation() => {
                    warn!(
                        attempt,
                        error = %e,
                        "Lost creation race, re-running match"
                    );
                }
                Err(e) => return Err(e),
            }
        }

        Err(Error::ConflationFailure(format!(
            "place still unresolved after {} creation retries",
            self.config.race_retries
        )))
    }

    /// Layers 1 and 2 of the match policy.
    async fn find_match(&self, obs: &PlaceObservation) -> Result<Option<(Place, Resolution)>> {
        for (platform, identifier) in obs.platform_ids() {
            if let Some(place) = self.places.find_by_platform_id(platform, identifier).await? {
                debug!(place_id = %place.id, platform = %platform, "Exact identifier match");
                return Ok(Some((
                    place,
                    Resolution {
                        method: ResolutionMethod::ExactIdentifier,
                        confidence: defaults::EXACT_MATCH_CONFIDENCE,
                        distance_m: None,
                    },
                )));
            }
        }

        let query = CandidateQuery {
            name: obs.name.clone(),
            location: obs.point(),
            google_place_id: obs.google_place_id.clone(),
            apple_place_id: obs.apple_place_id.clone(),
            radius_m: self.config.radius_m,
            name_threshold: self.config.name_threshold,
        };
        let candidates = self
            .candidates
            .find_candidates(&query)
            .await
            .map_err(|e| match e {
                Error::ConflationFailure(_) => e,
                other => Error::ConflationFailure(other.to_string()),
            })?;
        debug!(candidate_count = candidates.len(), "Spatial candidates");

        for candidate in candidates {
            match self.places.fetch(&candidate.matched_id).await? {
                Some(place) => {
                    debug!(
                        place_id = %place.id,
                        distance_m = candidate.distance_m,
                        name_similarity = candidate.name_similarity,
                        "Spatial match"
                    );
                    return Ok(Some((
                        place,
                        Resolution {
                            method: ResolutionMethod::SpatialMatch,
                            confidence: candidate.match_confidence.clamp(0.0, 1.0),
                            distance_m: Some(candidate.distance_m),
                        },
                    )));
                }
                None => {
                    warn!(matched_id = %candidate.matched_id, "Candidate vanished before fetch");
                }
            }
        }
        Ok(None)
    }

    /// Link every identifier in `obs` that `place` lacks. Existing values
    /// are kept even when they differ.
    async fn link_missing(&self, mut place: Place, obs: &PlaceObservation) -> Result<(Place, Vec<Platform>)> {
        let mut linked = Vec::new();
        for (platform, identifier) in obs.platform_ids() {
            match place.platform_id(platform) {
                Some(existing) if existing == identifier => continue,
                Some(existing) => {
                    debug!(
                        place_id = %place.id,
                        platform = %platform,
                        existing,
                        observed = identifier,
                        "Identifier already set, keeping existing value"
                    );
                    continue;
                }
                None => {}
            }

            match self.places.link_platform_id(&place.id, platform, identifier).await {
                Ok(true) => {
                    place.set_platform_id(platform, identifier);
                    linked.push(platform);
                }
                Ok(false) => {
                    debug!(place_id = %place.id, platform = %platform, "Identifier linked concurrently");
                }
                Err(e) if e.is_unique_violation() => {
                    warn!(
                        place_id = %place.id,
                        platform = %platform,
                        error = %e,
                        "Identifier held by another place, not linked"
                    );
                }
                Err(e) => return Err(e),
            }
        }

        if !linked.is_empty() {
            self.cache.invalidate(&place_key(&place.id)).await;
        }
        Ok((place, linked))
    }

    /// Persist `identifier` as `place_id`'s identifier for `platform`.
    ///
    /// Succeeds with `AlreadyLinked` when the same value is already
    /// stored; a different stored value is a `Conflict`.
    #[instrument(skip(self), fields(subsystem = "identity", component = "resolver", op = "sync_pli"))]
    pub async fn sync_pli(&self, place_id: &str, platform: Platform, identifier: &str) -> Result<SyncStatus> {
        let identifier = identifier.trim();
        let mut errors = Vec::new();
        if place_id.trim().is_empty() {
            errors.push(mapier_core::FieldError::new("place_id", "is required"));
        }
        if identifier.is_empty() {
            errors.push(mapier_core::FieldError::new("identifier", "is required"));
        }
        if !errors.is_empty() {
            return Err(Error::Validation(errors));
        }

        let place = self
            .places
            .fetch(place_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("place {}", place_id)))?;

        if let Some(status) = compare_existing(&place, platform, identifier)? {
            return Ok(status);
        }

        if self.places.link_platform_id(place_id, platform, identifier).await? {
            self.cache.invalidate(&place_key(place_id)).await;
            info!(place_id, platform = %platform, "Identifier linked");
            return Ok(SyncStatus::Linked);
        }

        // Someone filled the column between our read and the update.
        let current = self
            .places
            .fetch(place_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("place {}", place_id)))?;
        compare_existing(&current, platform, identifier)?.ok_or_else(|| {
            Error::Internal(format!("{} on place {} neither linked nor set", platform.column(), place_id))
        })
    }
}

/// `Some(AlreadyLinked)` for the same stored value, `Conflict` for a
/// different one, `None` when the column is empty.
fn compare_existing(place: &Place, platform: Platform, identifier: &str) -> Result<Option<SyncStatus>> {
    match place.platform_id(platform) {
        Some(existing) if existing == identifier => Ok(Some(SyncStatus::AlreadyLinked)),
        Some(_) => Err(Error::Conflict(format!(
            "place {} already has a different {}",
            place.id,
            platform.column()
        ))),
        None => Ok(None),
    }
}

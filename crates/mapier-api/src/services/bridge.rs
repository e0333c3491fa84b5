//! Read paths over resolved identities: cross-platform bridge and
//! "current place" inference.

use std::sync::Arc;

use tracing::{debug, instrument};

use mapier_core::{
    defaults, geo::check_coordinates, BridgeHint, BridgeResult, Error, GeoPoint,
    MatchCandidateSource, NearbyPlace, PlaceRepository, Platform, Result, SearchHint,
};

/// Clamp a requested find-nearby radius into the accepted range.
pub fn clamp_nearby_radius(radius_m: Option<f64>) -> f64 {
    match radius_m {
        Some(r) if r.is_finite() => r.clamp(defaults::NEARBY_RADIUS_MIN_M, defaults::NEARBY_RADIUS_MAX_M),
        _ => defaults::NEARBY_RADIUS_M,
    }
}

#[derive(Clone)]
pub struct BridgeLookup {
    places: Arc<dyn PlaceRepository>,
    candidates: Arc<dyn MatchCandidateSource>,
}

impl BridgeLookup {
    pub fn new(places: Arc<dyn PlaceRepository>, candidates: Arc<dyn MatchCandidateSource>) -> Self {
        Self { places, candidates }
    }

    /// The identifier `target` uses for `place_id`, or the parameters for
    /// a native search when none is linked yet.
    #[instrument(skip(self), fields(subsystem = "identity", component = "bridge", op = "bridge"))]
    pub async fn bridge(&self, place_id: &str, target: Platform) -> Result<BridgeResult> {
        let place = self
            .places
            .fetch(place_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("place {}", place_id)))?;

        let target_identifier = place.platform_id(target).map(str::to_string);
        let (hint, search) = match target_identifier {
            Some(_) => (BridgeHint::Cached, None),
            None => (
                BridgeHint::SearchRequired,
                Some(SearchHint {
                    query: place.name.clone(),
                    lat: place.location.lat,
                    lon: place.location.lon,
                }),
            ),
        };
        debug!(place_id, target = %target, hint = ?hint, "Bridge lookup");

        Ok(BridgeResult {
            place: place.summary(),
            target_platform: target,
            target_identifier,
            hint,
            search,
        })
    }

    /// Nearest canonical record within the (clamped) radius.
    #[instrument(skip(self), fields(subsystem = "identity", component = "bridge", op = "find_nearby"))]
    pub async fn find_nearby(&self, lat: f64, lon: f64, radius_m: Option<f64>) -> Result<Option<NearbyPlace>> {
        let mut errors = Vec::new();
        check_coordinates("", lat, lon, &mut errors);
        if !errors.is_empty() {
            return Err(Error::Validation(errors));
        }

        let radius = clamp_nearby_radius(radius_m);
        let nearby = self
            .candidates
            .find_nearby(GeoPoint::new(lat, lon), radius)
            .await?;
        debug!(
            radius_m = radius,
            found = nearby.is_some(),
            "Nearby lookup"
        );
        Ok(nearby)
    }
}

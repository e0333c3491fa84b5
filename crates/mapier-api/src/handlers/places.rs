//! Place endpoints: detail, autocomplete, identity resolution, bridge,
//! nearby inference and GeoJSON export.

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::header,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use mapier_core::{
    AutocompleteQuery, AutocompleteSuggestion, BoundingBox, BridgeResult, Error, NearbyPlace,
    Place, PlaceObservation, Platform, ResolvedPlace, SyncStatus,
};
use mapier_db::ExportQuery;

use crate::error::ErrorResponse;
use crate::services::clamp_nearby_radius;
use crate::{ApiError, AppState};

const GEOJSON_CONTENT_TYPE: &str = "application/geo+json";

fn parse_platform(field: &str, raw: Option<&str>) -> Result<Platform, Error> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(value) => value.parse().map_err(|msg: String| Error::validation(field, msg)),
        None => Err(Error::validation(field, "is required")),
    }
}

// =============================================================================
// AUTOCOMPLETE
// =============================================================================

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct AutocompleteResponse {
    pub success: bool,
    pub suggestions: Vec<AutocompleteSuggestion>,
}

/// Suggestions for a partial input, deduplicated across providers.
///
/// GET /places/autocomplete
#[utoipa::path(get, path = "/places/autocomplete", tag = "Places",
    params(AutocompleteQuery),
    responses(
        (status = 200, description = "Suggestions in provider priority order", body = AutocompleteResponse),
        (status = 400, description = "Missing input", body = ErrorResponse)
    ))]
pub async fn autocomplete(
    State(state): State<AppState>,
    query: Result<Query<AutocompleteQuery>, QueryRejection>,
) -> Result<Json<AutocompleteResponse>, ApiError> {
    let Query(query) = query?;
    let suggestions = state.orchestrator.autocomplete(&query).await?;
    Ok(Json(AutocompleteResponse {
        success: true,
        suggestions,
    }))
}

// =============================================================================
// DETAIL
// =============================================================================

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct PlaceResponse {
    pub success: bool,
    pub place: Place,
}

/// Full detail for one place, from the first provider that knows it.
///
/// GET /places/:id
#[utoipa::path(get, path = "/places/{id}", tag = "Places",
    params(("id" = String, Path, description = "Place id")),
    responses(
        (status = 200, description = "Place detail", body = PlaceResponse),
        (status = 404, description = "No provider knows this id", body = ErrorResponse)
    ))]
pub async fn get_place(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PlaceResponse>, ApiError> {
    let place = state.orchestrator.get_place(&id).await?;
    Ok(Json(PlaceResponse {
        success: true,
        place,
    }))
}

// =============================================================================
// RESOLVE / SYNC
// =============================================================================

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ResolveResponse {
    pub success: bool,
    #[serde(flatten)]
    pub resolved: ResolvedPlace,
}

/// Map an observed place onto a canonical record, creating one if
/// nothing matches.
///
/// POST /places/resolve
#[utoipa::path(post, path = "/places/resolve", tag = "Identity",
    request_body = PlaceObservation,
    responses(
        (status = 200, description = "Canonical record and how it was found", body = ResolveResponse),
        (status = 400, description = "Invalid observation", body = ErrorResponse),
        (status = 500, description = "Candidate matching failed", body = ErrorResponse)
    ))]
pub async fn resolve(
    State(state): State<AppState>,
    payload: Result<Json<PlaceObservation>, JsonRejection>,
) -> Result<Json<ResolveResponse>, ApiError> {
    let Json(obs) = payload?;
    let resolved = state.resolver.resolve(&obs).await?;
    Ok(Json(ResolveResponse {
        success: true,
        resolved,
    }))
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct SyncPliRequest {
    pub place_id: String,
    /// "google" or "apple"
    pub platform: String,
    pub identifier: String,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct SyncPliResponse {
    pub success: bool,
    pub place_id: String,
    pub platform: Platform,
    pub identifier: String,
    pub status: SyncStatus,
}

/// Record a platform identifier discovered by a client.
///
/// POST /places/sync-pli
#[utoipa::path(post, path = "/places/sync-pli", tag = "Identity",
    request_body = SyncPliRequest,
    responses(
        (status = 200, description = "Identifier linked or already present", body = SyncPliResponse),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 404, description = "Unknown place", body = ErrorResponse),
        (status = 409, description = "A different identifier is already linked", body = ErrorResponse)
    ))]
pub async fn sync_pli(
    State(state): State<AppState>,
    payload: Result<Json<SyncPliRequest>, JsonRejection>,
) -> Result<Json<SyncPliResponse>, ApiError> {
    let Json(req) = payload?;
    let platform = parse_platform("platform", Some(&req.platform))?;
    let identifier = req.identifier.trim().to_string();
    let status = state
        .resolver
        .sync_pli(&req.place_id, platform, &identifier)
        .await?;
    Ok(Json(SyncPliResponse {
        success: true,
        place_id: req.place_id,
        platform,
        identifier,
        status,
    }))
}

// =============================================================================
// BRIDGE / NEARBY
// =============================================================================

#[derive(Debug, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct BridgeParams {
    /// "google" or "apple"
    pub target_platform: Option<String>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct BridgeResponse {
    pub success: bool,
    #[serde(flatten)]
    pub bridge: BridgeResult,
}

/// The identifier a target platform uses for a place, or a search hint
/// when none is linked yet.
///
/// GET /places/:id/bridge
#[utoipa::path(get, path = "/places/{id}/bridge", tag = "Identity",
    params(("id" = String, Path, description = "Canonical place id"), BridgeParams),
    responses(
        (status = 200, description = "Cached identifier or search hint", body = BridgeResponse),
        (status = 400, description = "Missing or unknown target platform", body = ErrorResponse),
        (status = 404, description = "Unknown place", body = ErrorResponse)
    ))]
pub async fn bridge(
    State(state): State<AppState>,
    Path(id): Path<String>,
    params: Result<Query<BridgeParams>, QueryRejection>,
) -> Result<Json<BridgeResponse>, ApiError> {
    let Query(params) = params?;
    let target = parse_platform("target_platform", params.target_platform.as_deref())?;
    let bridge = state.bridge.bridge(&id, target).await?;
    Ok(Json(BridgeResponse {
        success: true,
        bridge,
    }))
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct FindNearbyRequest {
    pub lat: f64,
    pub lon: f64,
    /// Search radius in meters (default 100, clamped to [10, 500]).
    #[serde(default, alias = "radius_m")]
    pub radius_meters: Option<f64>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct FindNearbyResponse {
    pub success: bool,
    /// Nearest canonical record, or null when nothing is in range.
    pub nearby_place: Option<NearbyPlace>,
    /// Radius actually searched.
    pub radius_meters: f64,
}

/// Infer the place a device is currently at.
///
/// POST /places/find-nearby
#[utoipa::path(post, path = "/places/find-nearby", tag = "Identity",
    request_body = FindNearbyRequest,
    responses(
        (status = 200, description = "Nearest place, possibly null", body = FindNearbyResponse),
        (status = 400, description = "Invalid coordinates", body = ErrorResponse)
    ))]
pub async fn find_nearby(
    State(state): State<AppState>,
    payload: Result<Json<FindNearbyRequest>, JsonRejection>,
) -> Result<Json<FindNearbyResponse>, ApiError> {
    let Json(req) = payload?;
    let nearby_place = state
        .bridge
        .find_nearby(req.lat, req.lon, req.radius_meters)
        .await?;
    Ok(Json(FindNearbyResponse {
        success: true,
        nearby_place,
        radius_meters: clamp_nearby_radius(req.radius_meters),
    }))
}

// =============================================================================
// EXPORT
// =============================================================================

#[derive(Debug, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ExportParams {
    /// `min_lon,max_lon,min_lat,max_lat`
    pub bbox: String,
    /// Maximum features (default 1000, at most 10000).
    pub limit: Option<i64>,
}

/// Canonical places inside a bounding box as a GeoJSON FeatureCollection.
///
/// GET /places/export
#[utoipa::path(get, path = "/places/export", tag = "Places",
    params(ExportParams),
    responses(
        (status = 200, description = "GeoJSON FeatureCollection served as application/geo+json"),
        (status = 400, description = "Invalid bbox or limit", body = ErrorResponse)
    ))]
pub async fn export(
    State(state): State<AppState>,
    params: Result<Query<ExportParams>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Query(params) = params?;
    let bbox = BoundingBox::parse(&params.bbox).map_err(|e| Error::Validation(vec![e]))?;
    let mut query = ExportQuery::new(bbox);
    if let Some(limit) = params.limit {
        query = query.with_limit(limit)?;
    }

    let collection = state.exporter.feature_collection(&query).await?;
    debug!(
        subsystem = "api",
        op = "export",
        feature_count = collection.features.len(),
        "Export complete"
    );
    Ok(([(header::CONTENT_TYPE, GEOJSON_CONTENT_TYPE)], Json(collection)))
}

//! Search endpoints.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;

use mapier_core::{ProviderHealthStatus, ProviderResult, SearchQuery};

use crate::error::ErrorResponse;
use crate::{ApiError, AppState};

/// Successful search response.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct SearchResponse {
    pub success: bool,
    #[serde(flatten)]
    pub result: ProviderResult,
}

/// Provider health response.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct SearchHealthResponse {
    pub success: bool,
    /// "healthy" or "degraded"
    pub status: String,
    pub providers: Vec<ProviderHealthStatus>,
}

/// Multi-provider place search.
///
/// POST /search
#[utoipa::path(post, path = "/search", tag = "Search",
    request_body = SearchQuery,
    responses(
        (status = 200, description = "Merged, ranked places", body = SearchResponse),
        (status = 400, description = "Invalid query", body = ErrorResponse),
        (status = 500, description = "Every provider failed", body = ErrorResponse)
    ))]
pub async fn search(
    State(state): State<AppState>,
    payload: Result<Json<SearchQuery>, JsonRejection>,
) -> Result<Json<SearchResponse>, ApiError> {
    let Json(query) = payload?;
    let result = state.orchestrator.search(&query).await?;
    Ok(Json(SearchResponse {
        success: true,
        result,
    }))
}

/// Health of every enabled provider.
///
/// GET /search/health
#[utoipa::path(get, path = "/search/health", tag = "Search",
    responses(
        (status = 200, description = "All providers healthy", body = SearchHealthResponse),
        (status = 503, description = "At least one provider unhealthy", body = SearchHealthResponse)
    ))]
pub async fn search_health(State(state): State<AppState>) -> (StatusCode, Json<SearchHealthResponse>) {
    let providers = state.orchestrator.health().await;
    let healthy = providers.iter().all(|p| p.healthy);
    let (status, label) = if healthy {
        (StatusCode::OK, "healthy")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };
    (
        status,
        Json(SearchHealthResponse {
            success: healthy,
            status: label.to_string(),
            providers,
        }),
    )
}

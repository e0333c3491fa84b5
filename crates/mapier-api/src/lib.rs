//! # mapier-api
//!
//! HTTP surface for mapier: multi-provider search, place detail,
//! autocomplete, identity resolution, cross-platform bridge, nearby
//! inference and GeoJSON export.
//!
//! The router is built from an explicit [`AppState`]; `main` wires the
//! PostgreSQL-backed services, tests wire in-memory fakes.

pub mod error;
pub mod handlers;
pub mod openapi;
pub mod services;

use std::sync::Arc;

use axum::{
    http::{header, HeaderName, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use governor::{Quota, RateLimiter};
use std::num::NonZeroU32;
use std::time::Duration;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;
use uuid::Uuid;

use mapier_core::defaults;
use mapier_db::FeatureSource;
use mapier_search::SearchOrchestrator;

pub use error::ApiError;
use openapi::ApiDoc;
use services::{BridgeLookup, IdentityResolver};

// =============================================================================
// REQUEST ID (UUIDv7)
// =============================================================================

/// Generates time-ordered UUIDv7 request correlation IDs.
#[derive(Clone, Default)]
pub struct MakeRequestUuidV7;

impl MakeRequestId for MakeRequestUuidV7 {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        let id = Uuid::now_v7().to_string().parse().ok()?;
        Some(RequestId::new(id))
    }
}

// =============================================================================
// STATE
// =============================================================================

/// Global rate limiter type (direct quota, no keyed bucketing).
pub type GlobalRateLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: SearchOrchestrator,
    pub resolver: IdentityResolver,
    pub bridge: BridgeLookup,
    /// GeoJSON export source.
    pub exporter: Arc<dyn FeatureSource>,
    /// Global rate limiter (None if rate limiting is disabled).
    pub rate_limiter: Option<Arc<GlobalRateLimiter>>,
}

/// Rate limiter settings, read from `RATE_LIMIT_*`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub requests: u64,
    pub period_secs: u64,
}

impl RateLimitConfig {
    pub fn from_env() -> Self {
        Self {
            enabled: std::env::var("RATE_LIMIT_ENABLED")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(true),
            requests: std::env::var("RATE_LIMIT_REQUESTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults::RATE_LIMIT_REQUESTS),
            period_secs: std::env::var("RATE_LIMIT_PERIOD_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults::RATE_LIMIT_PERIOD_SECS),
        }
    }

    /// The limiter, or None when disabled or configured with zeros.
    pub fn build(&self) -> Option<Arc<GlobalRateLimiter>> {
        if !self.enabled {
            return None;
        }
        let burst = NonZeroU32::new(u32::try_from(self.requests).unwrap_or(u32::MAX))?;
        let quota = Quota::with_period(Duration::from_secs(self.period_secs) / burst.get())?
            .allow_burst(burst);
        Some(Arc::new(RateLimiter::direct(quota)))
    }
}

// =============================================================================
// CORS
// =============================================================================

/// Parse allowed origins from the comma-separated `ALLOWED_ORIGINS`.
pub fn parse_allowed_origins(raw: Option<&str>) -> Vec<HeaderValue> {
    let raw = raw.map(str::trim).filter(|s| !s.is_empty()).unwrap_or("http://localhost:3000");
    raw.split(',')
        .filter_map(|s| {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return None;
            }
            match trimmed.parse::<HeaderValue>() {
                Ok(v) => Some(v),
                Err(e) => {
                    tracing::warn!(origin = trimmed, error = %e, "Invalid CORS origin");
                    None
                }
            }
        })
        .collect()
}

fn cors_layer(allowed_origins: Vec<HeaderValue>) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed_origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::ACCEPT,
            HeaderName::from_static("x-request-id"),
        ])
        .max_age(Duration::from_secs(defaults::CORS_MAX_AGE_SECS))
}

// =============================================================================
// ROUTER
// =============================================================================

/// Build the full application router.
pub fn build_router(state: AppState, allowed_origins: Vec<HeaderValue>) -> Router {
    Router::new()
        .route("/health", get(handlers::system::health))
        .route("/search", post(handlers::search::search))
        .route("/search/health", get(handlers::search::search_health))
        .route("/places/autocomplete", get(handlers::places::autocomplete))
        .route("/places/export", get(handlers::places::export))
        .route("/places/resolve", post(handlers::places::resolve))
        .route("/places/sync-pli", post(handlers::places::sync_pli))
        .route("/places/find-nearby", post(handlers::places::find_nearby))
        .route("/places/:id", get(handlers::places::get_place))
        .route("/places/:id/bridge", get(handlers::places::bridge))
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // Middleware
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            handlers::system::rate_limit_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV7))
        .layer(cors_layer(allowed_origins))
        .layer(RequestBodyLimitLayer::new(defaults::MAX_BODY_SIZE_BYTES))
        .with_state(state)
}

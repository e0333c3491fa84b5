//! mapier-api - HTTP API server for mapier.

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mapier_api::services::{BridgeLookup, IdentityResolver, PlaceCache, ResolverConfig};
use mapier_api::{build_router, parse_allowed_origins, AppState, RateLimitConfig};
use mapier_core::{defaults, CacheGateway};
use mapier_db::{Database, PoolConfig};
use mapier_providers::ProviderRegistry;
use mapier_search::{OrchestratorConfig, SearchOrchestrator};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing with configurable output
    //
    // Environment variables:
    //   LOG_FORMAT  - "json" or "text" (default: "text")
    //   LOG_FILE    - path to log file (optional, enables file logging)
    //   LOG_ANSI    - "true"/"false" override ANSI colors (auto-detected by default)
    //   RUST_LOG    - standard env filter (default: "mapier_api=debug,tower_http=debug")
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let log_file = std::env::var("LOG_FILE").ok();
    let log_ansi = std::env::var("LOG_ANSI")
        .ok()
        .map(|v| v == "true" || v == "1");

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "mapier_api=debug,mapier_search=debug,tower_http=debug".into());

    let registry = tracing_subscriber::registry().with(env_filter);

    let _file_guard = if let Some(ref path) = log_file {
        let file_dir = std::path::Path::new(path)
            .parent()
            .unwrap_or(std::path::Path::new("."));
        let file_name = std::path::Path::new(path)
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or("mapier-api.log");
        let file_appender = tracing_appender::rolling::daily(file_dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        if log_format == "json" {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(non_blocking),
                )
                .init();
        } else {
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(log_ansi.unwrap_or(false));
            registry.with(layer).init();
        }
        Some(guard)
    } else {
        if log_format == "json" {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        } else {
            let mut layer = tracing_subscriber::fmt::layer();
            if let Some(ansi) = log_ansi {
                layer = layer.with_ansi(ansi);
            }
            registry.with(layer).init();
        }
        None
    };

    info!(
        log_format = %log_format,
        log_file = log_file.as_deref().unwrap_or("(stdout)"),
        "Logging initialized"
    );

    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| defaults::DATABASE_URL.to_string());
    let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(defaults::SERVER_PORT);

    let rate_limit = RateLimitConfig::from_env();
    info!(
        "Rate limiting: {} ({} requests per {} seconds)",
        if rate_limit.enabled { "enabled" } else { "disabled" },
        rate_limit.requests,
        rate_limit.period_secs
    );

    info!("Connecting to database...");
    let db = Database::connect_with_config(&database_url, PoolConfig::from_env()).await?;
    info!("Database connected");

    info!("Running migrations...");
    db.migrate().await?;
    info!("Migrations complete");

    let cache: Arc<dyn CacheGateway> = Arc::new(PlaceCache::from_env().await);

    let providers = ProviderRegistry::from_env(db.clone())?;
    info!(providers = ?providers.names(), "Providers registered");
    let orchestrator =
        SearchOrchestrator::with_config(providers, cache.clone(), OrchestratorConfig::from_env());

    let places = Arc::new(db.places.clone());
    let candidates = Arc::new(db.candidates.clone());
    let resolver = IdentityResolver::with_config(
        places.clone(),
        candidates.clone(),
        cache,
        ResolverConfig::from_env(),
    );
    let bridge = BridgeLookup::new(places, candidates);

    let state = AppState {
        orchestrator,
        resolver,
        bridge,
        exporter: Arc::new(db.export.clone()),
        rate_limiter: rate_limit.build(),
    };

    let allowed_origins = parse_allowed_origins(std::env::var("ALLOWED_ORIGINS").ok().as_deref());
    info!(origins = allowed_origins.len(), "CORS configured");
    let app = build_router(state, allowed_origins);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

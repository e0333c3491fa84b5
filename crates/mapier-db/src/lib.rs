//! # mapier-db
//!
//! PostgreSQL + PostGIS persistence layer for mapier.
//!
//! This crate provides:
//! - Connection pool management
//! - The canonical place repository (custom record creation, write-once
//!   platform identifier linkage, local radius search)
//! - Spatial + fuzzy-name candidate matching via `conflate_place`
//! - Nearest-place lookup via `find_nearby_place`
//! - GeoJSON export by bounding box
//!
//! ## Example
//!
//! ```rust,ignore
//! use mapier_db::{Database, PlaceRepository, Platform};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("postgres://localhost/mapier").await?;
//!     let place = db.places.find_by_platform_id(Platform::Google, "ChIJabc").await?;
//!     println!("{:?}", place.map(|p| p.id));
//!     Ok(())
//! }
//! ```
pub mod conflation;
pub mod export;
pub mod places;
pub mod pool;

// Test fixtures for integration tests
// Note: Always compiled so integration tests (in tests/) can use DEFAULT_TEST_DATABASE_URL
pub mod test_fixtures;

// Re-export core types
pub use mapier_core::*;

pub use conflation::PgMatchCandidateSource;
pub use export::{
    place_to_feature, ExportQuery, Feature, FeatureCollection, FeatureSource, PgPlaceExporter,
};
pub use places::PgPlaceRepository;
pub use pool::{create_pool, PoolConfig};

/// Escape LIKE/ILIKE wildcard characters (`%`, `_`, `\`) in user input.
pub fn escape_like(input: &str) -> String {
    input
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

/// Combined database context with all repositories.
#[derive(Clone)]
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::Pool<sqlx::Postgres>,
    /// Canonical place records.
    pub places: PgPlaceRepository,
    /// Spatial/fuzzy candidate matching.
    pub candidates: PgMatchCandidateSource,
    /// Bounding-box export.
    pub export: PgPlaceExporter,
}

impl Database {
    /// Create a new Database instance from a connection pool.
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self {
            places: PgPlaceRepository::new(pool.clone()),
            candidates: PgMatchCandidateSource::new(pool.clone()),
            export: PgPlaceExporter::new(pool.clone()),
            pool,
        }
    }

    /// Connect with pool settings from the environment.
    pub async fn connect(url: &str) -> Result<Self> {
        Self::connect_with_config(url, PoolConfig::from_env()).await
    }

    /// Connect with explicit pool settings.
    pub async fn connect_with_config(url: &str, config: PoolConfig) -> Result<Self> {
        let pool = create_pool(url, &config).await?;
        Ok(Self::new(pool))
    }

    /// Run pending migrations.
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &sqlx::Pool<sqlx::Postgres> {
        &self.pool
    }

    /// True if a trivial query round-trips.
    pub async fn ping(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}

//! Local geodatabase provider.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::{debug, instrument};

use mapier_core::{defaults, Place, PlaceProvider, PlaceRepository, Result, SearchQuery};
use mapier_db::Database;

/// Serves canonical records from the PostGIS store.
///
/// Unbounded by the orchestrator: it is the primary source.
pub struct LocalProvider {
    db: Database,
    min_confidence: f64,
}

impl LocalProvider {
    pub fn new(db: Database) -> Self {
        Self {
            db,
            min_confidence: defaults::LOCAL_MIN_CONFIDENCE,
        }
    }

    /// Quality floor for bulk-ingested records.
    pub fn with_min_confidence(mut self, min_confidence: f64) -> Self {
        self.min_confidence = min_confidence.clamp(0.0, 1.0);
        self
    }

    /// Build with `LOCAL_MIN_CONFIDENCE` from the environment.
    pub fn from_env(db: Database) -> Self {
        let min_confidence = std::env::var("LOCAL_MIN_CONFIDENCE")
            .ok()
            .and_then(|v| v.parse::<f64>().ok())
            .unwrap_or(defaults::LOCAL_MIN_CONFIDENCE);
        Self::new(db).with_min_confidence(min_confidence)
    }

    pub fn min_confidence(&self) -> f64 {
        self.min_confidence
    }
}

#[async_trait]
impl PlaceProvider for LocalProvider {
    fn name(&self) -> &str {
        defaults::PROVIDER_LOCAL
    }

    fn priority(&self) -> u8 {
        defaults::PRIORITY_LOCAL
    }

    fn timeout(&self) -> Option<Duration> {
        None
    }

    #[instrument(skip(self, query), fields(subsystem = "providers", component = "local", op = "search"))]
    async fn search(&self, query: &SearchQuery) -> Result<Vec<Place>> {
        let start = Instant::now();
        let places = self.db.places.search_nearby(query, self.min_confidence).await?;
        debug!(
            result_count = places.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Local search complete"
        );
        Ok(places)
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Place>> {
        self.db.places.fetch(id).await
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(self.db.ping().await)
    }
}

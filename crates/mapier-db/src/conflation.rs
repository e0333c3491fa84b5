//! Candidate matching over the `conflate_place` / `find_nearby_place`
//! SQL functions.

use std::time::Instant;

use async_trait::async_trait;
use sqlx::{Pool, Postgres, Row};
use tracing::{debug, warn};

use mapier_core::{
    Address, CandidateMatch, CandidateQuery, Error, GeoPoint, MatchCandidateSource, NearbyPlace,
    Result,
};

/// PostgreSQL implementation of MatchCandidateSource.
#[derive(Clone)]
pub struct PgMatchCandidateSource {
    pool: Pool<Postgres>,
}

impl PgMatchCandidateSource {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MatchCandidateSource for PgMatchCandidateSource {
    async fn find_candidates(&self, query: &CandidateQuery) -> Result<Vec<CandidateMatch>> {
        let start = Instant::now();
        let rows = sqlx::query(
            r#"
            SELECT matched_source, matched_id, matched_name, match_confidence,
                   distance_meters, name_similarity, google_place_id, apple_place_id
            FROM conflate_place($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(&query.name)
        .bind(query.location.lat)
        .bind(query.location.lon)
        .bind(query.google_place_id.as_deref())
        .bind(query.apple_place_id.as_deref())
        .bind(query.radius_m)
        .bind(query.name_threshold)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            warn!(
                subsystem = "db",
                component = "conflation",
                op = "conflate_place",
                error = %e,
                "Candidate query failed"
            );
            Error::ConflationFailure(e.to_string())
        })?;

        let candidates = rows
            .iter()
            .map(|row| -> Result<CandidateMatch> {
                let source: String = row.try_get("matched_source")?;
                Ok(CandidateMatch {
                    matched_id: row.try_get("matched_id")?,
                    matched_source: source
                        .parse()
                        .map_err(|e: String| Error::ConflationFailure(e))?,
                    matched_name: row.try_get("matched_name")?,
                    match_confidence: row.try_get("match_confidence")?,
                    distance_m: row.try_get("distance_meters")?,
                    name_similarity: row.try_get("name_similarity")?,
                    google_place_id: row.try_get("google_place_id")?,
                    apple_place_id: row.try_get("apple_place_id")?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        debug!(
            subsystem = "db",
            component = "conflation",
            op = "conflate_place",
            candidate_count = candidates.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Candidate query complete"
        );
        Ok(candidates)
    }

    async fn find_nearby(&self, point: GeoPoint, radius_m: f64) -> Result<Option<NearbyPlace>> {
        let row = sqlx::query(
            r#"
            SELECT id, name, lat, lon, distance_meters, primary_category,
                   street, city, state, postcode, country, formatted_address,
                   google_place_id, apple_place_id
            FROM find_nearby_place($1, $2, $3)
            "#,
        )
        .bind(point.lat)
        .bind(point.lon)
        .bind(radius_m)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let address = Address {
            street: row.try_get("street")?,
            city: row.try_get("city")?,
            state: row.try_get("state")?,
            postcode: row.try_get("postcode")?,
            country: row.try_get("country")?,
            formatted: row.try_get("formatted_address")?,
        };

        Ok(Some(NearbyPlace {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            location: GeoPoint::new(row.try_get("lat")?, row.try_get("lon")?),
            distance_m: row.try_get("distance_meters")?,
            category: row.try_get("primary_category")?,
            address: (!address.is_empty()).then(|| address.with_display()),
            google_place_id: row.try_get("google_place_id")?,
            apple_place_id: row.try_get("apple_place_id")?,
        }))
    }
}

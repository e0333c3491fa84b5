//! Canonical place repository.

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row};
use tracing::{debug, info};

use mapier_core::{
    defaults, Address, Error, GeoPoint, NewCustomPlace, Place, PlaceAttributes, PlaceCategory,
    PlaceRepository, Platform, Result, SearchQuery,
};

use crate::escape_like;

/// Columns selected for every canonical place read.
pub(crate) const PLACE_COLUMNS: &str = r#"
    id, name, confidence, primary_category, alternate_categories, brand,
    operating_status, websites, socials, phones, emails,
    street, city, state, postcode, country, formatted_address,
    lat, lon, source_type, primary_source, google_place_id, apple_place_id, attributes
"#;

/// Trigram similarity above which a name counts as a text match in local
/// search (pg_trgm's default `%` threshold).
const TEXT_MATCH_SIMILARITY: f64 = 0.3;

/// Build a [`Place`] from a row selected with [`PLACE_COLUMNS`].
///
/// `distance_m` is read when the query selected it.
pub(crate) fn place_from_row(row: &PgRow) -> Result<Place> {
    let source_type: String = row.try_get("source_type")?;
    let attributes: serde_json::Value = row.try_get("attributes")?;

    let address = Address {
        street: row.try_get("street")?,
        city: row.try_get("city")?,
        state: row.try_get("state")?,
        postcode: row.try_get("postcode")?,
        country: row.try_get("country")?,
        formatted: row.try_get("formatted_address")?,
    };

    Ok(Place {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        location: GeoPoint::new(row.try_get("lat")?, row.try_get("lon")?),
        category: PlaceCategory {
            primary: row.try_get("primary_category")?,
            secondary: row.try_get("alternate_categories")?,
        },
        confidence: row.try_get("confidence")?,
        socials: row.try_get("socials")?,
        websites: row.try_get("websites")?,
        phones: row.try_get("phones")?,
        emails: row.try_get("emails")?,
        brand: row.try_get("brand")?,
        operating_status: row.try_get("operating_status")?,
        address: (!address.is_empty()).then(|| address.with_display()),
        primary_source: row.try_get("primary_source")?,
        // Rows written by older imports may carry free-form JSON here.
        attributes: serde_json::from_value::<PlaceAttributes>(attributes.clone()).unwrap_or_else(
            |_| PlaceAttributes {
                known: Vec::new(),
                extra: attributes.as_object().cloned().unwrap_or_default(),
            },
        ),
        distance_m: row.try_get::<Option<f64>, _>("distance_m").ok().flatten(),
        source_type: source_type.parse().unwrap_or_default(),
        provider: defaults::PROVIDER_LOCAL.to_string(),
        sources: vec![defaults::PROVIDER_LOCAL.to_string()],
        google_place_id: row.try_get("google_place_id")?,
        apple_place_id: row.try_get("apple_place_id")?,
    })
}

/// Reinterpret a unique-constraint violation as [`Error::Conflict`].
pub(crate) fn conflict_on_unique(e: sqlx::Error, context: &str) -> Error {
    let err = Error::Database(e);
    if err.is_unique_violation() {
        let constraint = match &err {
            Error::Database(sqlx::Error::Database(db)) => db.constraint().map(str::to_string),
            _ => None,
        };
        Error::Conflict(match constraint {
            Some(c) => format!("{}: {} already exists", context, c),
            None => format!("{}: duplicate value", context),
        })
    } else {
        err
    }
}

/// PostgreSQL implementation of PlaceRepository.
#[derive(Clone)]
pub struct PgPlaceRepository {
    pool: Pool<Postgres>,
}

impl PgPlaceRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Canonical places within the query radius, most confident first,
    /// then nearest.
    ///
    /// Bulk-ingested records below `min_confidence` are skipped; custom
    /// records are always eligible. Returns up to `offset + limit` rows in
    /// the order results are ranked, so a truncated fetch keeps the rows
    /// that would rank highest.
    pub async fn search_nearby(&self, query: &SearchQuery, min_confidence: f64) -> Result<Vec<Place>> {
        let text = query.text().map(|t| t.to_lowercase());
        let pattern = text.as_deref().map(|t| format!("%{}%", escape_like(t)));
        let fetch = i64::from(query.limit) + i64::from(query.offset);

        let sql = format!(
            r#"
            SELECT {PLACE_COLUMNS},
                   ST_Distance(places.geog, o.geog) AS distance_m
            FROM places,
                 (SELECT ST_SetSRID(ST_MakePoint($2, $1), 4326)::geography AS geog) o
            WHERE ST_DWithin(places.geog, o.geog, $3)
              AND (source_type = 'custom' OR confidence >= $4)
              AND (
                  $5::text IS NULL
                  OR lower(name) LIKE $6 ESCAPE '\'
                  OR lower(coalesce(primary_category, '')) LIKE $6 ESCAPE '\'
                  OR lower(coalesce(brand, '')) LIKE $6 ESCAPE '\'
                  OR similarity(lower(name), $5) > $7
              )
              AND (
                  $8::text IS NULL
                  OR lower(primary_category) = lower($8)
                  OR lower($8) = ANY(SELECT lower(c) FROM unnest(alternate_categories) c)
              )
            ORDER BY confidence DESC, distance_m ASC, id ASC
            LIMIT $9
            "#
        );

        let rows = sqlx::query(&sql)
            .bind(query.location.lat)
            .bind(query.location.lon)
            .bind(query.location.radius_m)
            .bind(min_confidence)
            .bind(text.as_deref())
            .bind(pattern.as_deref())
            .bind(TEXT_MATCH_SIMILARITY)
            .bind(query.category_filter())
            .bind(fetch)
            .fetch_all(&self.pool)
            .await?;

        let places = rows.iter().map(place_from_row).collect::<Result<Vec<_>>>()?;
        debug!(
            subsystem = "db",
            component = "places",
            op = "search_nearby",
            result_count = places.len(),
            "Local place search complete"
        );
        Ok(places)
    }
}

#[async_trait]
impl PlaceRepository for PgPlaceRepository {
    async fn fetch(&self, id: &str) -> Result<Option<Place>> {
        let sql = format!("SELECT {PLACE_COLUMNS} FROM places WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(place_from_row).transpose()
    }

    async fn find_by_platform_id(&self, platform: Platform, identifier: &str) -> Result<Option<Place>> {
        let sql = format!(
            "SELECT {PLACE_COLUMNS} FROM places WHERE {} = $1",
            platform.column()
        );
        let row = sqlx::query(&sql)
            .bind(identifier)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(place_from_row).transpose()
    }

    async fn insert_custom(&self, place: NewCustomPlace) -> Result<Place> {
        let sql = format!(
            r#"
            INSERT INTO places (
                id, name, confidence, primary_category, lat, lon,
                formatted_address, phones, websites,
                google_place_id, apple_place_id,
                source_type, primary_source, source_platform
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, 'custom', 'mapier', $12)
            RETURNING {PLACE_COLUMNS}
            "#
        );

        let row = sqlx::query(&sql)
            .bind(&place.id)
            .bind(&place.name)
            .bind(defaults::CREATED_CONFIDENCE)
            .bind(place.category.as_deref())
            .bind(place.location.lat)
            .bind(place.location.lon)
            .bind(place.address.as_deref())
            .bind(place.phone.iter().cloned().collect::<Vec<String>>())
            .bind(place.website.iter().cloned().collect::<Vec<String>>())
            .bind(place.google_place_id.as_deref())
            .bind(place.apple_place_id.as_deref())
            .bind(place.source_platform.to_string())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| conflict_on_unique(e, "insert custom place"))?;

        let created = place_from_row(&row)?;
        info!(
            subsystem = "db",
            component = "places",
            op = "insert_custom",
            place_id = %created.id,
            "Created custom place"
        );
        Ok(created)
    }

    async fn link_platform_id(&self, place_id: &str, platform: Platform, identifier: &str) -> Result<bool> {
        let column = platform.column();
        let sql = format!(
            "UPDATE places SET {column} = $2, updated_at = now() \
             WHERE id = $1 AND {column} IS NULL"
        );
        let result = sqlx::query(&sql)
            .bind(place_id)
            .bind(identifier)
            .execute(&self.pool)
            .await
            .map_err(|e| conflict_on_unique(e, "link platform id"))?;

        let linked = result.rows_affected() == 1;
        debug!(
            subsystem = "db",
            component = "places",
            op = "link_platform_id",
            place_id,
            platform = %platform,
            linked,
            "Conditional identifier update"
        );
        Ok(linked)
    }
}

//! GeoJSON export of canonical places by bounding box.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value as JsonValue};
use sqlx::{Pool, Postgres, Row};
use tracing::info;

use mapier_core::{defaults, BoundingBox, Error, Place, Result};

use crate::places::{place_from_row, PLACE_COLUMNS};

/// Parameters for an export or count.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportQuery {
    pub bbox: BoundingBox,
    pub limit: i64,
    /// Bulk-ingested records below this confidence are left out.
    pub min_confidence: f64,
}

impl ExportQuery {
    /// Query for `bbox` with default limit and confidence floor.
    pub fn new(bbox: BoundingBox) -> Self {
        Self {
            bbox,
            limit: defaults::EXPORT_LIMIT,
            min_confidence: defaults::LOCAL_MIN_CONFIDENCE,
        }
    }

    /// Set the feature limit, rejecting values outside [1, EXPORT_LIMIT_MAX].
    pub fn with_limit(mut self, limit: i64) -> Result<Self> {
        if !(1..=defaults::EXPORT_LIMIT_MAX).contains(&limit) {
            return Err(Error::validation(
                "limit",
                format!("must be within [1, {}]", defaults::EXPORT_LIMIT_MAX),
            ));
        }
        self.limit = limit;
        Ok(self)
    }
}

/// GeoJSON Point geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointGeometry {
    #[serde(rename = "type")]
    pub kind: String,
    /// `[lon, lat]`
    pub coordinates: [f64; 2],
}

/// GeoJSON Feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    #[serde(rename = "type")]
    pub kind: String,
    pub geometry: PointGeometry,
    pub properties: Map<String, JsonValue>,
}

/// GeoJSON FeatureCollection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureCollection {
    #[serde(rename = "type")]
    pub kind: String,
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    pub fn from_places(places: &[Place]) -> Self {
        Self {
            kind: "FeatureCollection".to_string(),
            features: places.iter().map(place_to_feature).collect(),
        }
    }
}

/// Point feature for `place`; every field other than the coordinate
/// becomes a flat property.
pub fn place_to_feature(place: &Place) -> Feature {
    let address = place.address.clone().unwrap_or_default();
    let properties = json!({
        "id": place.id,
        "name": place.name,
        "confidence": place.confidence,
        "primary_category": place.category.primary,
        "alternate_categories": place.category.secondary,
        "brand": place.brand,
        "operating_status": place.operating_status,
        "websites": place.websites,
        "socials": place.socials,
        "phones": place.phones,
        "emails": place.emails,
        "street": address.street,
        "city": address.city,
        "state": address.state,
        "postcode": address.postcode,
        "country": address.country,
        "source_type": place.source_type,
        "primary_source": place.primary_source,
        "google_place_id": place.google_place_id,
        "apple_place_id": place.apple_place_id,
    });

    Feature {
        kind: "Feature".to_string(),
        geometry: PointGeometry {
            kind: "Point".to_string(),
            coordinates: [place.location.lon, place.location.lat],
        },
        properties: match properties {
            JsonValue::Object(map) => map,
            _ => Map::new(),
        },
    }
}

/// Source of GeoJSON exports, implemented over PostgreSQL and by test
/// fakes.
#[async_trait]
pub trait FeatureSource: Send + Sync {
    async fn feature_collection(&self, query: &ExportQuery) -> Result<FeatureCollection>;
}

/// Bounding-box reads over canonical places.
#[derive(Clone)]
pub struct PgPlaceExporter {
    pool: Pool<Postgres>,
}

impl PgPlaceExporter {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Places inside the box, highest confidence first.
    pub async fn places_in_bbox(&self, query: &ExportQuery) -> Result<Vec<Place>> {
        let sql = format!(
            r#"
            SELECT {PLACE_COLUMNS}
            FROM places
            WHERE lon BETWEEN $1 AND $2
              AND lat BETWEEN $3 AND $4
              AND (source_type = 'custom' OR confidence >= $5)
            ORDER BY confidence DESC, id ASC
            LIMIT $6
            "#
        );
        let rows = sqlx::query(&sql)
            .bind(query.bbox.min_lon)
            .bind(query.bbox.max_lon)
            .bind(query.bbox.min_lat)
            .bind(query.bbox.max_lat)
            .bind(query.min_confidence)
            .bind(query.limit)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(place_from_row).collect()
    }

    /// Places in the box as a GeoJSON FeatureCollection.
    pub async fn export(&self, query: &ExportQuery) -> Result<FeatureCollection> {
        let places = self.places_in_bbox(query).await?;
        info!(
            subsystem = "db",
            component = "export",
            op = "export",
            result_count = places.len(),
            limit = query.limit,
            "GeoJSON export built"
        );
        Ok(FeatureCollection::from_places(&places))
    }

    /// Number of eligible places in the box (ignores the limit).
    pub async fn count(&self, query: &ExportQuery) -> Result<i64> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS n
            FROM places
            WHERE lon BETWEEN $1 AND $2
              AND lat BETWEEN $3 AND $4
              AND (source_type = 'custom' OR confidence >= $5)
            "#,
        )
        .bind(query.bbox.min_lon)
        .bind(query.bbox.max_lon)
        .bind(query.bbox.min_lat)
        .bind(query.bbox.max_lat)
        .bind(query.min_confidence)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.try_get("n")?)
    }
}

#[async_trait]
impl FeatureSource for PgPlaceExporter {
    async fn feature_collection(&self, query: &ExportQuery) -> Result<FeatureCollection> {
        self.export(query).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mapier_core::{Address, GeoPoint, PlaceCategory};

    fn sample_place() -> Place {
        let mut p = Place::new(
            "08f2a",
            "Medici on 57th",
            GeoPoint::new(41.7916, -87.5935),
            0.95,
            "local",
        );
        p.category = PlaceCategory {
            primary: Some("restaurant".into()),
            secondary: vec!["cafe".into()],
        };
        p.address = Some(Address {
            street: Some("1327 E 57th St".into()),
            city: Some("Chicago".into()),
            state: Some("IL".into()),
            postcode: Some("60637".into()),
            country: Some("US".into()),
            formatted: None,
        });
        p
    }

    #[test]
    fn test_feature_geometry_is_lon_lat() {
        let f = place_to_feature(&sample_place());
        assert_eq!(f.geometry.kind, "Point");
        assert_eq!(f.geometry.coordinates, [-87.5935, 41.7916]);
    }

    #[test]
    fn test_feature_properties_are_flat() {
        let f = place_to_feature(&sample_place());
        assert_eq!(f.properties["name"], "Medici on 57th");
        assert_eq!(f.properties["primary_category"], "restaurant");
        assert_eq!(f.properties["alternate_categories"][0], "cafe");
        assert_eq!(f.properties["city"], "Chicago");
        assert_eq!(f.properties["source_type"], "provider");
        assert!(f.properties.get("lat").is_none());
    }

    #[test]
    fn test_feature_collection_serializes_geojson_types() {
        let fc = FeatureCollection::from_places(&[sample_place()]);
        let json = serde_json::to_value(&fc).unwrap();
        assert_eq!(json["type"], "FeatureCollection");
        assert_eq!(json["features"][0]["type"], "Feature");
        assert_eq!(json["features"][0]["geometry"]["type"], "Point");
    }

    #[test]
    fn test_export_limit_bounds() {
        let bbox = BoundingBox::parse("-87.61,-87.58,41.78,41.80").unwrap();
        assert_eq!(ExportQuery::new(bbox).limit, 1000);
        assert!(ExportQuery::new(bbox).with_limit(0).is_err());
        assert!(ExportQuery::new(bbox).with_limit(10_001).is_err());
        assert_eq!(ExportQuery::new(bbox).with_limit(100).unwrap().limit, 100);
    }
}

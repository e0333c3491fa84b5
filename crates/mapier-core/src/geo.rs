//! Geodesic helpers.

use serde::{Deserialize, Serialize};

use crate::error::FieldError;

/// Mean Earth radius in meters (IUGG).
pub const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// A WGS84 coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Great-circle distance to `other` in meters.
    pub fn distance_to(&self, other: &GeoPoint) -> f64 {
        haversine_m(self.lat, self.lon, other.lat, other.lon)
    }
}

/// Haversine great-circle distance in meters.
pub fn haversine_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();

    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_M * c
}

/// Validate latitude/longitude ranges, appending failures to `errors`.
pub fn check_coordinates(prefix: &str, lat: f64, lon: f64, errors: &mut Vec<FieldError>) {
    let field = |name: &str| {
        if prefix.is_empty() {
            name.to_string()
        } else {
            format!("{}.{}", prefix, name)
        }
    };
    if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
        errors.push(FieldError::new(field("lat"), "must be within [-90, 90]"));
    }
    if !lon.is_finite() || !(-180.0..=180.0).contains(&lon) {
        errors.push(FieldError::new(field("lon"), "must be within [-180, 180]"));
    }
}

/// A lon/lat bounding box, ordered the way the export tooling accepts it:
/// `min_lon,max_lon,min_lat,max_lat`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lon: f64,
    pub max_lon: f64,
    pub min_lat: f64,
    pub max_lat: f64,
}

impl BoundingBox {
    /// Parse `"min_lon,max_lon,min_lat,max_lat"`.
    pub fn parse(raw: &str) -> std::result::Result<Self, FieldError> {
        let parts: Vec<f64> = raw
            .split(',')
            .map(|p| p.trim().parse::<f64>())
            .collect::<std::result::Result<_, _>>()
            .map_err(|_| FieldError::new("bbox", "must be four comma-separated numbers"))?;

        let [min_lon, max_lon, min_lat, max_lat] = parts[..] else {
            return Err(FieldError::new(
                "bbox",
                "must be min_lon,max_lon,min_lat,max_lat",
            ));
        };

        let bbox = Self {
            min_lon,
            max_lon,
            min_lat,
            max_lat,
        };

        let mut errors = Vec::new();
        check_coordinates("bbox", min_lat, min_lon, &mut errors);
        check_coordinates("bbox", max_lat, max_lon, &mut errors);
        if let Some(first) = errors.into_iter().next() {
            return Err(first);
        }
        if min_lon >= max_lon || min_lat >= max_lat {
            return Err(FieldError::new("bbox", "min values must be below max values"));
        }
        Ok(bbox)
    }

    pub fn contains(&self, point: &GeoPoint) -> bool {
        (self.min_lon..=self.max_lon).contains(&point.lon)
            && (self.min_lat..=self.max_lat).contains(&point.lat)
    }
}

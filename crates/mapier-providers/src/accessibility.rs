//! Accessibility dataset provider.
//!
//! Talks to an accessibility.cloud-compatible API that serves GeoJSON
//! `place-infos`. Its value to the merge is the wheelchair attribute, so
//! its places carry a lower base confidence and priority than the other
//! sources.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use tracing::{debug, info, instrument, warn};

use mapier_core::{
    defaults, normalize_name, similarity::normalized_similarity, Address, GeoPoint, Place,
    PlaceAttribute, PlaceCategory, PlaceProvider, Result, SearchQuery, WheelchairAccess,
};

use crate::http::{build_client, decode, ensure_found, ensure_success, send_error, HEALTH_TIMEOUT};

/// Prefix of ids minted by this provider.
pub const ID_PREFIX: &str = "accessibility:";

/// Minimum name similarity for a text query to keep a place.
const TEXT_MATCH_SIMILARITY: f64 = 0.3;

/// Upper bound on places requested per search.
const MAX_RESULT_COUNT: u32 = 100;

/// Configuration for [`AccessibilityProvider`].
#[derive(Debug, Clone)]
pub struct AccessibilityConfig {
    pub base_url: String,
    pub app_token: String,
    pub timeout_ms: u64,
}

impl AccessibilityConfig {
    pub fn new(base_url: impl Into<String>, app_token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            app_token: app_token.into(),
            timeout_ms: defaults::ACCESSIBILITY_TIMEOUT_MS,
        }
    }

    /// Read `ACCESSIBILITY_API_URL` and `ACCESSIBILITY_API_TOKEN` (both
    /// required) and `ACCESSIBILITY_TIMEOUT_MS`.
    pub fn from_env() -> Option<Self> {
        let non_empty = |key: &str| std::env::var(key).ok().filter(|v| !v.trim().is_empty());
        let base_url = non_empty("ACCESSIBILITY_API_URL")?;
        let app_token = non_empty("ACCESSIBILITY_API_TOKEN")?;
        let timeout_ms = std::env::var("ACCESSIBILITY_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(defaults::ACCESSIBILITY_TIMEOUT_MS);

        Some(Self {
            base_url,
            app_token,
            timeout_ms,
        })
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }
}

/// Accessibility dataset provider.
pub struct AccessibilityProvider {
    client: Client,
    config: AccessibilityConfig,
}

impl AccessibilityProvider {
    pub fn new(config: AccessibilityConfig) -> Result<Self> {
        let client = build_client(
            defaults::PROVIDER_ACCESSIBILITY,
            Duration::from_millis(config.timeout_ms),
        )?;
        info!(
            subsystem = "providers",
            component = "accessibility",
            base_url = %config.base_url,
            timeout_ms = config.timeout_ms,
            "Initializing accessibility provider"
        );
        Ok(Self { client, config })
    }

    /// Build from environment; `Ok(None)` when URL or token is missing.
    pub fn from_env() -> Result<Option<Self>> {
        AccessibilityConfig::from_env().map(Self::new).transpose()
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }
}

#[async_trait]
impl PlaceProvider for AccessibilityProvider {
    fn name(&self) -> &str {
        defaults::PROVIDER_ACCESSIBILITY
    }

    fn priority(&self) -> u8 {
        defaults::PRIORITY_ACCESSIBILITY
    }

    fn timeout(&self) -> Option<Duration> {
        Some(Duration::from_millis(self.config.timeout_ms))
    }

    #[instrument(skip(self, query), fields(subsystem = "providers", component = "accessibility", op = "search"))]
    async fn search(&self, query: &SearchQuery) -> Result<Vec<Place>> {
        let start = Instant::now();
        let origin = query.location.point();
        // Text and category are filtered here, so over-fetch when either is set.
        let wanted = query.limit.saturating_add(query.offset);
        let limit = if query.text().is_some() || query.category_filter().is_some() {
            MAX_RESULT_COUNT
        } else {
            wanted.clamp(1, MAX_RESULT_COUNT)
        };

        let response = self
            .client
            .get(self.url("place-infos.json"))
            .query(&[
                ("appToken", self.config.app_token.clone()),
                ("latitude", origin.lat.to_string()),
                ("longitude", origin.lon.to_string()),
                ("accuracy", query.location.radius_m.round().to_string()),
                ("limit", limit.to_string()),
            ])
            .send()
            .await
            .map_err(|e| send_error(defaults::PROVIDER_ACCESSIBILITY, e))?;
        let response = ensure_success(defaults::PROVIDER_ACCESSIBILITY, response).await?;
        let collection: FeatureCollection =
            decode(defaults::PROVIDER_ACCESSIBILITY, response).await?;

        let needle = query.text().map(normalize_name);
        let places: Vec<Place> = collection
            .features
            .into_iter()
            .filter_map(normalize_feature)
            .filter(|p| matches_text(p, needle.as_deref()))
            .filter(|p| query.category_filter().map_or(true, |c| p.category.matches(c)))
            .map(|mut p| {
                p.measure_from(&origin);
                p
            })
            .collect();

        debug!(
            result_count = places.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Accessibility search complete"
        );
        Ok(places)
    }

    #[instrument(skip(self), fields(subsystem = "providers", component = "accessibility", op = "get_by_id"))]
    async fn get_by_id(&self, id: &str) -> Result<Option<Place>> {
        let Some(source_id) = id.strip_prefix(ID_PREFIX) else {
            return Ok(None);
        };

        let response = self
            .client
            .get(self.url(&format!("place-infos/{}.json", source_id)))
            .query(&[("appToken", self.config.app_token.as_str())])
            .send()
            .await
            .map_err(|e| send_error(defaults::PROVIDER_ACCESSIBILITY, e))?;

        let Some(response) = ensure_found(defaults::PROVIDER_ACCESSIBILITY, response).await? else {
            return Ok(None);
        };
        let feature: Feature = decode(defaults::PROVIDER_ACCESSIBILITY, response).await?;
        Ok(normalize_feature(feature))
    }

    async fn health_check(&self) -> Result<bool> {
        let response = self
            .client
            .get(self.url("place-infos.json"))
            .query(&[
                ("appToken", self.config.app_token.as_str()),
                ("latitude", "0"),
                ("longitude", "0"),
                ("accuracy", "1"),
                ("limit", "1"),
            ])
            .timeout(HEALTH_TIMEOUT)
            .send()
            .await;

        match response {
            Ok(resp) if resp.status().is_success() => Ok(true),
            Ok(resp) => {
                warn!(
                    subsystem = "providers",
                    component = "accessibility",
                    status = %resp.status(),
                    "Accessibility health check failed"
                );
                Ok(false)
            }
            Err(e) => {
                warn!(
                    subsystem = "providers",
                    component = "accessibility",
                    error = %e,
                    "Accessibility health check error"
                );
                Ok(false)
            }
        }
    }
}

fn matches_text(place: &Place, needle: Option<&str>) -> bool {
    let Some(needle) = needle.filter(|n| !n.is_empty()) else {
        return true;
    };
    let name = normalize_name(&place.name);
    name.contains(needle) || normalized_similarity(&name, needle) >= TEXT_MATCH_SIMILARITY
}

// =============================================================================
// NORMALIZATION
// =============================================================================

fn normalize_feature(feature: Feature) -> Option<Place> {
    let props = feature.properties;
    let source_id = feature
        .id
        .or(props.id)
        .filter(|id| !id.is_empty())?;
    let name = props.name.and_then(LocalizedString::into_text)?;
    let [lon, lat] = feature.geometry?.coordinates;

    let mut place = Place::new(
        format!("{}{}", ID_PREFIX, source_id),
        name,
        GeoPoint::new(lat, lon),
        defaults::ACCESSIBILITY_BASE_CONFIDENCE,
        defaults::PROVIDER_ACCESSIBILITY,
    );
    if let Some(category) = props.category.filter(|c| !c.trim().is_empty()) {
        place.category = PlaceCategory::primary(category);
    }
    place.address = props.address.as_ref().and_then(address_text).map(Address::formatted_only);
    place.phones.extend(props.phone_number);
    place.websites.extend(props.place_website_url);

    if let Some(wheelchair) = props.accessibility.as_ref().map(wheelchair_access) {
        place
            .attributes
            .set(PlaceAttribute::Accessibility {
                wheelchair,
                toilet: None,
                entrance_step_free: None,
            });
    }
    if let Some(url) = props.info_page_url {
        place.attributes.insert_extra("accessibility_info_url", json!(url));
    }

    Some(place)
}

fn wheelchair_access(a: &AccessibilityInfo) -> WheelchairAccess {
    let full = a.accessible_with.as_ref().and_then(|w| w.wheelchair);
    let partial = a.partially_accessible_with.as_ref().and_then(|w| w.wheelchair);
    match (full, partial) {
        (Some(true), _) => WheelchairAccess::Yes,
        (_, Some(true)) => WheelchairAccess::Limited,
        (Some(false), _) => WheelchairAccess::No,
        _ => WheelchairAccess::Unknown,
    }
}

/// Address as served: a plain string or an object with a `text` field.
fn address_text(value: &JsonValue) -> Option<String> {
    let text = match value {
        JsonValue::String(s) => s.as_str(),
        JsonValue::Object(map) => map.get("text").and_then(JsonValue::as_str)?,
        _ => return None,
    };
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

// =============================================================================
// WIRE TYPES
// =============================================================================

#[derive(Deserialize)]
struct FeatureCollection {
    #[serde(default)]
    features: Vec<Feature>,
}

#[derive(Deserialize)]
struct Feature {
    #[serde(rename = "_id")]
    id: Option<String>,
    geometry: Option<PointGeometry>,
    #[serde(default)]
    properties: Properties,
}

#[derive(Deserialize)]
struct PointGeometry {
    /// `[lon, lat]`
    coordinates: [f64; 2],
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct Properties {
    #[serde(rename = "_id")]
    id: Option<String>,
    name: Option<LocalizedString>,
    category: Option<String>,
    address: Option<JsonValue>,
    phone_number: Option<String>,
    place_website_url: Option<String>,
    info_page_url: Option<String>,
    accessibility: Option<AccessibilityInfo>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LocalizedString {
    Plain(String),
    Localized(BTreeMap<String, String>),
}

impl LocalizedString {
    /// English when available, otherwise the first translation.
    fn into_text(self) -> Option<String> {
        let text = match self {
            Self::Plain(s) => s,
            Self::Localized(mut map) => match map.remove("en") {
                Some(s) => s,
                None => map.into_values().next()?,
            },
        };
        (!text.trim().is_empty()).then_some(text)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccessibilityInfo {
    accessible_with: Option<AccessibleWith>,
    partially_accessible_with: Option<AccessibleWith>,
}

#[derive(Deserialize)]
struct AccessibleWith {
    wheelchair: Option<bool>,
}

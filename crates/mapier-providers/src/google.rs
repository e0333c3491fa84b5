//! Google Places (New) provider.
//!
//! Free-text searches go to `places:searchText` with a circular location
//! bias; queries without text or category go to `places:searchNearby`
//! restricted to the search circle. Every response is normalized into
//! [`Place`] here, and nothing downstream sees the wire shapes.
//!
//! Place ids are namespaced as `google:<place id>` so detail lookups can
//! be routed back to this provider.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, instrument, warn};

use mapier_core::{
    defaults, Address, AutocompleteQuery, AutocompleteSuggestion, GeoPoint, Place, PlaceAttribute,
    PlaceCategory, PlaceProvider, Result, SearchQuery, WheelchairAccess,
};

use crate::http::{build_client, decode, ensure_found, ensure_success, send_error, HEALTH_TIMEOUT};

/// Default Google Places API endpoint.
pub const DEFAULT_GOOGLE_PLACES_URL: &str = "https://places.googleapis.com";

/// Prefix of ids minted by this provider.
pub const ID_PREFIX: &str = "google:";

/// The API caps a single page at 20 places.
const MAX_RESULT_COUNT: u32 = 20;

/// Radius of the bias circle applied to autocomplete when a coordinate is given.
const AUTOCOMPLETE_BIAS_RADIUS_M: f64 = 5000.0;

const SEARCH_FIELD_MASK: &str = "places.id,places.displayName,places.formattedAddress,\
places.location,places.types,places.primaryType,places.rating,places.userRatingCount,\
places.priceLevel,places.websiteUri,places.nationalPhoneNumber,places.internationalPhoneNumber,\
places.businessStatus,places.regularOpeningHours,places.accessibilityOptions,places.googleMapsUri";

const DETAILS_FIELD_MASK: &str = "id,displayName,formattedAddress,location,types,primaryType,\
rating,userRatingCount,priceLevel,websiteUri,nationalPhoneNumber,internationalPhoneNumber,\
businessStatus,regularOpeningHours,accessibilityOptions,googleMapsUri";

const AUTOCOMPLETE_FIELD_MASK: &str = "suggestions.placePrediction.placeId,\
suggestions.placePrediction.text,suggestions.placePrediction.structuredFormat";

/// Configuration for [`GooglePlacesProvider`].
#[derive(Debug, Clone)]
pub struct GoogleConfig {
    pub base_url: String,
    pub api_key: String,
    pub timeout_ms: u64,
}

impl GoogleConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_GOOGLE_PLACES_URL.to_string(),
            api_key: api_key.into(),
            timeout_ms: defaults::GOOGLE_TIMEOUT_MS,
        }
    }

    /// Read `GOOGLE_PLACES_API_KEY` (required), `GOOGLE_PLACES_URL` and
    /// `GOOGLE_PLACES_TIMEOUT_MS`. Returns `None` when no key is set.
    pub fn from_env() -> Option<Self> {
        let api_key = std::env::var("GOOGLE_PLACES_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())?;
        let base_url = std::env::var("GOOGLE_PLACES_URL")
            .unwrap_or_else(|_| DEFAULT_GOOGLE_PLACES_URL.to_string());
        let timeout_ms = std::env::var("GOOGLE_PLACES_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(defaults::GOOGLE_TIMEOUT_MS);

        Some(Self {
            base_url,
            api_key,
            timeout_ms,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }
}

/// Commercial places API provider.
pub struct GooglePlacesProvider {
    client: Client,
    config: GoogleConfig,
}

impl GooglePlacesProvider {
    pub fn new(config: GoogleConfig) -> Result<Self> {
        let client = build_client(defaults::PROVIDER_GOOGLE, Duration::from_millis(config.timeout_ms))?;
        info!(
            subsystem = "providers",
            component = "google",
            base_url = %config.base_url,
            timeout_ms = config.timeout_ms,
            "Initializing Google Places provider"
        );
        Ok(Self { client, config })
    }

    /// Build from environment; `Ok(None)` when no API key is configured.
    pub fn from_env() -> Result<Option<Self>> {
        GoogleConfig::from_env().map(Self::new).transpose()
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn post<B: Serialize + ?Sized>(
        &self,
        path: &str,
        field_mask: &str,
        body: &B,
    ) -> Result<reqwest::Response> {
        let response = self
            .client
            .post(self.url(path))
            .header("X-Goog-Api-Key", &self.config.api_key)
            .header("X-Goog-FieldMask", field_mask)
            .json(body)
            .send()
            .await
            .map_err(|e| send_error(defaults::PROVIDER_GOOGLE, e))?;
        ensure_success(defaults::PROVIDER_GOOGLE, response).await
    }
}

#[async_trait]
impl PlaceProvider for GooglePlacesProvider {
    fn name(&self) -> &str {
        defaults::PROVIDER_GOOGLE
    }

    fn priority(&self) -> u8 {
        defaults::PRIORITY_GOOGLE
    }

    fn timeout(&self) -> Option<Duration> {
        Some(Duration::from_millis(self.config.timeout_ms))
    }

    #[instrument(skip(self, query), fields(subsystem = "providers", component = "google", op = "search"))]
    async fn search(&self, query: &SearchQuery) -> Result<Vec<Place>> {
        let start = Instant::now();
        let origin = query.location.point();
        let area = LocationArea::circle(origin, query.location.radius_m);
        let max_result_count = query.limit.saturating_add(query.offset).clamp(1, MAX_RESULT_COUNT);

        let response = match text_query(query) {
            Some(text) => {
                let body = TextSearchRequest {
                    text_query: &text,
                    max_result_count,
                    location_bias: area,
                };
                self.post("places:searchText", SEARCH_FIELD_MASK, &body).await?
            }
            None => {
                let body = NearbySearchRequest {
                    max_result_count,
                    location_restriction: area,
                    rank_preference: "DISTANCE",
                };
                self.post("places:searchNearby", SEARCH_FIELD_MASK, &body).await?
            }
        };

        let parsed: SearchResponse = decode(defaults::PROVIDER_GOOGLE, response).await?;
        let received = parsed.places.len();
        let places: Vec<Place> = parsed
            .places
            .into_iter()
            .filter_map(normalize_place)
            .map(|mut p| {
                p.measure_from(&origin);
                p
            })
            .collect();

        if places.len() < received {
            debug!(
                dropped = received - places.len(),
                "Skipped places missing id, name or location"
            );
        }
        debug!(
            result_count = places.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Google search complete"
        );
        Ok(places)
    }

    #[instrument(skip(self), fields(subsystem = "providers", component = "google", op = "get_by_id"))]
    async fn get_by_id(&self, id: &str) -> Result<Option<Place>> {
        let Some(google_id) = id.strip_prefix(ID_PREFIX) else {
            return Ok(None);
        };

        let response = self
            .client
            .get(self.url(&format!("places/{}", google_id)))
            .header("X-Goog-Api-Key", &self.config.api_key)
            .header("X-Goog-FieldMask", DETAILS_FIELD_MASK)
            .send()
            .await
            .map_err(|e| send_error(defaults::PROVIDER_GOOGLE, e))?;

        let Some(response) = ensure_found(defaults::PROVIDER_GOOGLE, response).await? else {
            return Ok(None);
        };
        let raw: GooglePlace = decode(defaults::PROVIDER_GOOGLE, response).await?;
        Ok(normalize_place(raw))
    }

    fn supports_autocomplete(&self) -> bool {
        true
    }

    #[instrument(skip(self, query), fields(subsystem = "providers", component = "google", op = "autocomplete"))]
    async fn autocomplete(&self, query: &AutocompleteQuery) -> Result<Vec<AutocompleteSuggestion>> {
        let body = AutocompleteRequest {
            input: query.input.trim(),
            location_bias: query
                .bias()
                .map(|p| LocationArea::circle(p, AUTOCOMPLETE_BIAS_RADIUS_M)),
        };
        let response = self
            .post("places:autocomplete", AUTOCOMPLETE_FIELD_MASK, &body)
            .await?;
        let parsed: AutocompleteResponse = decode(defaults::PROVIDER_GOOGLE, response).await?;

        let suggestions: Vec<AutocompleteSuggestion> = parsed
            .suggestions
            .into_iter()
            .filter_map(|s| s.place_prediction)
            .filter_map(normalize_prediction)
            .collect();
        debug!(result_count = suggestions.len(), "Google autocomplete complete");
        Ok(suggestions)
    }

    async fn health_check(&self) -> Result<bool> {
        let response = self
            .client
            .post(self.url("places:autocomplete"))
            .header("X-Goog-Api-Key", &self.config.api_key)
            .header("X-Goog-FieldMask", AUTOCOMPLETE_FIELD_MASK)
            .timeout(HEALTH_TIMEOUT)
            .json(&json!({ "input": "cafe" }))
            .send()
            .await;

        match response {
            Ok(resp) if resp.status().is_success() => Ok(true),
            Ok(resp) => {
                warn!(
                    subsystem = "providers",
                    component = "google",
                    status = %resp.status(),
                    "Google Places health check failed"
                );
                Ok(false)
            }
            Err(e) => {
                warn!(
                    subsystem = "providers",
                    component = "google",
                    error = %e,
                    "Google Places health check error"
                );
                Ok(false)
            }
        }
    }
}

/// Text sent to `searchText`, or `None` to use `searchNearby`.
fn text_query(query: &SearchQuery) -> Option<String> {
    match (query.text(), query.category_filter()) {
        (Some(text), Some(category)) => Some(format!("{} {}", text, category)),
        (Some(text), None) => Some(text.to_string()),
        (None, Some(category)) => Some(category.to_string()),
        (None, None) => None,
    }
}

// =============================================================================
// NORMALIZATION
// =============================================================================

/// Normalize one API place. Places without an id, a display name or a
/// location are skipped.
fn normalize_place(raw: GooglePlace) -> Option<Place> {
    let google_id = raw.id.filter(|id| !id.is_empty())?;
    let name = raw
        .display_name
        .and_then(|t| t.text)
        .filter(|n| !n.trim().is_empty())?;
    let location = raw.location?;

    let mut place = Place::new(
        format!("{}{}", ID_PREFIX, google_id),
        name,
        GeoPoint::new(location.latitude, location.longitude),
        defaults::GOOGLE_BASE_CONFIDENCE,
        defaults::PROVIDER_GOOGLE,
    );
    place.google_place_id = Some(google_id);

    let primary = raw.primary_type.or_else(|| raw.types.first().cloned());
    let secondary = raw
        .types
        .into_iter()
        .filter(|t| Some(t) != primary.as_ref())
        .collect();
    place.category = PlaceCategory { primary, secondary };

    place.address = raw.formatted_address.map(Address::formatted_only);
    place.websites.extend(raw.website_uri);
    place
        .phones
        .extend(raw.international_phone_number.or(raw.national_phone_number));
    place.operating_status = raw.business_status.as_deref().and_then(operating_status);

    if let Some(value) = raw.rating {
        place.attributes.set(PlaceAttribute::Rating {
            value,
            count: raw.user_rating_count,
        });
    }
    if let Some(level) = raw.price_level.as_deref().and_then(price_level) {
        place.attributes.set(PlaceAttribute::PriceLevel { level });
    }
    if let Some(hours) = raw.regular_opening_hours {
        place.attributes.set(PlaceAttribute::OpeningHours {
            open_now: hours.open_now,
            weekday_text: hours.weekday_descriptions,
        });
    }
    if let Some(options) = raw.accessibility_options {
        if let Some(entrance) = options.wheelchair_accessible_entrance {
            place.attributes.set(PlaceAttribute::Accessibility {
                wheelchair: if entrance {
                    WheelchairAccess::Yes
                } else {
                    WheelchairAccess::No
                },
                toilet: options.wheelchair_accessible_restroom,
                entrance_step_free: Some(entrance),
            });
        }
    }
    if let Some(uri) = raw.google_maps_uri {
        place.attributes.insert_extra("google_maps_uri", json!(uri));
    }

    Some(place)
}

fn normalize_prediction(p: PlacePrediction) -> Option<AutocompleteSuggestion> {
    let (main, secondary) = match p.structured_format {
        Some(f) => (
            f.main_text.and_then(|t| t.text),
            f.secondary_text.and_then(|t| t.text),
        ),
        None => (None, None),
    };
    let text = main
        .or_else(|| p.text.and_then(|t| t.text))
        .filter(|t| !t.trim().is_empty())?;

    Some(AutocompleteSuggestion {
        text,
        secondary_text: secondary,
        place_id: p.place_id.map(|id| format!("{}{}", ID_PREFIX, id)),
        provider: defaults::PROVIDER_GOOGLE.to_string(),
    })
}

fn operating_status(business_status: &str) -> Option<String> {
    let status = match business_status {
        "OPERATIONAL" => "open",
        "CLOSED_TEMPORARILY" => "temporarily_closed",
        "CLOSED_PERMANENTLY" => "permanently_closed",
        _ => return None,
    };
    Some(status.to_string())
}

fn price_level(level: &str) -> Option<u8> {
    match level {
        "PRICE_LEVEL_FREE" => Some(0),
        "PRICE_LEVEL_INEXPENSIVE" => Some(1),
        "PRICE_LEVEL_MODERATE" => Some(2),
        "PRICE_LEVEL_EXPENSIVE" => Some(3),
        "PRICE_LEVEL_VERY_EXPENSIVE" => Some(4),
        _ => None,
    }
}

// =============================================================================
// WIRE TYPES
// =============================================================================

#[derive(Serialize)]
struct LocationArea {
    circle: Circle,
}

impl LocationArea {
    fn circle(center: GeoPoint, radius: f64) -> Self {
        Self {
            circle: Circle {
                center: LatLng {
                    latitude: center.lat,
                    longitude: center.lon,
                },
                radius,
            },
        }
    }
}

#[derive(Serialize)]
struct Circle {
    center: LatLng,
    radius: f64,
}

#[derive(Serialize, Deserialize)]
struct LatLng {
    latitude: f64,
    longitude: f64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TextSearchRequest<'a> {
    text_query: &'a str,
    max_result_count: u32,
    location_bias: LocationArea,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NearbySearchRequest {
    max_result_count: u32,
    location_restriction: LocationArea,
    rank_preference: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AutocompleteRequest<'a> {
    input: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    location_bias: Option<LocationArea>,
}

#[derive(Deserialize, Default)]
struct SearchResponse {
    #[serde(default)]
    places: Vec<GooglePlace>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct GooglePlace {
    id: Option<String>,
    display_name: Option<LocalizedText>,
    formatted_address: Option<String>,
    location: Option<LatLng>,
    #[serde(default)]
    types: Vec<String>,
    primary_type: Option<String>,
    rating: Option<f64>,
    user_rating_count: Option<u32>,
    price_level: Option<String>,
    website_uri: Option<String>,
    national_phone_number: Option<String>,
    international_phone_number: Option<String>,
    business_status: Option<String>,
    regular_opening_hours: Option<OpeningHours>,
    accessibility_options: Option<AccessibilityOptions>,
    google_maps_uri: Option<String>,
}

#[derive(Deserialize)]
struct LocalizedText {
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OpeningHours {
    open_now: Option<bool>,
    #[serde(default)]
    weekday_descriptions: Vec<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccessibilityOptions {
    wheelchair_accessible_entrance: Option<bool>,
    wheelchair_accessible_restroom: Option<bool>,
}

#[derive(Deserialize)]
struct AutocompleteResponse {
    #[serde(default)]
    suggestions: Vec<Suggestion>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Suggestion {
    place_prediction: Option<PlacePrediction>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlacePrediction {
    place_id: Option<String>,
    text: Option<LocalizedText>,
    structured_format: Option<StructuredFormat>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StructuredFormat {
    main_text: Option<LocalizedText>,
    secondary_text: Option<LocalizedText>,
}

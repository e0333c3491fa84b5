//! Domain models for mapier.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::defaults;
use crate::error::{Error, FieldError, Result};
use crate::geo::{check_coordinates, GeoPoint};

// =============================================================================
// SEARCH QUERY
// =============================================================================

fn default_radius_m() -> f64 {
    defaults::SEARCH_RADIUS_M
}

fn default_limit() -> u32 {
    defaults::SEARCH_LIMIT
}

/// Center and radius of a search.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct SearchLocation {
    pub lat: f64,
    pub lon: f64,
    /// Search radius in meters (default 1000, bounded [1, 50000]).
    #[serde(default = "default_radius_m", alias = "radius")]
    pub radius_m: f64,
}

impl SearchLocation {
    pub fn point(&self) -> GeoPoint {
        GeoPoint::new(self.lat, self.lon)
    }
}

/// A multi-provider search request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct SearchQuery {
    pub location: SearchLocation,
    /// Free-text query (e.g. "coffee").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    /// Category filter (e.g. "cafe").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
}

impl SearchQuery {
    /// Query centered on `(lat, lon)` with default radius and paging.
    pub fn near(lat: f64, lon: f64) -> Self {
        Self {
            location: SearchLocation {
                lat,
                lon,
                radius_m: defaults::SEARCH_RADIUS_M,
            },
            query: None,
            category: None,
            limit: defaults::SEARCH_LIMIT,
            offset: 0,
        }
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    pub fn with_radius(mut self, radius_m: f64) -> Self {
        self.location.radius_m = radius_m;
        self
    }

    /// Check every field, reporting all violations at once.
    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();
        check_coordinates("location", self.location.lat, self.location.lon, &mut errors);

        let r = self.location.radius_m;
        if !r.is_finite() || !(defaults::SEARCH_RADIUS_MIN_M..=defaults::SEARCH_RADIUS_MAX_M).contains(&r) {
            errors.push(FieldError::new(
                "location.radius_m",
                format!(
                    "must be within [{}, {}]",
                    defaults::SEARCH_RADIUS_MIN_M,
                    defaults::SEARCH_RADIUS_MAX_M
                ),
            ));
        }
        if self.limit == 0 || self.limit > defaults::SEARCH_LIMIT_MAX {
            errors.push(FieldError::new(
                "limit",
                format!("must be within [1, {}]", defaults::SEARCH_LIMIT_MAX),
            ));
        }
        if matches!(&self.query, Some(q) if q.chars().count() > 256) {
            errors.push(FieldError::new("query", "must be at most 256 characters"));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(Error::Validation(errors))
        }
    }

    /// The same search asked of a provider before merging and paging.
    ///
    /// Every page of a query sees the same candidate set: providers are
    /// asked for at least `SEARCH_LIMIT_MAX` results from offset zero, and
    /// paging is applied once after ranking.
    pub fn candidate_window(&self) -> SearchQuery {
        let reach = self.offset.saturating_add(self.limit);
        SearchQuery {
            limit: reach.max(defaults::SEARCH_LIMIT_MAX),
            offset: 0,
            ..self.clone()
        }
    }

    /// Trimmed free-text query, `None` when blank.
    pub fn text(&self) -> Option<&str> {
        self.query.as_deref().map(str::trim).filter(|q| !q.is_empty())
    }

    /// Trimmed category filter, `None` when blank.
    pub fn category_filter(&self) -> Option<&str> {
        self.category.as_deref().map(str::trim).filter(|c| !c.is_empty())
    }
}

/// An autocomplete request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AutocompleteQuery {
    pub input: String,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lon: Option<f64>,
}

impl AutocompleteQuery {
    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();
        if self.input.trim().is_empty() {
            errors.push(FieldError::new("input", "is required"));
        }
        match (self.lat, self.lon) {
            (Some(lat), Some(lon)) => check_coordinates("", lat, lon, &mut errors),
            (None, None) => {}
            _ => errors.push(FieldError::new("lat", "lat and lon must be given together")),
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(Error::Validation(errors))
        }
    }

    pub fn bias(&self) -> Option<GeoPoint> {
        Some(GeoPoint::new(self.lat?, self.lon?))
    }
}

// =============================================================================
// PLACE
// =============================================================================

/// Whether a canonical record came from bulk ingestion or was created here.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    /// Bulk-ingested from a provider dataset
    #[default]
    Provider,
    /// Created by identity resolution when nothing matched
    Custom,
}

impl std::fmt::Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Provider => write!(f, "provider"),
            Self::Custom => write!(f, "custom"),
        }
    }
}

impl std::str::FromStr for SourceType {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "provider" => Ok(Self::Provider),
            "custom" => Ok(Self::Custom),
            _ => Err(format!("Invalid source type: {}", s)),
        }
    }
}

/// Client platform that owns a place identifier (PLI).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Google,
    Apple,
}

impl Platform {
    pub const ALL: [Platform; 2] = [Platform::Google, Platform::Apple];

    /// Column holding this platform's identifier on canonical records.
    pub fn column(&self) -> &'static str {
        match self {
            Self::Google => "google_place_id",
            Self::Apple => "apple_place_id",
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Google => write!(f, "google"),
            Self::Apple => write!(f, "apple"),
        }
    }
}

impl std::str::FromStr for Platform {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "google" => Ok(Self::Google),
            "apple" => Ok(Self::Apple),
            _ => Err(format!("Invalid platform: {} (expected google or apple)", s)),
        }
    }
}

/// Device platform an observation was made on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SourcePlatform {
    Ios,
    Android,
    Web,
}

impl std::fmt::Display for SourcePlatform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ios => write!(f, "ios"),
            Self::Android => write!(f, "android"),
            Self::Web => write!(f, "web"),
        }
    }
}

/// Primary category plus any alternates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct PlaceCategory {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub secondary: Vec<String>,
}

impl PlaceCategory {
    pub fn primary(primary: impl Into<String>) -> Self {
        Self {
            primary: Some(primary.into()),
            secondary: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.primary.is_none() && self.secondary.is_empty()
    }

    /// True if `category` names the primary or any secondary category.
    pub fn matches(&self, category: &str) -> bool {
        let wanted = category.trim();
        self.primary
            .iter()
            .chain(self.secondary.iter())
            .any(|c| c.eq_ignore_ascii_case(wanted))
    }
}

/// Structured postal address.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct Address {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub street: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postcode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    /// Pre-formatted address string, stored for custom records.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formatted: Option<String>,
}

impl Address {
    /// Address known only by its formatted string.
    pub fn formatted_only(formatted: impl Into<String>) -> Self {
        Self {
            formatted: Some(formatted.into()),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.display().is_none()
    }

    /// The stored formatted string, or the non-empty structured
    /// components joined with ", ".
    pub fn display(&self) -> Option<String> {
        if let Some(f) = self.formatted.as_deref().map(str::trim).filter(|f| !f.is_empty()) {
            return Some(f.to_string());
        }
        let joined = [&self.street, &self.city, &self.state, &self.postcode, &self.country]
            .into_iter()
            .filter_map(|c| c.as_deref().map(str::trim))
            .filter(|c| !c.is_empty())
            .collect::<Vec<_>>()
            .join(", ");
        (!joined.is_empty()).then_some(joined)
    }

    /// Copy with `formatted` populated for output.
    pub fn with_display(mut self) -> Self {
        self.formatted = self.display();
        self
    }
}

/// Wheelchair access level as reported by accessibility datasets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WheelchairAccess {
    Yes,
    Limited,
    No,
    Unknown,
}

/// Attribute kinds mapier understands across providers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PlaceAttribute {
    Accessibility {
        wheelchair: WheelchairAccess,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        toilet: Option<bool>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        entrance_step_free: Option<bool>,
    },
    Rating {
        value: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        count: Option<u32>,
    },
    PriceLevel {
        level: u8,
    },
    OpeningHours {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        open_now: Option<bool>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        weekday_text: Vec<String>,
    },
    ProviderTypes {
        types: Vec<String>,
    },
}

impl PlaceAttribute {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Accessibility { .. } => "accessibility",
            Self::Rating { .. } => "rating",
            Self::PriceLevel { .. } => "price_level",
            Self::OpeningHours { .. } => "opening_hours",
            Self::ProviderTypes { .. } => "provider_types",
        }
    }
}

/// Known attribute kinds plus an opaque map for anything else a provider
/// reports.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlaceAttributes {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub known: Vec<PlaceAttribute>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extra: Map<String, JsonValue>,
}

impl PlaceAttributes {
    pub fn is_empty(&self) -> bool {
        self.known.is_empty() && self.extra.is_empty()
    }

    pub fn get(&self, kind: &str) -> Option<&PlaceAttribute> {
        self.known.iter().find(|a| a.kind() == kind)
    }

    /// Add or replace the attribute of the same kind.
    pub fn set(&mut self, attr: PlaceAttribute) {
        self.known.retain(|a| a.kind() != attr.kind());
        self.known.push(attr);
    }

    pub fn insert_extra(&mut self, key: impl Into<String>, value: JsonValue) {
        self.extra.insert(key.into(), value);
    }

    /// Fill kinds and keys absent here from `other`; existing entries win.
    pub fn backfill_from(&mut self, other: &PlaceAttributes) {
        for attr in &other.known {
            if self.get(attr.kind()).is_none() {
                self.known.push(attr.clone());
            }
        }
        for (k, v) in &other.extra {
            self.extra.entry(k.clone()).or_insert_with(|| v.clone());
        }
    }
}

/// Canonical representation of a real-world place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct Place {
    pub id: String,
    pub name: String,
    pub location: GeoPoint,
    #[serde(default)]
    pub category: PlaceCategory,
    /// Confidence in [0, 1].
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub socials: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub websites: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub phones: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub emails: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operating_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
    /// Dataset a bulk-ingested record came from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_source: Option<String>,
    #[serde(default, skip_serializing_if = "PlaceAttributes::is_empty")]
    #[schema(value_type = Object)]
    pub attributes: PlaceAttributes,
    /// Distance from the query center in meters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance_m: Option<f64>,
    #[serde(default)]
    pub source_type: SourceType,
    /// Provider that produced this record (the representative after a merge).
    pub provider: String,
    /// Every provider that contributed to this record.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub google_place_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apple_place_id: Option<String>,
}

impl Place {
    /// Minimal place attributed to `provider`; remaining fields empty.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        location: GeoPoint,
        confidence: f64,
        provider: impl Into<String>,
    ) -> Self {
        let provider = provider.into();
        Self {
            id: id.into(),
            name: name.into(),
            location,
            category: PlaceCategory::default(),
            confidence: confidence.clamp(0.0, 1.0),
            socials: Vec::new(),
            websites: Vec::new(),
            phones: Vec::new(),
            emails: Vec::new(),
            brand: None,
            operating_status: None,
            address: None,
            primary_source: None,
            attributes: PlaceAttributes::default(),
            distance_m: None,
            source_type: SourceType::Provider,
            sources: vec![provider.clone()],
            provider,
            google_place_id: None,
            apple_place_id: None,
        }
    }

    pub fn platform_id(&self, platform: Platform) -> Option<&str> {
        match platform {
            Platform::Google => self.google_place_id.as_deref(),
            Platform::Apple => self.apple_place_id.as_deref(),
        }
    }

    pub fn set_platform_id(&mut self, platform: Platform, id: impl Into<String>) {
        let id = Some(id.into());
        match platform {
            Platform::Google => self.google_place_id = id,
            Platform::Apple => self.apple_place_id = id,
        }
    }

    /// Populate `distance_m` relative to `origin`.
    pub fn measure_from(&mut self, origin: &GeoPoint) {
        self.distance_m = Some(self.location.distance_to(origin));
    }

    pub fn summary(&self) -> PlaceSummary {
        PlaceSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            location: self.location,
            category: self.category.primary.clone(),
            address: self.address.as_ref().and_then(Address::display),
            source_type: self.source_type,
        }
    }
}

/// Basic fields of a canonical place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct PlaceSummary {
    pub id: String,
    pub name: String,
    pub location: GeoPoint,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    pub source_type: SourceType,
}

// =============================================================================
// PROVIDER RESULTS
// =============================================================================

/// How one provider fared during a fan-out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ProviderStatus {
    Ok,
    Timeout,
    Error,
}

impl std::fmt::Display for ProviderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ok => write!(f, "ok"),
            Self::Timeout => write!(f, "timeout"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Per-provider outcome attached to aggregated results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ProviderOutcome {
    pub provider: String,
    pub status: ProviderStatus,
    pub latency_ms: u64,
    pub count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Metadata describing a result set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ResultMetadata {
    /// Number of places in this page.
    pub count: usize,
    /// True when served from cache.
    pub cached: bool,
    pub latency_ms: u64,
    /// Mean confidence of the returned places (0 when empty).
    pub confidence: f64,
    /// Number of merged places before paging.
    #[serde(default)]
    pub total: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub providers: Vec<ProviderOutcome>,
}

/// Places returned by one provider, or the merged view of several.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ProviderResult {
    pub provider: String,
    pub places: Vec<Place>,
    pub metadata: ResultMetadata,
}

impl ProviderResult {
    pub fn new(provider: impl Into<String>, places: Vec<Place>, latency_ms: u64) -> Self {
        let confidence = mean_confidence(&places);
        Self {
            provider: provider.into(),
            metadata: ResultMetadata {
                count: places.len(),
                cached: false,
                latency_ms,
                confidence,
                total: places.len(),
                providers: Vec::new(),
            },
            places,
        }
    }
}

/// Mean confidence of `places`, 0 for an empty slice.
pub fn mean_confidence(places: &[Place]) -> f64 {
    if places.is_empty() {
        return 0.0;
    }
    places.iter().map(|p| p.confidence).sum::<f64>() / places.len() as f64
}

/// One autocomplete suggestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct AutocompleteSuggestion {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub place_id: Option<String>,
    pub provider: String,
}

/// Health of one provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ProviderHealthStatus {
    pub provider: String,
    pub priority: u8,
    pub healthy: bool,
    pub latency_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// =============================================================================
// IDENTITY RESOLUTION
// =============================================================================

/// Kind of record a match candidate points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum MatchedSource {
    Canonical,
    Custom,
}

impl std::str::FromStr for MatchedSource {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "canonical" | "provider" | "overture" => Ok(Self::Canonical),
            "custom" => Ok(Self::Custom),
            _ => Err(format!("Invalid matched source: {}", s)),
        }
    }
}

/// A canonical record that may describe an observed place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct CandidateMatch {
    pub matched_id: String,
    pub matched_source: MatchedSource,
    pub matched_name: String,
    pub match_confidence: f64,
    pub distance_m: f64,
    pub name_similarity: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub google_place_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apple_place_id: Option<String>,
}

/// Which rule of the layered match policy decided a resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionMethod {
    ExactIdentifier,
    SpatialMatch,
    CreatedNew,
}

impl std::fmt::Display for ResolutionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ExactIdentifier => write!(f, "exact_identifier"),
            Self::SpatialMatch => write!(f, "spatial_match"),
            Self::CreatedNew => write!(f, "created_new"),
        }
    }
}

/// Outcome of one resolve call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct Resolution {
    pub method: ResolutionMethod,
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance_m: Option<f64>,
}

/// A place as observed by a client on one platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct PlaceObservation {
    pub lat: f64,
    pub lon: f64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub google_place_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apple_place_id: Option<String>,
    pub source_platform: SourcePlatform,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Formatted address as displayed by the client.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
}

impl PlaceObservation {
    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();
        check_coordinates("", self.lat, self.lon, &mut errors);
        if self.name.trim().is_empty() {
            errors.push(FieldError::new("name", "is required"));
        }
        for platform in Platform::ALL {
            if matches!(self.platform_id(platform), Some(id) if id.trim().is_empty()) {
                errors.push(FieldError::new(platform.column(), "must not be blank"));
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(Error::Validation(errors))
        }
    }

    /// Copy with the name and platform identifiers trimmed, so stored
    /// identifiers compare equal to the trimmed ids sync requests use.
    pub fn normalized(&self) -> Self {
        let trim = |id: &Option<String>| id.as_deref().map(|v| v.trim().to_string());
        Self {
            name: self.name.trim().to_string(),
            google_place_id: trim(&self.google_place_id),
            apple_place_id: trim(&self.apple_place_id),
            ..self.clone()
        }
    }

    pub fn point(&self) -> GeoPoint {
        GeoPoint::new(self.lat, self.lon)
    }

    pub fn platform_id(&self, platform: Platform) -> Option<&str> {
        match platform {
            Platform::Google => self.google_place_id.as_deref(),
            Platform::Apple => self.apple_place_id.as_deref(),
        }
    }

    /// Supplied platform identifiers, Google first.
    pub fn platform_ids(&self) -> impl Iterator<Item = (Platform, &str)> {
        Platform::ALL
            .into_iter()
            .filter_map(move |p| self.platform_id(p).map(|id| (p, id)))
    }
}

/// Fields of a custom canonical record to be created.
#[derive(Debug, Clone, PartialEq)]
pub struct NewCustomPlace {
    pub id: String,
    pub name: String,
    pub location: GeoPoint,
    pub category: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub google_place_id: Option<String>,
    pub apple_place_id: Option<String>,
    pub source_platform: SourcePlatform,
}

impl NewCustomPlace {
    /// Record for `obs` under a freshly generated custom id.
    pub fn from_observation(obs: &PlaceObservation) -> Self {
        Self {
            id: format!(
                "{}{}",
                defaults::CUSTOM_ID_PREFIX,
                uuid::Uuid::now_v7().simple()
            ),
            name: obs.name.trim().to_string(),
            location: obs.point(),
            category: obs.category.clone(),
            address: obs.address.clone(),
            phone: obs.phone.clone(),
            website: obs.website.clone(),
            google_place_id: obs.google_place_id.clone(),
            apple_place_id: obs.apple_place_id.clone(),
            source_platform: obs.source_platform,
        }
    }
}

/// Result of resolving an observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ResolvedPlace {
    pub place: Place,
    pub resolution: Resolution,
    /// Platforms whose identifier was newly linked by this call.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub linked: Vec<Platform>,
}

/// Outcome of an explicit identifier sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Linked,
    AlreadyLinked,
}

// =============================================================================
// BRIDGE / NEARBY
// =============================================================================

/// Whether the target platform identifier is already known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum BridgeHint {
    Cached,
    SearchRequired,
}

/// Parameters a client should use for its native place search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct SearchHint {
    pub query: String,
    pub lat: f64,
    pub lon: f64,
}

/// Cross-platform bridge answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct BridgeResult {
    pub place: PlaceSummary,
    pub target_platform: Platform,
    pub target_identifier: Option<String>,
    pub hint: BridgeHint,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<SearchHint>,
}

/// Nearest canonical record to a coordinate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct NearbyPlace {
    pub id: String,
    pub name: String,
    pub location: GeoPoint,
    pub distance_m: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub google_place_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apple_place_id: Option<String>,
}

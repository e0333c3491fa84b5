//! OpenAPI document served at `/api-docs/openapi.json`.

use utoipa::OpenApi;

use mapier_core::{
    Address, AutocompleteQuery, AutocompleteSuggestion, BridgeHint, BridgeResult, FieldError,
    GeoPoint, NearbyPlace, Place, PlaceCategory, PlaceObservation, PlaceSummary, Platform,
    ProviderFailure, ProviderHealthStatus, ProviderOutcome, ProviderResult, ProviderStatus,
    Resolution, ResolutionMethod, ResolvedPlace, ResultMetadata, SearchHint, SearchLocation,
    SearchQuery, SourcePlatform, SourceType, SyncStatus,
};

use crate::error::{ErrorBody, ErrorResponse};
use crate::handlers::{places, search, system};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "mapier API",
        description = "Multi-provider place search and cross-platform place identity"
    ),
    paths(
        system::health,
        search::search,
        search::search_health,
        places::autocomplete,
        places::get_place,
        places::resolve,
        places::sync_pli,
        places::bridge,
        places::find_nearby,
        places::export,
    ),
    components(schemas(
        ErrorBody,
        ErrorResponse,
        FieldError,
        ProviderFailure,
        system::HealthResponse,
        search::SearchResponse,
        search::SearchHealthResponse,
        places::AutocompleteResponse,
        places::PlaceResponse,
        places::ResolveResponse,
        places::SyncPliRequest,
        places::SyncPliResponse,
        places::BridgeResponse,
        places::FindNearbyRequest,
        places::FindNearbyResponse,
        SearchQuery,
        SearchLocation,
        AutocompleteQuery,
        AutocompleteSuggestion,
        GeoPoint,
        Place,
        PlaceCategory,
        PlaceSummary,
        Address,
        SourceType,
        SourcePlatform,
        Platform,
        ProviderResult,
        ResultMetadata,
        ProviderOutcome,
        ProviderStatus,
        ProviderHealthStatus,
        PlaceObservation,
        ResolvedPlace,
        Resolution,
        ResolutionMethod,
        SyncStatus,
        BridgeResult,
        BridgeHint,
        SearchHint,
        NearbyPlace,
    )),
    tags(
        (name = "System", description = "Liveness"),
        (name = "Search", description = "Multi-provider search and provider health"),
        (name = "Places", description = "Place detail, autocomplete and export"),
        (name = "Identity", description = "Identity resolution, identifier sync and bridging")
    )
)]
pub struct ApiDoc;

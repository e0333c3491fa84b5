//! Router tests for identity resolution, identifier sync, bridging and
//! nearby inference.

mod helpers;

use axum::http::StatusCode;
use serde_json::{json, Value};

use mapier_core::CacheGateway;
use mapier_providers::MockProvider;

use helpers::{place_at, TestApp, METER_LAT, ORIGIN};

fn observation(name: &str, north_m: f64) -> Value {
    json!({
        "lat": ORIGIN.0 + north_m * METER_LAT,
        "lon": ORIGIN.1,
        "name": name,
        "source_platform": "ios",
    })
}

fn with_id(mut obs: Value, field: &str, id: &str) -> Value {
    obs[field] = json!(id);
    obs
}

// =============================================================================
// RESOLVE
// =============================================================================

#[tokio::test]
async fn test_resolve_creates_custom_place() {
    let app = TestApp::builder().build();

    let res = app
        .post(
            "/places/resolve",
            with_id(observation("Joe's Pizza", 0.0), "google_place_id", "ChIJjoe"),
        )
        .await;

    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["success"], true);
    assert!(res.body["place"]["id"].as_str().unwrap().starts_with("custom_"));
    assert_eq!(res.body["place"]["source_type"], "custom");
    assert_eq!(res.body["resolution"]["method"], "created_new");
    assert_eq!(res.body["resolution"]["confidence"], 0.5);
    assert_eq!(res.body["linked"], json!(["google"]));
    assert_eq!(app.places.len(), 1);
}

#[tokio::test]
async fn test_resolve_same_identifier_is_exact_match() {
    let app = TestApp::builder().build();
    let obs = with_id(observation("Joe's Pizza", 0.0), "google_place_id", "ChIJjoe");

    let first = app.post("/places/resolve", obs.clone()).await;
    let second = app.post("/places/resolve", obs).await;

    assert_eq!(second.status, StatusCode::OK);
    assert_eq!(second.body["place"]["id"], first.body["place"]["id"]);
    assert_eq!(second.body["resolution"]["method"], "exact_identifier");
    assert_eq!(second.body["resolution"]["confidence"], 1.0);
    assert!(second.body.get("linked").is_none());
    assert_eq!(app.places.len(), 1);
}

#[tokio::test]
async fn test_resolve_other_platform_links_by_proximity() {
    let app = TestApp::builder().build();
    let mut place = place_at("p1", "Joe's Pizza", 0.0);
    place.google_place_id = Some("ChIJjoe".into());
    app.places.add(place);

    let res = app
        .post(
            "/places/resolve",
            with_id(observation("Joe's Pizza", 10.0), "apple_place_id", "I-joe"),
        )
        .await;

    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["place"]["id"], "p1");
    assert_eq!(res.body["resolution"]["method"], "spatial_match");
    let distance = res.body["resolution"]["distance_m"].as_f64().unwrap();
    assert!((distance - 10.0).abs() < 0.5, "distance {}", distance);
    assert_eq!(res.body["linked"], json!(["apple"]));
    assert_eq!(res.body["place"]["apple_place_id"], "I-joe");

    let stored = app.places.get("p1").unwrap();
    assert_eq!(stored.apple_place_id.as_deref(), Some("I-joe"));
    assert_eq!(stored.google_place_id.as_deref(), Some("ChIJjoe"));
}

#[tokio::test]
async fn test_resolve_never_overwrites_identifier() {
    let app = TestApp::builder().build();
    let mut place = place_at("p1", "Joe's Pizza", 0.0);
    place.google_place_id = Some("ChIJjoe".into());
    place.apple_place_id = Some("I-joe".into());
    app.places.add(place);

    let obs = with_id(observation("Joe's Pizza", 5.0), "apple_place_id", "I-joe");
    let res = app
        .post("/places/resolve", with_id(obs, "google_place_id", "ChIJother"))
        .await;

    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["place"]["id"], "p1");
    assert_eq!(res.body["resolution"]["method"], "exact_identifier");
    assert_eq!(res.body["place"]["google_place_id"], "ChIJjoe");
    assert!(res.body.get("linked").is_none());
    assert_eq!(
        app.places.get("p1").unwrap().google_place_id.as_deref(),
        Some("ChIJjoe")
    );
}

#[tokio::test]
async fn test_resolve_skips_nearby_record_with_other_identifier() {
    let app = TestApp::builder().build();
    let mut place = place_at("p1", "Joe's Pizza", 0.0);
    place.google_place_id = Some("ChIJjoe".into());
    app.places.add(place);

    let res = app
        .post(
            "/places/resolve",
            with_id(observation("Joe's Pizza", 5.0), "google_place_id", "ChIJother"),
        )
        .await;

    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["resolution"]["method"], "created_new");
    assert_ne!(res.body["place"]["id"], "p1");
    assert_eq!(res.body["place"]["google_place_id"], "ChIJother");
    assert_eq!(app.places.len(), 2);
    assert_eq!(
        app.places.get("p1").unwrap().google_place_id.as_deref(),
        Some("ChIJjoe")
    );
}

#[tokio::test]
async fn test_resolve_trims_identifiers_before_storing() {
    let app = TestApp::builder().build();

    let res = app
        .post(
            "/places/resolve",
            with_id(observation("Joe's Pizza", 0.0), "google_place_id", " ChIJabc "),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["place"]["google_place_id"], "ChIJabc");
    let id = res.body["place"]["id"].as_str().unwrap().to_string();

    let res = app.post("/places/sync-pli", sync(&id, "google", "ChIJabc")).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["status"], "already_linked");

    let again = app
        .post(
            "/places/resolve",
            with_id(observation("Joe's Pizza", 0.0), "google_place_id", "ChIJabc"),
        )
        .await;
    assert_eq!(again.body["place"]["id"], id.as_str());
    assert_eq!(again.body["resolution"]["method"], "exact_identifier");
}

#[tokio::test]
async fn test_resolve_far_or_different_name_creates_new() {
    let app = TestApp::builder().build();
    app.places.add(place_at("p1", "Joe's Pizza", 0.0));

    let far = app.post("/places/resolve", observation("Joe's Pizza", 80.0)).await;
    assert_eq!(far.body["resolution"]["method"], "created_new");

    let renamed = app.post("/places/resolve", observation("Gray's Papaya", 2.0)).await;
    assert_eq!(renamed.body["resolution"]["method"], "created_new");
    assert_eq!(app.places.len(), 3);
}

#[tokio::test]
async fn test_resolve_lost_creation_race_returns_winner() {
    let app = TestApp::builder().build();
    let mut winner = place_at("custom_winner", "Joe's Pizza", 0.0);
    winner.google_place_id = Some("ChIJrace".into());
    app.places.lose_next_insert_to(winner);

    let res = app
        .post(
            "/places/resolve",
            with_id(observation("Joe's Pizza", 0.0), "google_place_id", "ChIJrace"),
        )
        .await;

    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["place"]["id"], "custom_winner");
    assert_eq!(res.body["resolution"]["method"], "exact_identifier");
    assert_eq!(app.places.len(), 1);
    assert_eq!(app.places.insert_attempts(), 1);
}

#[tokio::test]
async fn test_resolve_gives_up_after_repeated_conflicts() {
    let app = TestApp::builder().build();
    app.places.always_conflict();

    let res = app.post("/places/resolve", observation("Joe's Pizza", 0.0)).await;

    assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(res.body["error"]["code"], "conflation_failure");
    assert_eq!(app.places.insert_attempts(), 3);
}

#[tokio::test]
async fn test_resolve_candidate_failure_is_conflation_failure() {
    let app = TestApp::builder().build();
    app.candidates.fail();

    let res = app.post("/places/resolve", observation("Joe's Pizza", 0.0)).await;

    assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(res.body["error"]["code"], "conflation_failure");
    assert_eq!(app.places.len(), 0);
}

#[tokio::test]
async fn test_resolve_validation() {
    let app = TestApp::builder().build();
    let mut obs = observation("  ", 0.0);
    obs["lat"] = json!(91.0);
    obs["google_place_id"] = json!("");

    let res = app.post("/places/resolve", obs).await;

    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    let fields: Vec<&str> = res.body["error"]["details"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|d| d["field"].as_str())
        .collect();
    assert_eq!(fields, vec!["lat", "name", "google_place_id"]);

    let res = app
        .post("/places/resolve", json!({ "lat": 1.0, "lon": 1.0, "name": "x" }))
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
}

// =============================================================================
// SYNC-PLI
// =============================================================================

fn sync(place_id: &str, platform: &str, identifier: &str) -> Value {
    json!({ "place_id": place_id, "platform": platform, "identifier": identifier })
}

#[tokio::test]
async fn test_sync_pli_links_then_reports_already_linked() {
    let app = TestApp::builder().build();
    app.places.add(place_at("p1", "Joe's Pizza", 0.0));

    let res = app.post("/places/sync-pli", sync("p1", "apple", "I123")).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["status"], "linked");
    assert_eq!(res.body["platform"], "apple");
    assert_eq!(
        app.places.get("p1").unwrap().apple_place_id.as_deref(),
        Some("I123")
    );

    let res = app.post("/places/sync-pli", sync("p1", "Apple", "I123")).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["status"], "already_linked");
}

#[tokio::test]
async fn test_sync_pli_conflicting_identifier() {
    let app = TestApp::builder().build();
    let mut place = place_at("p1", "Joe's Pizza", 0.0);
    place.apple_place_id = Some("I123".into());
    app.places.add(place);

    let res = app.post("/places/sync-pli", sync("p1", "apple", "I999")).await;

    assert_eq!(res.status, StatusCode::CONFLICT);
    assert_eq!(res.body["error"]["code"], "identifier_conflict");
    assert_eq!(
        app.places.get("p1").unwrap().apple_place_id.as_deref(),
        Some("I123")
    );
}

#[tokio::test]
async fn test_sync_pli_rejects_bad_requests() {
    let app = TestApp::builder().build();
    app.places.add(place_at("p1", "Joe's Pizza", 0.0));

    let res = app.post("/places/sync-pli", sync("p1", "bing", "x")).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body["error"]["details"][0]["field"], "platform");

    let res = app.post("/places/sync-pli", sync("p1", "google", "  ")).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let res = app.post("/places/sync-pli", sync("missing", "google", "ChIJx")).await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_sync_pli_invalidates_cached_detail() {
    let local = MockProvider::new("local", 1).with_places(vec![place_at("p1", "Joe's Pizza", 0.0)]);
    let app = TestApp::builder().provider(local).build();
    app.places.add(place_at("p1", "Joe's Pizza", 0.0));

    app.get("/places/p1").await;
    assert!(app.cache.get("place:p1").await.is_some());

    let res = app.post("/places/sync-pli", sync("p1", "google", "ChIJp1")).await;
    assert_eq!(res.status, StatusCode::OK);
    assert!(app.cache.get("place:p1").await.is_none());
}

// =============================================================================
// BRIDGE
// =============================================================================

#[tokio::test]
async fn test_bridge_cached_and_search_required() {
    let app = TestApp::builder().build();
    let mut place = place_at("p1", "Joe's Pizza", 0.0);
    place.google_place_id = Some("ChIJp1".into());
    app.places.add(place);

    let res = app.get("/places/p1/bridge?target_platform=google").await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["hint"], "cached");
    assert_eq!(res.body["target_identifier"], "ChIJp1");
    assert!(res.body.get("search").is_none());

    let res = app.get("/places/p1/bridge?target_platform=apple").await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["hint"], "search_required");
    assert_eq!(res.body["target_identifier"], Value::Null);
    assert_eq!(res.body["search"]["query"], "Joe's Pizza");
    assert_eq!(res.body["place"]["id"], "p1");
}

#[tokio::test]
async fn test_bridge_errors() {
    let app = TestApp::builder().build();
    app.places.add(place_at("p1", "Joe's Pizza", 0.0));

    assert_eq!(app.get("/places/p1/bridge").await.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        app.get("/places/p1/bridge?target_platform=bing").await.status,
        StatusCode::BAD_REQUEST
    );
    let res = app.get("/places/nope/bridge?target_platform=google").await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
}

// =============================================================================
// FIND-NEARBY
// =============================================================================

#[tokio::test]
async fn test_find_nearby_returns_closest() {
    let app = TestApp::builder().build();
    app.places.add(place_at("far", "Gray's Papaya", 60.0));
    app.places.add(place_at("near", "Joe's Pizza", 15.0));

    let res = app
        .post("/places/find-nearby", json!({ "lat": ORIGIN.0, "lon": ORIGIN.1 }))
        .await;

    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["nearby_place"]["id"], "near");
    assert_eq!(res.body["radius_meters"], 100.0);
}

#[tokio::test]
async fn test_find_nearby_nothing_in_range() {
    let app = TestApp::builder().build();
    app.places.add(place_at("far", "Gray's Papaya", 400.0));

    let res = app
        .post("/places/find-nearby", json!({ "lat": ORIGIN.0, "lon": ORIGIN.1 }))
        .await;

    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["success"], true);
    assert_eq!(res.body["nearby_place"], Value::Null);
}

#[tokio::test]
async fn test_find_nearby_clamps_radius() {
    let app = TestApp::builder().build();

    let res = app
        .post(
            "/places/find-nearby",
            json!({ "lat": ORIGIN.0, "lon": ORIGIN.1, "radius_meters": 5000 }),
        )
        .await;
    assert_eq!(res.body["radius_meters"], 500.0);

    app.post(
        "/places/find-nearby",
        json!({ "lat": ORIGIN.0, "lon": ORIGIN.1, "radius_m": 1 }),
    )
    .await;
    assert_eq!(app.candidates.nearby_radii(), vec![500.0, 10.0]);
}

#[tokio::test]
async fn test_find_nearby_invalid_coordinates() {
    let app = TestApp::builder().build();

    let res = app
        .post("/places/find-nearby", json!({ "lat": 200.0, "lon": ORIGIN.1 }))
        .await;

    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body["error"]["details"][0]["field"], "lat");
    assert!(app.candidates.nearby_radii().is_empty());
}

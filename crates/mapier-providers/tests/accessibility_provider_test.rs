//! Accessibility provider against a mock HTTP server.

use mapier_core::{PlaceAttribute, PlaceProvider, SearchQuery, WheelchairAccess};
use mapier_providers::{AccessibilityConfig, AccessibilityProvider};
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn provider(server: &MockServer) -> AccessibilityProvider {
    AccessibilityProvider::new(AccessibilityConfig::new(server.uri(), "token-1")).unwrap()
}

fn feature(id: &str, name: &str, lon: f64, lat: f64, category: &str) -> serde_json::Value {
    json!({
        "type": "Feature",
        "geometry": { "type": "Point", "coordinates": [lon, lat] },
        "properties": {
            "_id": id,
            "name": name,
            "category": category,
            "accessibility": { "accessibleWith": { "wheelchair": true } }
        }
    })
}

#[tokio::test]
async fn test_search_passes_token_and_circle() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/place-infos.json"))
        .and(query_param("appToken", "token-1"))
        .and(query_param("accuracy", "1000"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "type": "FeatureCollection",
            "features": [feature("a1", "Medici on 57th", -87.5935, 41.7916, "restaurant")]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let places = provider(&server)
        .search(&SearchQuery::near(41.7916, -87.5935))
        .await
        .unwrap();

    assert_eq!(places.len(), 1);
    assert_eq!(places[0].id, "accessibility:a1");
    assert_eq!(places[0].provider, "accessibility");
    assert!(matches!(
        places[0].attributes.get("accessibility"),
        Some(PlaceAttribute::Accessibility {
            wheelchair: WheelchairAccess::Yes,
            ..
        })
    ));
}

#[tokio::test]
async fn test_search_filters_by_text_and_category() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/place-infos.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "features": [
                feature("a1", "Medici on 57th", -87.5935, 41.7916, "restaurant"),
                feature("a2", "Walgreens", -87.5940, 41.7920, "pharmacy"),
                feature("a3", "Medici Bakery", -87.5930, 41.7910, "bakery")
            ]
        })))
        .mount(&server)
        .await;

    let accessibility = provider(&server);

    let by_text = accessibility
        .search(&SearchQuery::near(41.7916, -87.5935).with_query("medici"))
        .await
        .unwrap();
    let mut ids: Vec<_> = by_text.iter().map(|p| p.id.as_str()).collect();
    ids.sort();
    assert_eq!(ids, vec!["accessibility:a1", "accessibility:a3"]);

    let mut by_category = SearchQuery::near(41.7916, -87.5935);
    by_category.category = Some("Pharmacy".into());
    let pharmacies = accessibility.search(&by_category).await.unwrap();
    assert_eq!(pharmacies.len(), 1);
    assert_eq!(pharmacies[0].name, "Walgreens");
}

#[tokio::test]
async fn test_get_by_id_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/place-infos/missing.json"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let accessibility = provider(&server);
    assert!(accessibility
        .get_by_id("accessibility:missing")
        .await
        .unwrap()
        .is_none());
    assert!(accessibility.get_by_id("google:abc").await.unwrap().is_none());
}

#[tokio::test]
async fn test_health_check() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/place-infos.json"))
        .and(query_param("limit", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "features": [] })))
        .mount(&server)
        .await;

    assert!(provider(&server).health_check().await.unwrap());
}

//! Provider client tests: pagination, auth classification, decoding.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use gbp_sync::models::gmb_account;
use gbp_sync::provider::{GbpClient, ProviderApi, ProviderError, StaticTokenResolver, TokenResolver};

fn test_account() -> gmb_account::Model {
    let now = chrono::Utc::now().fixed_offset();
    gmb_account::Model {
        id: Uuid::new_v4(),
        user_id: Uuid::new_v4(),
        google_account_id: "123".to_string(),
        display_name: None,
        created_at: now,
        updated_at: now,
    }
}

fn client(base: &str) -> GbpClient {
    GbpClient::new(
        base,
        Duration::from_secs(5),
        Arc::new(StaticTokenResolver::new(Some("test-token".to_string()))),
    )
}

#[tokio::test]
async fn test_locations_pagination_follows_page_tokens() {
    let server = MockServer::start().await;

    // First page carries a nextPageToken; second page ends the listing.
    Mock::given(method("GET"))
        .and(path("/accounts/123/locations"))
        .and(query_param("pageToken", "page-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "locations": [
                { "name": "accounts/123/locations/loc2", "title": "Second" }
            ]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/accounts/123/locations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "locations": [
                { "name": "accounts/123/locations/loc1", "title": "First" }
            ],
            "nextPageToken": "page-2"
        })))
        .mount(&server)
        .await;

    let locations = client(&server.uri())
        .fetch_locations(&test_account())
        .await
        .unwrap();

    assert_eq!(locations.len(), 2);
    assert_eq!(locations[0].title.as_deref(), Some("First"));
    assert_eq!(locations[1].title.as_deref(), Some("Second"));
}

#[tokio::test]
async fn test_bearer_token_is_sent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/accounts/123/locations"))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "locations": [] })))
        .expect(1)
        .mount(&server)
        .await;

    client(&server.uri())
        .fetch_locations(&test_account())
        .await
        .unwrap();
}

#[tokio::test]
async fn test_401_maps_to_auth_expired() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/accounts/123/locations"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let err = client(&server.uri())
        .fetch_locations(&test_account())
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::AuthExpired { status: 401 }));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_403_maps_to_auth_expired() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/accounts/123/locations"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let err = client(&server.uri())
        .fetch_locations(&test_account())
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::AuthExpired { status: 403 }));
}

#[tokio::test]
async fn test_5xx_maps_to_unavailable_and_is_retryable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/accounts/123/locations"))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .mount(&server)
        .await;

    let err = client(&server.uri())
        .fetch_locations(&test_account())
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::Unavailable { .. }));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_invalid_json_maps_to_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/accounts/123/locations"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let err = client(&server.uri())
        .fetch_locations(&test_account())
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::Malformed { .. }));
}

#[tokio::test]
async fn test_reviews_path_uses_location_resource() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/accounts/123/locations/loc1/reviews"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "reviews": [{
                "reviewId": "rev1",
                "starRating": "STAR_THREE",
                "createTime": "2025-05-01T12:00:00Z"
            }]
        })))
        .mount(&server)
        .await;

    let reviews = client(&server.uri())
        .fetch_reviews(&test_account(), "accounts/123/locations/loc1")
        .await
        .unwrap();
    assert_eq!(reviews.len(), 1);
    assert_eq!(reviews[0].star_rating.as_deref(), Some("STAR_THREE"));
}

#[tokio::test]
async fn test_missing_token_fails_before_request() {
    let server = MockServer::start().await;
    let client = GbpClient::new(
        &server.uri(),
        Duration::from_secs(5),
        Arc::new(StaticTokenResolver::new(None)),
    );

    let err = client.fetch_locations(&test_account()).await.unwrap_err();
    assert!(matches!(err, ProviderError::AuthExpired { status: 401 }));
    // No request reached the server.
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_static_resolver_returns_configured_token() {
    let resolver = StaticTokenResolver::new(Some("abc".to_string()));
    let token = resolver.access_token(&test_account()).await.unwrap();
    assert_eq!(token, "abc");
}

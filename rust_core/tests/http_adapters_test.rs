//! HTTP Adapter Tests
//!
//! Runs the FRED and Buttondown clients against a local mock server and checks
//! the requests they send and how they read the responses.

use chrono::{DateTime, TimeZone, Utc};
use httpmock::{
    Method::{GET, PATCH, POST},
    MockServer,
};
use serde_json::json;
use settlement_rust_core::clients::{ButtondownClient, FredClient};
use settlement_rust_core::models::SettlementRecord;
use settlement_rust_core::{Disposition, RateQuoteCache, SubscriptionError, SubscriptionReconciler};
use std::sync::Arc;
use std::time::Duration;

const KEY: &str = "test-key";

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 20, 15, 0, 0).unwrap()
}

fn reconciler(server: &MockServer) -> SubscriptionReconciler {
    let client = ButtondownClient::new(Some(KEY.to_string()), Duration::from_secs(5))
        .unwrap()
        .with_base_url(&server.base_url());
    SubscriptionReconciler::new(Arc::new(client))
}

fn record_value(name: &str, deadline: Option<&str>) -> String {
    SettlementRecord::new(name, deadline, t0()).to_metadata_value()
}

// ============================================================================
// FRED
// ============================================================================

#[tokio::test]
async fn test_fred_request_and_cached_quote() {
    let server = MockServer::start_async().await;
    let observations = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/series/observations")
                .query_param("series_id", "MORTGAGE30US")
                .query_param("api_key", KEY)
                .query_param("file_type", "json")
                .query_param("sort_order", "desc")
                .query_param("limit", "14");
            then.status(200).json_body(json!({
                "observations": [
                    {"date": "2024-05-16", "value": "."},
                    {"date": "2024-05-09", "value": "7.22"}
                ]
            }));
        })
        .await;

    let fred = FredClient::new(Some(KEY.to_string()), Duration::from_secs(5))
        .unwrap()
        .with_base_url(&server.base_url());
    let cache = RateQuoteCache::new(Arc::new(fred));

    let quote = cache.get_quote_at(t0()).await;
    assert_eq!(quote.rate_percent, 7.7);
    assert_eq!(quote.raw_percent, Some(7.22));
    assert_eq!(quote.observation_date.as_deref(), Some("2024-05-09"));
    assert_eq!(quote.source, "MORTGAGE30US");

    cache.get_quote_at(t0() + chrono::Duration::minutes(10)).await;
    observations.assert_async().await;
}

#[tokio::test]
async fn test_fred_server_error_is_fallback() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/series/observations");
            then.status(500).body("Internal Server Error");
        })
        .await;

    let fred = FredClient::new(Some(KEY.to_string()), Duration::from_secs(5))
        .unwrap()
        .with_base_url(&server.base_url());
    let quote = RateQuoteCache::new(Arc::new(fred)).get_quote().await;
    assert!(quote.is_fallback());
}

// ============================================================================
// Buttondown
// ============================================================================

#[tokio::test]
async fn test_create_sends_token_and_settlement_body() {
    let server = MockServer::start_async().await;
    let create = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/subscribers")
                .header("Authorization", "Token test-key")
                .json_body(json!({
                    "email": "user@x.com",
                    "tags": ["tagA"],
                    "metadata": {"settlement_tagA": record_value("Settlement A", None)}
                }));
            then.status(201).json_body(json!({"id": "sub_1", "email": "user@x.com"}));
        })
        .await;

    let disposition = reconciler(&server)
        .reconcile_at("user@x.com", "tagA", "Settlement A", None, t0())
        .await
        .unwrap();

    assert_eq!(disposition, Disposition::Created);
    create.assert_async().await;
}

#[tokio::test]
async fn test_already_subscribed_searches_and_patches_by_id() {
    let server = MockServer::start_async().await;
    let create = server
        .mock_async(|when, then| {
            when.method(POST).path("/subscribers");
            then.status(400)
                .json_body(json!(["user@x.com is already subscribed."]));
        })
        .await;
    let search = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/subscribers")
                .query_param("email", "user@x.com")
                .header("Authorization", "Token test-key");
            then.status(200).json_body(json!({
                "count": 1,
                "results": [{
                    "id": "sub_42",
                    "email": "user@x.com",
                    "tags": ["vip", "tagA"],
                    "metadata": {"referrer": "newsletter", "settlement_tagA": "kept"}
                }]
            }));
        })
        .await;
    let patch = server
        .mock_async(|when, then| {
            when.method(PATCH)
                .path("/subscribers/sub_42")
                .header("Authorization", "Token test-key")
                .json_body(json!({
                    "tags": ["vip", "tagA", "tagB"],
                    "metadata": {
                        "referrer": "newsletter",
                        "settlement_tagA": "kept",
                        "settlement_tagB": record_value("Settlement B", Some("2025-01-31"))
                    }
                }));
            then.status(200).json_body(json!({"id": "sub_42"}));
        })
        .await;

    let disposition = reconciler(&server)
        .reconcile_at("user@x.com", "tagB", "Settlement B", Some("2025-01-31"), t0())
        .await
        .unwrap();

    assert_eq!(disposition, Disposition::Updated);
    create.assert_async().await;
    search.assert_async().await;
    patch.assert_async().await;
}

#[tokio::test]
async fn test_search_hit_for_other_email_is_not_found() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/subscribers");
            then.status(400).body("This email is already subscribed.");
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/subscribers");
            then.status(200).json_body(json!({
                "results": [{"id": "sub_other", "email": "someone.else@x.com", "tags": []}]
            }));
        })
        .await;
    let patch = server
        .mock_async(|when, then| {
            when.method(PATCH);
            then.status(200);
        })
        .await;

    let err = reconciler(&server)
        .reconcile_at("user@x.com", "tagA", "Settlement A", None, t0())
        .await
        .unwrap_err();

    assert!(matches!(err, SubscriptionError::NotFound(_)));
    assert_eq!(patch.hits_async().await, 0);
}

#[tokio::test]
async fn test_other_create_failure_is_upstream() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/subscribers");
            then.status(401).body("Invalid token.");
        })
        .await;
    let search = server
        .mock_async(|when, then| {
            when.method(GET).path("/subscribers");
            then.status(200).json_body(json!({"results": []}));
        })
        .await;

    let err = reconciler(&server)
        .reconcile_at("user@x.com", "tagA", "Settlement A", None, t0())
        .await
        .unwrap_err();

    match err {
        SubscriptionError::Upstream(msg) => {
            assert!(msg.contains("401"));
            assert!(msg.contains("Invalid token."));
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(search.hits_async().await, 0);
}

#[tokio::test]
async fn test_patch_failure_is_upstream() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/subscribers");
            then.status(400).body("already subscribed");
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/subscribers");
            then.status(200).json_body(json!({
                "results": [{"id": "sub_7", "email": "user@x.com", "tags": null, "metadata": null}]
            }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(PATCH).path("/subscribers/sub_7");
            then.status(503).body("maintenance");
        })
        .await;

    let err = reconciler(&server)
        .reconcile_at("user@x.com", "tagA", "Settlement A", None, t0())
        .await
        .unwrap_err();

    match err {
        SubscriptionError::Upstream(msg) => assert!(msg.contains("503")),
        other => panic!("unexpected error: {:?}", other),
    }
}

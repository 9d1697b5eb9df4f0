//! Integration tests for rate limiting middleware.
//!
//! These tests verify the HTTP-level behavior of rate limiting,
//! including 429 responses and proper integration with the middleware stack.
//!
//! This test requires the `sqlite` feature flag.

#![cfg(feature = "sqlite")]

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use rust_decimal_macros::dec;
use settlements_hex::{
    SettlementService,
    inbound::HttpServer,
    outbound::{
        NotificationsHttpFacade, ProfilesHttpFacade, ServiceRequestsHttpFacade, StripeProvider,
        WorkOrdersHttpFacade,
    },
};
use settlements_repo::SqliteRepo;
use tower::ServiceExt;

/// Helper to create a test server with a very low rate limit. The outbound
/// adapters point at placeholder endpoints; the routes exercised below only
/// touch the repository.
async fn create_test_server(requests_per_minute: u32) -> HttpServer<SqliteRepo> {
    // Use in-memory SQLite for tests
    let repo = SqliteRepo::new("sqlite::memory:").await.unwrap();
    let service = SettlementService::new(
        repo,
        Arc::new(StripeProvider::new("sk_test_placeholder")),
        Arc::new(ProfilesHttpFacade::new("http://localhost:5001")),
        Arc::new(WorkOrdersHttpFacade::new("http://localhost:5002")),
        Arc::new(ServiceRequestsHttpFacade::new("http://localhost:5003")),
        Arc::new(NotificationsHttpFacade::new("http://localhost:5004")),
        dec!(15.0),
    );
    HttpServer::with_rate_limit(service, requests_per_minute)
}

/// Helper to make a health check request.
fn health_request() -> Request<Body> {
    Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap()
}

/// Helper to make a plan catalog request as a given caller.
fn plans_request(caller: &str) -> Request<Body> {
    Request::builder()
        .uri("/api/v1/plans?userType=owner")
        .header("X-Forwarded-User", caller)
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_rate_limiting_returns_429_when_exceeded() {
    // Create server with only 3 requests allowed per minute
    let server = create_test_server(3).await;
    let app = server.router();

    // Make 3 requests (uses up the quota for this caller)
    for i in 1..=3 {
        let response = app.clone().oneshot(plans_request("owner-7")).await.unwrap();
        assert_ne!(
            response.status(),
            StatusCode::TOO_MANY_REQUESTS,
            "Request {} should not be rate limited (quota not yet exceeded)",
            i
        );
    }

    // 4th request should be rate limited
    let response = app.clone().oneshot(plans_request("owner-7")).await.unwrap();

    assert_eq!(
        response.status(),
        StatusCode::TOO_MANY_REQUESTS,
        "Request should be rate limited after exceeding quota"
    );

    // Verify the response body contains the expected error
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();

    assert!(
        json["error"]
            .as_str()
            .unwrap()
            .contains("Rate limit exceeded")
    );
    assert_eq!(json["retry_after_seconds"], 60);
}

#[tokio::test]
async fn test_rate_limiting_health_endpoint_bypassed() {
    // Create server with only 1 request allowed per minute
    let server = create_test_server(1).await;
    let app = server.router();

    // Make many health requests - all should succeed (not rate limited)
    // Health endpoint bypasses rate limiting entirely
    for _ in 0..10 {
        let response = app.clone().oneshot(health_request()).await.unwrap();

        assert_eq!(
            response.status(),
            StatusCode::OK,
            "Health endpoint should not be rate limited"
        );
    }
}

#[tokio::test]
async fn test_rate_limiting_per_caller_isolation() {
    // One request each per caller; quotas must not bleed across callers.
    let server = create_test_server(1).await;
    let app = server.router();

    let response = app.clone().oneshot(plans_request("owner-7")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // A different caller has its own quota.
    let response = app.clone().oneshot(plans_request("owner-8")).await.unwrap();
    assert_ne!(
        response.status(),
        StatusCode::TOO_MANY_REQUESTS,
        "Each caller should have its own quota"
    );

    // The first caller is now over quota.
    let response = app.clone().oneshot(plans_request("owner-7")).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_rate_limiting_response_format() {
    let server = create_test_server(1).await;
    let app = server.router();

    // Use up the 1-request quota
    let _ = app.clone().oneshot(plans_request("owner-9")).await;

    // Get rate limited response
    let response = app.clone().oneshot(plans_request("owner-9")).await.unwrap();

    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

    // Verify headers
    let content_type = response.headers().get("content-type").unwrap();
    assert!(content_type.to_str().unwrap().contains("application/json"));

    // Verify body structure
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();

    assert!(
        json.get("error").is_some(),
        "Response should have 'error' field"
    );
    assert!(
        json.get("retry_after_seconds").is_some(),
        "Response should have 'retry_after_seconds' field"
    );
}

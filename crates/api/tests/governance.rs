//! Integration tests for the governance middleware stack: correlation
//! propagation, authentication rejection, health, and metrics.

mod common;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use common::{body_json, get};
use tower::ServiceExt;

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_check_returns_ok_with_json() {
    let app = common::build_test_app();
    let response = get(app, "/health").await;

    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
    // No database behind the test pool.
    assert_eq!(json["db_healthy"], false);
}

#[tokio::test]
async fn unknown_route_returns_404() {
    let app = common::build_test_app();
    let response = get(app, "/this-route-does-not-exist").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Correlation IDs
// ---------------------------------------------------------------------------

#[tokio::test]
async fn every_response_carries_a_correlation_header() {
    let app = common::build_test_app();
    let response = get(app, "/health").await;

    let header = response
        .headers()
        .get("x-correlation-id")
        .expect("response must carry x-correlation-id");
    assert!(!header.to_str().unwrap().is_empty());
}

#[tokio::test]
async fn well_formed_inbound_correlation_id_is_echoed() {
    let app = common::build_test_app();
    let request = Request::builder()
        .uri("/health")
        .header("x-correlation-id", "client-trace-0042")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();

    assert_eq!(
        response.headers().get("x-correlation-id").unwrap(),
        "client-trace-0042"
    );

    // The same ID lands inside the 2xx JSON body.
    let json = body_json(response).await;
    assert_eq!(json["correlationId"], "client-trace-0042");
}

#[tokio::test]
async fn malformed_inbound_correlation_id_is_replaced() {
    let app = common::build_test_app();
    let request = Request::builder()
        .uri("/health")
        .header("x-correlation-id", "bad id !!")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();

    let header = response
        .headers()
        .get("x-correlation-id")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert_ne!(header, "bad id !!");
    // Generated IDs are 128-bit hex.
    assert_eq!(header.len(), 32);
    assert!(header.chars().all(|c| c.is_ascii_hexdigit()));
}

#[tokio::test]
async fn success_json_bodies_gain_correlation_id_field() {
    let app = common::build_test_app();
    let response = get(app, "/health").await;

    let header = response
        .headers()
        .get("x-correlation-id")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();

    let json = body_json(response).await;
    assert_eq!(json["correlationId"], header.as_str());
}

#[tokio::test]
async fn error_responses_keep_correlation_header_but_not_body_field() {
    let app = common::build_test_app();
    let response = get(app, "/api/v1/admin/api-keys").await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(response.headers().get("x-correlation-id").is_some());

    let json = body_json(response).await;
    assert!(json.get("correlationId").is_none());
}

// ---------------------------------------------------------------------------
// Authentication
// ---------------------------------------------------------------------------

#[tokio::test]
async fn admin_route_without_key_returns_401_problem() {
    let app = common::build_test_app();
    let response = get(app, "/api/v1/admin/api-keys").await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let json = body_json(response).await;
    assert_eq!(json["code"], "UNAUTHORIZED");
    assert!(json["error"].is_string());
}

#[tokio::test]
async fn chain_verify_without_key_returns_401() {
    let app = common::build_test_app();
    let response = get(app, "/api/v1/admin/audit-chain/verify").await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

#[tokio::test]
async fn metrics_endpoint_renders_prometheus_text() {
    let app = common::build_test_app();

    // Generate at least one recorded request first.
    let _ = get(app.clone(), "/health").await;

    let response = get(app, "/metrics").await;
    assert_eq!(response.status(), StatusCode::OK);

    let content_type = response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(content_type.starts_with("text/plain"));
}

// ---------------------------------------------------------------------------
// CORS
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cors_preflight_returns_correct_headers() {
    let app = common::build_test_app();

    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/health")
        .header("Origin", "http://localhost:5173")
        .header("Access-Control-Request-Method", "GET")
        .header("Access-Control-Request-Headers", "content-type")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let allow_origin = response
        .headers()
        .get("access-control-allow-origin")
        .expect("Missing Access-Control-Allow-Origin header")
        .to_str()
        .unwrap();
    assert_eq!(allow_origin, "http://localhost:5173");
}

//! Authentication integration tests.
//!
//! Tests verify:
//! - Image URLs handed out by the service carry a valid signature
//! - Expired, tampered and missing signatures are rejected
//! - Rendering and service endpoints stay public

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::http::StatusCode;
use serde_json::json;

use formula_imager::SignedUrlAuth;

use super::test_utils::{body_json, get, image_url, post_json, TestHarness};

const TEST_SECRET: &str = "test-secret-key-for-hmac-signing";

async fn render_signed_url(harness: &TestHarness, text: &str) -> String {
    let router = harness.signed_router(TEST_SECRET);
    let response = post_json(
        &router,
        "/formulas",
        json!({ "text": text, "inline": true, "scope": "page" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    image_url(&body_json(response).await)
}

// =============================================================================
// Valid Signatures
// =============================================================================

#[tokio::test]
async fn test_service_urls_are_signed() {
    let harness = TestHarness::signed(TEST_SECRET);
    let url = render_signed_url(&harness, "x^2").await;

    assert!(url.starts_with("/tmp/formula/page/"));
    assert!(url.contains("exp="));
    assert!(url.contains("sig="));

    let response = get(&harness.signed_router(TEST_SECRET), &url).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get("content-type").unwrap(), "image/png");
}

#[tokio::test]
async fn test_manually_signed_path_succeeds() {
    let harness = TestHarness::signed(TEST_SECRET);
    let url = render_signed_url(&harness, "y").await;
    let path = url.split('?').next().unwrap();

    let auth = SignedUrlAuth::new(TEST_SECRET);
    let (signature, expiry) = auth.sign(path, Duration::from_secs(60));

    let response = get(
        &harness.signed_router(TEST_SECRET),
        &format!("{path}?sig={signature}&exp={expiry}"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
}

// =============================================================================
// Rejected Signatures
// =============================================================================

#[tokio::test]
async fn test_unsigned_image_request_rejected() {
    let harness = TestHarness::signed(TEST_SECRET);
    let url = render_signed_url(&harness, "z").await;
    let path = url.split('?').next().unwrap();

    let response = get(&harness.signed_router(TEST_SECRET), path).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error"], "missing_signature");
}

#[tokio::test]
async fn test_expired_signature_rejected() {
    let harness = TestHarness::signed(TEST_SECRET);
    let url = render_signed_url(&harness, "w").await;
    let path = url.split('?').next().unwrap();

    let expired_time = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs()
        - 100;
    let signature = SignedUrlAuth::new(TEST_SECRET).sign_with_expiry(path, expired_time);

    let response = get(
        &harness.signed_router(TEST_SECRET),
        &format!("{path}?sig={signature}&exp={expired_time}"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error"], "signature_expired");
}

#[tokio::test]
async fn test_signature_for_other_image_rejected() {
    let harness = TestHarness::signed(TEST_SECRET);
    let first = render_signed_url(&harness, "a").await;
    let second = render_signed_url(&harness, "b").await;

    // Path of the second image with the query of the first
    let path = second.split('?').next().unwrap();
    let query = first.split('?').nth(1).unwrap();

    let response = get(
        &harness.signed_router(TEST_SECRET),
        &format!("{path}?{query}"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error"], "invalid_signature");
}

#[tokio::test]
async fn test_wrong_secret_rejected() {
    let harness = TestHarness::signed("another-secret");
    let url = render_signed_url(&harness, "c").await;

    let response = get(&harness.signed_router(TEST_SECRET), &url).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_malformed_signature_rejected() {
    let harness = TestHarness::signed(TEST_SECRET);
    let url = render_signed_url(&harness, "d").await;
    let path = url.split('?').next().unwrap();

    let response = get(
        &harness.signed_router(TEST_SECRET),
        &format!("{path}?sig=not-hex&exp=9999999999"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "invalid_signature_format");
}

// =============================================================================
// Public Endpoints
// =============================================================================

#[tokio::test]
async fn test_public_endpoints_need_no_signature() {
    let harness = TestHarness::signed(TEST_SECRET);
    let router = harness.signed_router(TEST_SECRET);

    assert_eq!(get(&router, "/health").await.status(), StatusCode::OK);
    assert_eq!(get(&router, "/renderers").await.status(), StatusCode::OK);
}

//! HTTP API integration tests.
//!
//! Tests verify:
//! - POST /formulas returns display trees whose image URLs can be fetched
//! - Image responses carry the stored MIME type and cache headers
//! - Error responses for blank text, invalid formulas and bad scopes
//! - Missing, half-written and corrupted entries are not served as images

use axum::http::StatusCode;
use bytes::Bytes;
use serde_json::json;

use formula_imager::store::{image_reference, image_type_reference, ResourceStore};
use formula_imager::RenderScope;

use super::test_utils::{
    body_bytes, body_json, get, image_url, post_json, TestHarness, REJECTED_BY_ALL,
    REJECTED_BY_PRIMARY,
};

// =============================================================================
// Rendering
// =============================================================================

#[tokio::test]
async fn test_inline_formula_roundtrip() {
    let harness = TestHarness::new();
    let router = harness.router();

    let response = post_json(
        &router,
        "/formulas",
        json!({ "text": "x^2", "inline": true, "scope": "page" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let tree = body_json(response).await;
    assert_eq!(tree["type"], "image");
    assert_eq!(tree["alt"], "x^2");
    assert_eq!(tree["class"], "formula-inline");

    let url = image_url(&tree);
    assert!(url.starts_with("/tmp/formula/page/"), "unexpected url {url}");

    let response = get(&router, &url).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get("content-type").unwrap(), "image/png");
    assert_eq!(
        response.headers().get("cache-control").unwrap(),
        "public, max-age=3600"
    );
    assert_eq!(
        response.headers().get("x-formula-image-type").unwrap(),
        "DEFAULT"
    );
    assert_eq!(body_bytes(response).await, Bytes::from("image:x^2"));
}

#[tokio::test]
async fn test_block_formula_is_wrapped_in_paragraph() {
    let harness = TestHarness::new();
    let router = harness.router();

    let response = post_json(
        &router,
        "/formulas",
        json!({ "text": "\\sum_i i", "inline": false, "scope": "page", "image_type": "SVG" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let tree = body_json(response).await;
    assert_eq!(tree["type"], "paragraph");
    assert_eq!(tree["children"].as_array().unwrap().len(), 1);
    assert_eq!(tree["children"][0]["class"], "formula-block");

    let response = get(&router, &image_url(&tree)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "image/svg+xml"
    );
    assert_eq!(response.headers().get("x-formula-image-type").unwrap(), "SVG");
}

#[tokio::test]
async fn test_scope_is_percent_encoded_in_url() {
    let harness = TestHarness::new();
    let router = harness.router();

    let tree = body_json(
        post_json(
            &router,
            "/formulas",
            json!({ "text": "a+b", "inline": true, "scope": "wiki:Space.Page" }),
        )
        .await,
    )
    .await;

    let url = image_url(&tree);
    assert!(url.starts_with("/tmp/formula/wiki%3ASpace.Page/"), "unexpected url {url}");

    let response = get(&router, &url).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_fallback_renderer_serves_image() {
    let harness = TestHarness::new();
    let router = harness.router();

    let formula = format!("{REJECTED_BY_PRIMARY}{{x}}");
    let response = post_json(
        &router,
        "/formulas",
        json!({ "text": formula, "inline": true, "scope": "page" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = get(&router, &image_url(&body_json(response).await)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(harness.primary.calls(), 1);
    assert_eq!(harness.safe.calls(), 1);
}

// =============================================================================
// Error Responses
// =============================================================================

#[tokio::test]
async fn test_blank_text_is_content_missing() {
    let harness = TestHarness::new();
    let router = harness.router();

    for body in [
        json!({ "text": "   ", "inline": true, "scope": "page" }),
        json!({ "inline": true, "scope": "page" }),
    ] {
        let response = post_json(&router, "/formulas", body).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let error = body_json(response).await;
        assert_eq!(error["error"], "content_missing");
        assert_eq!(error["message"], "The mandatory formula text is missing.");
    }

    assert_eq!(harness.primary.calls(), 0);
    assert_eq!(harness.safe.calls(), 0);
}

#[tokio::test]
async fn test_invalid_formula_is_unprocessable() {
    let harness = TestHarness::new();
    let router = harness.router();

    let response = post_json(
        &router,
        "/formulas",
        json!({ "text": REJECTED_BY_ALL, "inline": true, "scope": "page" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let error = body_json(response).await;
    assert_eq!(error["error"], "invalid_formula");
    assert_eq!(error["status"], 422);
}

#[tokio::test]
async fn test_text_fallback_returns_formula_text() {
    let harness = TestHarness::new();
    let router = harness.router();

    let response = post_json(
        &router,
        "/formulas",
        json!({ "text": REJECTED_BY_ALL, "inline": false, "scope": "page", "text_fallback": true }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let tree = body_json(response).await;
    assert_eq!(tree, json!({ "type": "word", "text": REJECTED_BY_ALL }));
}

#[tokio::test]
async fn test_unaddressable_scope_is_rejected() {
    let harness = TestHarness::new();
    let router = harness.router();

    for scope in ["", ".", ".."] {
        let response = post_json(
            &router,
            "/formulas",
            json!({ "text": "x", "inline": true, "scope": scope }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "invalid_scope");
    }

    assert_eq!(harness.primary.calls(), 0);
}

#[tokio::test]
async fn test_missing_scope_is_rejected() {
    let harness = TestHarness::new();
    let router = harness.router();

    let response = post_json(&router, "/formulas", json!({ "text": "x" })).await;
    assert!(response.status().is_client_error());
    assert_eq!(harness.primary.calls(), 0);
}

// =============================================================================
// Image Resources
// =============================================================================

#[tokio::test]
async fn test_unknown_image_is_not_found() {
    let harness = TestHarness::new();
    let router = harness.router();

    let response = get(&router, "/tmp/formula/page/0123abcd").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["error"], "not_found");

    let response = get(&router, "/tmp/other/page/0123abcd").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_type_marker_is_not_served_as_image() {
    let harness = TestHarness::new();
    let router = harness.router();

    let tree = body_json(
        post_json(
            &router,
            "/formulas",
            json!({ "text": "y", "inline": true, "scope": "page" }),
        )
        .await,
    )
    .await;

    let marker_url = format!("{}Type", image_url(&tree));
    let response = get(&router, &marker_url).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_half_written_entry_is_not_found() {
    let harness = TestHarness::new();
    let router = harness.router();
    let scope = RenderScope::new("page");

    harness
        .storage
        .store()
        .write(&image_reference("orphan", &scope), Bytes::from_static(b"png"))
        .await
        .unwrap();

    let response = get(&router, "/tmp/formula/page/orphan").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    harness
        .storage
        .store()
        .write(&image_type_reference("lonely", &scope), Bytes::from_static(b"PNG"))
        .await
        .unwrap();

    let response = get(&router, "/tmp/formula/page/lonely").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_corrupted_marker_is_server_error() {
    let harness = TestHarness::new();
    let router = harness.router();
    let scope = RenderScope::new("page");
    let store = harness.storage.store();

    store
        .write(&image_reference("broken", &scope), Bytes::from_static(b"png"))
        .await
        .unwrap();
    store
        .write(&image_type_reference("broken", &scope), Bytes::from_static(b"BMP"))
        .await
        .unwrap();

    let response = get(&router, "/tmp/formula/page/broken").await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_json(response).await["error"], "corrupted_cache_entry");
}

// =============================================================================
// Service Endpoints
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let harness = TestHarness::new();

    let response = get(&harness.router(), "/health").await;
    assert_eq!(response.status(), StatusCode::OK);

    let health = body_json(response).await;
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_renderers_endpoint() {
    let harness = TestHarness::new();

    let response = get(&harness.router(), "/renderers").await;
    assert_eq!(response.status(), StatusCode::OK);

    let renderers = body_json(response).await;
    assert_eq!(renderers["renderers"], json!(["primary", "safe"]));
    assert_eq!(renderers["default_renderer"], "primary");
    assert_eq!(renderers["safe_renderer"], "safe");
}

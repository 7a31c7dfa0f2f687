//! Render orchestration integration tests.
//!
//! Tests verify:
//! - The primary renderer is used when it succeeds
//! - Any primary failure falls back to the safe renderer exactly once
//! - A failing safe renderer is never retried
//! - Repeated and concurrent requests render each image once

use std::time::Duration;

use formula_imager::render::derive_image_id;
use formula_imager::{DisplayBlock, FontSize, FormulaError, ImageType, RenderScope};

use super::test_utils::{
    TestHarness, CRASHES_PRIMARY, PRIMARY, REJECTED_BY_ALL, REJECTED_BY_PRIMARY, SAFE,
};

fn url_of(block: &DisplayBlock) -> String {
    block.image().unwrap().url.clone()
}

// =============================================================================
// Fallback
// =============================================================================

#[tokio::test]
async fn test_primary_renderer_success() {
    let harness = TestHarness::new();
    let scope = RenderScope::new("page");
    let request = harness.service.request("x^2", true);

    let block = harness.service.render(&request, &scope).await.unwrap();

    let expected_id = derive_image_id(PRIMARY, "x^2", &request.params());
    assert_eq!(url_of(&block), format!("/tmp/formula/page/{expected_id}"));
    assert_eq!(harness.primary.calls(), 1);
    assert_eq!(harness.safe.calls(), 0);
}

#[tokio::test]
async fn test_invalid_input_falls_back_to_safe_renderer() {
    let harness = TestHarness::new();
    let scope = RenderScope::new("page");
    let formula = format!("{REJECTED_BY_PRIMARY}{{y}}");
    let request = harness.service.request(formula.as_str(), true);

    let block = harness.service.render(&request, &scope).await.unwrap();

    let expected_id = derive_image_id(SAFE, &formula, &request.params());
    assert_eq!(url_of(&block), format!("/tmp/formula/page/{expected_id}"));
    assert_eq!(harness.primary.calls(), 1);
    assert_eq!(harness.safe.calls(), 1);
}

#[tokio::test]
async fn test_crash_falls_back_to_safe_renderer() {
    let harness = TestHarness::new();
    let request = harness.service.request(CRASHES_PRIMARY, false);

    let block = harness
        .service
        .render(&request, &RenderScope::new("page"))
        .await
        .unwrap();

    assert!(matches!(block, DisplayBlock::Paragraph { .. }));
    assert_eq!(harness.safe.calls(), 1);
}

#[tokio::test]
async fn test_unknown_renderer_hint_falls_back_to_safe_renderer() {
    let harness = TestHarness::new();
    let request = harness
        .service
        .request("z", true)
        .with_renderer("mathjax");

    let block = harness
        .service
        .render(&request, &RenderScope::new("page"))
        .await
        .unwrap();

    assert!(block.image().is_some());
    assert_eq!(harness.primary.calls(), 0);
    assert_eq!(harness.safe.calls(), 1);
}

#[tokio::test]
async fn test_both_renderers_failing_is_invalid_formula() {
    let harness = TestHarness::new();
    let request = harness.service.request(REJECTED_BY_ALL, true);
    let scope = RenderScope::new("page");

    let result = harness.service.render(&request, &scope).await;
    assert!(matches!(result, Err(FormulaError::InvalidFormula)));
    assert_eq!(harness.primary.calls(), 1);
    assert_eq!(harness.safe.calls(), 1);

    let block = harness.service.render_or_text(&request, &scope).await.unwrap();
    assert_eq!(
        block,
        DisplayBlock::Word {
            text: REJECTED_BY_ALL.to_string()
        }
    );
}

#[tokio::test]
async fn test_safe_renderer_hint_is_tried_once() {
    let harness = TestHarness::new();
    let request = harness
        .service
        .request(REJECTED_BY_ALL, true)
        .with_renderer(SAFE);

    let result = harness
        .service
        .render(&request, &RenderScope::new("page"))
        .await;

    assert!(matches!(result, Err(FormulaError::InvalidFormula)));
    assert_eq!(harness.primary.calls(), 0);
    assert_eq!(harness.safe.calls(), 1);
}

#[tokio::test]
async fn test_blank_text_renders_nothing() {
    let harness = TestHarness::new();
    let request = harness.service.request(" \n\t", true);

    let result = harness
        .service
        .render_or_text(&request, &RenderScope::new("page"))
        .await;

    assert!(matches!(result, Err(FormulaError::ContentMissing)));
    assert_eq!(harness.primary.calls(), 0);
    assert_eq!(harness.safe.calls(), 0);
}

// =============================================================================
// Caching
// =============================================================================

#[tokio::test]
async fn test_repeated_request_is_rendered_once() {
    let harness = TestHarness::new();
    let scope = RenderScope::new("page");
    let request = harness.service.request("\\alpha", true);

    let first = harness.service.render(&request, &scope).await.unwrap();
    let second = harness.service.render(&request, &scope).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(harness.primary.calls(), 1);
}

#[tokio::test]
async fn test_render_parameters_address_distinct_images() {
    let harness = TestHarness::new();
    let scope = RenderScope::new("page");

    let plain = harness.service.request("\\beta", true);
    let large = harness
        .service
        .request("\\beta", true)
        .with_font_size(FontSize::Large);
    let svg = harness
        .service
        .request("\\beta", true)
        .with_image_type(ImageType::Svg);
    let block = harness.service.request("\\beta", false);

    let mut urls = Vec::new();
    for request in [&plain, &large, &svg, &block] {
        let rendered = harness.service.render(request, &scope).await.unwrap();
        urls.push(url_of(&rendered));
    }
    urls.sort();
    urls.dedup();

    assert_eq!(urls.len(), 4);
    assert_eq!(harness.primary.calls(), 4);
}

#[tokio::test]
async fn test_scopes_do_not_share_images() {
    let harness = TestHarness::new();
    let request = harness.service.request("\\gamma", true);

    let a = harness
        .service
        .render(&request, &RenderScope::new("page-a"))
        .await
        .unwrap();
    let b = harness
        .service
        .render(&request, &RenderScope::new("page-b"))
        .await
        .unwrap();

    assert_ne!(url_of(&a), url_of(&b));
    assert_eq!(harness.primary.calls(), 2);
}

#[tokio::test]
async fn test_concurrent_identical_requests_render_once() {
    let harness = TestHarness::slow(Duration::from_millis(50));
    let scope = RenderScope::new("page");

    let mut handles = Vec::new();
    for _ in 0..16 {
        let service = harness.service.clone();
        let scope = scope.clone();
        handles.push(tokio::spawn(async move {
            let request = service.request("\\int_0^1 x\\,dx", false);
            service.render(&request, &scope).await
        }));
    }

    let mut urls = Vec::new();
    for handle in handles {
        urls.push(url_of(&handle.await.unwrap().unwrap()));
    }
    urls.dedup();

    assert_eq!(urls.len(), 1);
    assert_eq!(harness.primary.calls(), 1);
}

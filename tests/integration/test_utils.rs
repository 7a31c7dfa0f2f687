//! Test utilities for integration tests.
//!
//! This module provides scripted renderer backends that count their
//! invocations, and a harness wiring them into a formula service and router.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

use formula_imager::cache::{ImageStorage, TemporaryImageStorage};
use formula_imager::render::{CachingRenderer, ImageBackend};
use formula_imager::server::{create_dev_router, create_router, AppState, RouterConfig};
use formula_imager::store::{MemoryResourceStore, ResourceUrlSerializer};
use formula_imager::{
    FormulaConfig, FormulaService, ImageData, RenderError, RenderParams, RendererRegistry,
    SignedUrlAuth,
};

pub const PRIMARY: &str = "primary";
pub const SAFE: &str = "safe";

/// Formulas containing this marker are rejected by every scripted backend.
pub const REJECTED_BY_ALL: &str = "\\bad";

/// Formulas containing this marker are rejected by the primary backend only.
pub const REJECTED_BY_PRIMARY: &str = "\\unsupported";

/// Formulas containing this marker crash the primary backend.
pub const CRASHES_PRIMARY: &str = "\\crash";

// =============================================================================
// Scripted Backend
// =============================================================================

/// An image backend whose behavior depends on markers in the formula text.
///
/// Successful renders return `image:{formula}` tagged with the requested type.
#[derive(Clone)]
pub struct ScriptedBackend {
    name: String,
    rejects: Vec<&'static str>,
    crashes: Vec<&'static str>,
    delay: Option<Duration>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedBackend {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rejects: vec![REJECTED_BY_ALL],
            crashes: Vec::new(),
            delay: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn rejecting(mut self, marker: &'static str) -> Self {
        self.rejects.push(marker);
        self
    }

    pub fn crashing_on(mut self, marker: &'static str) -> Self {
        self.crashes.push(marker);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageBackend for ScriptedBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn render_image(
        &self,
        formula: &str,
        params: &RenderParams,
    ) -> Result<ImageData, RenderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if self.crashes.iter().any(|marker| formula.contains(marker)) {
            return Err(RenderError::Execution {
                renderer: self.name.clone(),
                message: "process exited with status 42".to_string(),
            });
        }
        if self.rejects.iter().any(|marker| formula.contains(marker)) {
            return Err(RenderError::InvalidInput {
                renderer: self.name.clone(),
                message: "Undefined control sequence.".to_string(),
            });
        }

        Ok(ImageData::new(format!("image:{formula}"), params.image_type))
    }
}

// =============================================================================
// Harness
// =============================================================================

pub type TestStorage = TemporaryImageStorage<MemoryResourceStore>;

/// A formula service backed by two scripted backends and in-memory storage.
pub struct TestHarness {
    pub storage: Arc<TestStorage>,
    pub primary: ScriptedBackend,
    pub safe: ScriptedBackend,
    pub service: FormulaService,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::build(
            ScriptedBackend::new(PRIMARY)
                .rejecting(REJECTED_BY_PRIMARY)
                .crashing_on(CRASHES_PRIMARY),
            ResourceUrlSerializer::default(),
        )
    }

    /// Harness whose image URLs are signed with `secret`.
    pub fn signed(secret: &str) -> Self {
        let urls = ResourceUrlSerializer::default()
            .with_signer(SignedUrlAuth::new(secret), Duration::from_secs(3600));
        Self::build(
            ScriptedBackend::new(PRIMARY).rejecting(REJECTED_BY_PRIMARY),
            urls,
        )
    }

    /// Harness whose primary backend takes `delay` per render.
    pub fn slow(delay: Duration) -> Self {
        Self::build(
            ScriptedBackend::new(PRIMARY).with_delay(delay),
            ResourceUrlSerializer::default(),
        )
    }

    fn build(primary: ScriptedBackend, urls: ResourceUrlSerializer) -> Self {
        let storage = Arc::new(TemporaryImageStorage::new(MemoryResourceStore::new()));
        let safe = ScriptedBackend::new(SAFE);

        let images: Arc<dyn ImageStorage> = storage.clone();
        let registry = RendererRegistry::new()
            .with_renderer(
                PRIMARY,
                Arc::new(CachingRenderer::new(primary.clone(), images.clone())),
            )
            .with_renderer(SAFE, Arc::new(CachingRenderer::new(safe.clone(), images)));

        let config = FormulaConfig {
            renderer: PRIMARY.to_string(),
            safe_renderer: SAFE.to_string(),
            ..FormulaConfig::default()
        };

        Self {
            storage,
            primary,
            safe,
            service: FormulaService::new(registry, config, urls),
        }
    }

    fn state(&self) -> AppState {
        AppState::new(self.service.clone(), self.storage.clone())
    }

    pub fn router(&self) -> Router {
        create_dev_router(self.state())
    }

    pub fn signed_router(&self, secret: &str) -> Router {
        create_router(
            self.state(),
            RouterConfig::new(secret).with_tracing(false),
        )
    }
}

// =============================================================================
// HTTP Helpers
// =============================================================================

pub async fn get(router: &Router, uri: &str) -> Response<Body> {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    router.clone().oneshot(request).await.unwrap()
}

pub async fn post_json(router: &Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    router.clone().oneshot(request).await.unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> bytes::Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

/// Extract the image URL of an inline or block display tree.
pub fn image_url(tree: &serde_json::Value) -> String {
    let image = match tree["type"].as_str() {
        Some("paragraph") => &tree["children"][0],
        _ => tree,
    };
    image["url"].as_str().unwrap().to_string()
}

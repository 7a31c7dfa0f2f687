//! Renderer contract and the caching renderer.
//!
//! A [`FormulaRenderer`] turns formula text into a cached image and hands back
//! the image identifier. Most renderers are an [`ImageBackend`] (which only
//! knows how to produce pixels) wrapped in a [`CachingRenderer`]:
//!
//! ```text
//! process(formula, params, scope)
//!   1. derive id = sha256(backend, formula, params)
//!   2. cache hit?  ── yes ──▶ return id
//!   3. render with backend (one render per id at a time)
//!   4. store image (failure is logged, not fatal)
//!   5. return id
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use super::types::{ImageData, RenderParams};
use crate::cache::ImageStorage;
use crate::error::RenderError;
use crate::store::RenderScope;

// =============================================================================
// Traits
// =============================================================================

/// A formula renderer as seen by the formula service.
#[async_trait]
pub trait FormulaRenderer: Send + Sync {
    /// Name of the renderer, part of every identifier it derives.
    fn name(&self) -> &str;

    /// Render `formula` (or reuse a cached rendering) and return the image id.
    ///
    /// # Errors
    ///
    /// - [`RenderError::InvalidInput`] if the formula is malformed for this renderer
    /// - [`RenderError::Execution`] for any other failure
    async fn process(
        &self,
        formula: &str,
        params: &RenderParams,
        scope: &RenderScope,
    ) -> Result<String, RenderError>;

    /// Fetch a previously rendered image.
    async fn get_image(
        &self,
        id: &str,
        scope: &RenderScope,
    ) -> Result<Option<ImageData>, RenderError>;
}

/// Produces image bytes for a formula. Implementations know nothing about caching.
#[async_trait]
pub trait ImageBackend: Send + Sync {
    fn name(&self) -> &str;

    async fn render_image(
        &self,
        formula: &str,
        params: &RenderParams,
    ) -> Result<ImageData, RenderError>;
}

// =============================================================================
// Identifier Derivation
// =============================================================================

/// Derive the cache identifier of a rendering.
///
/// SHA-256 over the length-prefixed fields `renderer`, `formula`, placement,
/// font size and image type, hex encoded. Equal inputs always give the same
/// id; changing any field gives a different one.
pub fn derive_image_id(renderer: &str, formula: &str, params: &RenderParams) -> String {
    let placement = if params.inline { "inline" } else { "block" };
    let fields = [
        renderer,
        formula,
        placement,
        params.font_size.as_str(),
        params.image_type.as_str(),
    ];

    let mut hasher = Sha256::new();
    for field in fields {
        hasher.update((field.len() as u64).to_be_bytes());
        hasher.update(field.as_bytes());
    }
    hex::encode(hasher.finalize())
}

// =============================================================================
// CachingRenderer
// =============================================================================

type InFlightKey = (RenderScope, String);
type InFlightRender = Arc<OnceCell<Result<(), RenderError>>>;
type InFlightMap = Mutex<HashMap<InFlightKey, InFlightRender>>;

fn lock_in_flight(map: &InFlightMap) -> MutexGuard<'_, HashMap<InFlightKey, InFlightRender>> {
    // Never held across an await; a poisoned map is still consistent
    map.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Registration of one caller in the in-flight map.
///
/// Dropping it (on completion or cancellation) releases the caller's handle
/// and removes the entry once no other caller shares it.
struct InFlightGuard<'a> {
    map: &'a InFlightMap,
    key: InFlightKey,
    cell: InFlightRender,
}

impl<'a> InFlightGuard<'a> {
    fn join(map: &'a InFlightMap, key: InFlightKey) -> Self {
        let cell = lock_in_flight(map).entry(key.clone()).or_default().clone();
        Self { map, key, cell }
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        let mut in_flight = lock_in_flight(self.map);
        let cell = std::mem::take(&mut self.cell);
        // Handles are cloned and released only under the lock, so the count is exact:
        // one for the map, one for this caller.
        let last = in_flight
            .get(&self.key)
            .is_some_and(|current| Arc::ptr_eq(current, &cell))
            && Arc::strong_count(&cell) == 2;
        drop(cell);
        if last {
            in_flight.remove(&self.key);
        }
    }
}

/// [`FormulaRenderer`] that caches the images produced by an [`ImageBackend`].
///
/// Concurrent requests for the same identifier share a single backend render.
pub struct CachingRenderer<B: ImageBackend> {
    backend: B,
    storage: Arc<dyn ImageStorage>,
    in_flight: InFlightMap,
}

impl<B: ImageBackend> CachingRenderer<B> {
    pub fn new(backend: B, storage: Arc<dyn ImageStorage>) -> Self {
        Self {
            backend,
            storage,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Get a reference to the wrapped backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Render and store `id`, sharing the work with concurrent callers.
    async fn render_shared(
        &self,
        id: &str,
        formula: &str,
        params: &RenderParams,
        scope: &RenderScope,
    ) -> Result<(), RenderError> {
        let guard = InFlightGuard::join(&self.in_flight, (scope.clone(), id.to_string()));
        let result = guard
            .cell
            .get_or_init(|| self.render_and_store(id, formula, params, scope))
            .await
            .clone();
        result
    }

    async fn render_and_store(
        &self,
        id: &str,
        formula: &str,
        params: &RenderParams,
        scope: &RenderScope,
    ) -> Result<(), RenderError> {
        // Another caller may have finished the same render meanwhile
        if self.storage.contains(id, scope).await? {
            return Ok(());
        }

        let image = self.backend.render_image(formula, params).await?;
        if image.is_empty() {
            return Err(RenderError::execution(
                self.backend.name(),
                "backend produced an empty image",
            ));
        }

        if let Err(e) = self.storage.put(id, scope, &image).await {
            warn!(
                renderer = self.backend.name(),
                image_id = id,
                scope = %scope,
                error = %e,
                "Failed to cache rendered formula image"
            );
        } else {
            debug!(
                renderer = self.backend.name(),
                image_id = id,
                bytes = image.len(),
                image_type = %image.image_type,
                "Cached rendered formula image"
            );
        }

        Ok(())
    }
}

#[async_trait]
impl<B: ImageBackend> FormulaRenderer for CachingRenderer<B> {
    fn name(&self) -> &str {
        self.backend.name()
    }

    async fn process(
        &self,
        formula: &str,
        params: &RenderParams,
        scope: &RenderScope,
    ) -> Result<String, RenderError> {
        let id = derive_image_id(self.backend.name(), formula, params);

        if self.storage.get(&id, scope).await?.is_some() {
            debug!(renderer = self.backend.name(), image_id = %id, "Formula image cache hit");
            return Ok(id);
        }

        self.render_shared(&id, formula, params, scope).await?;
        Ok(id)
    }

    async fn get_image(
        &self,
        id: &str,
        scope: &RenderScope,
    ) -> Result<Option<ImageData>, RenderError> {
        Ok(self.storage.get(id, scope).await?)
    }
}

// =============================================================================
// Tests
// =============================================================================

//! Render-with-fallback orchestration.
//!
//! ```text
//! blank text ──────────────────────────────────────────▶ ContentMissing
//! primary renderer ── ok ──────────────────────────────▶ image
//!        │ any failure (not registered, crash, invalid input)
//!        ▼
//! safe renderer ───── ok ──────────────────────────────▶ image
//!        │ any failure
//!        ▼
//!   InvalidFormula
//! ```
//!
//! Blocks receive their image wrapped in a paragraph; inline formulas get the
//! bare image.

use tracing::{debug, warn};

use super::display::{DisplayBlock, ImageElement};
use super::request::FormulaRequest;
use crate::config::FormulaConfig;
use crate::error::{FormulaError, RenderError};
use crate::render::{RenderParams, RendererRegistry};
use crate::store::{image_reference, RenderScope, ResourceUrlSerializer};

/// Renders formulas into display trees.
#[derive(Clone)]
pub struct FormulaService {
    registry: RendererRegistry,
    config: FormulaConfig,
    urls: ResourceUrlSerializer,
}

impl FormulaService {
    pub fn new(registry: RendererRegistry, config: FormulaConfig, urls: ResourceUrlSerializer) -> Self {
        Self {
            registry,
            config,
            urls,
        }
    }

    pub fn config(&self) -> &FormulaConfig {
        &self.config
    }

    pub fn registry(&self) -> &RendererRegistry {
        &self.registry
    }

    /// Start a request with this service's defaults.
    pub fn request(&self, text: impl Into<String>, inline: bool) -> FormulaRequest {
        FormulaRequest::new(text, inline, &self.config)
    }

    /// Render a formula, falling back to the safe renderer once.
    ///
    /// # Errors
    ///
    /// - [`FormulaError::ContentMissing`] if the text is blank; no renderer runs
    /// - [`FormulaError::InvalidFormula`] if neither renderer produced an image
    pub async fn render(
        &self,
        request: &FormulaRequest,
        scope: &RenderScope,
    ) -> Result<DisplayBlock, FormulaError> {
        if request.is_blank() {
            return Err(FormulaError::ContentMissing);
        }

        let params = request.params();
        let id = match self.process_with(request.renderer(), request.text(), &params, scope).await {
            Ok(id) => id,
            Err(err) if request.renderer() == self.config.safe_renderer => {
                debug!(
                    renderer = request.renderer(),
                    error = %err,
                    "Safe formula renderer failed"
                );
                return Err(FormulaError::InvalidFormula);
            }
            Err(err) => {
                debug!(
                    renderer = request.renderer(),
                    safe_renderer = %self.config.safe_renderer,
                    error = %err,
                    "Formula renderer failed, falling back to the safe renderer"
                );
                self.process_with(&self.config.safe_renderer, request.text(), &params, scope)
                    .await
                    .map_err(|err| {
                        debug!(
                            renderer = %self.config.safe_renderer,
                            error = %err,
                            "Safe formula renderer failed"
                        );
                        FormulaError::InvalidFormula
                    })?
            }
        };

        let url = self.urls.serialize(&image_reference(&id, scope)).map_err(|err| {
            warn!(
                image_id = %id,
                scope = %scope,
                error = %err,
                "Cannot build a URL for the rendered formula"
            );
            FormulaError::InvalidFormula
        })?;

        let image = DisplayBlock::Image(ImageElement::new(url, request.text(), request.inline()));
        Ok(if request.inline() {
            image
        } else {
            DisplayBlock::Paragraph {
                children: vec![image],
            }
        })
    }

    /// Like [`render`](Self::render), but an invalid formula degrades to its
    /// own text instead of failing.
    pub async fn render_or_text(
        &self,
        request: &FormulaRequest,
        scope: &RenderScope,
    ) -> Result<DisplayBlock, FormulaError> {
        match self.render(request, scope).await {
            Err(FormulaError::InvalidFormula) => Ok(DisplayBlock::Word {
                text: request.text().to_string(),
            }),
            result => result,
        }
    }

    async fn process_with(
        &self,
        hint: &str,
        text: &str,
        params: &RenderParams,
        scope: &RenderScope,
    ) -> Result<String, RenderError> {
        let renderer = self.registry.resolve(hint)?;
        renderer.process(text, params, scope).await
    }
}

// =============================================================================
// Tests
// =============================================================================

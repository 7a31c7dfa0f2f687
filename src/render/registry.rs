//! Renderer registry.
//!
//! Renderers are registered under a hint (usually their name) and resolved by
//! that hint at render time. The set of available renderers is fixed when the
//! service is built; lookups never mutate the registry.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::katex_backend::{KatexBackend, KATEX_RENDERER_NAME};
use super::latex::{LatexBackend, LATEX_RENDERER_NAME};
use super::renderer::{CachingRenderer, FormulaRenderer};
use crate::cache::ImageStorage;
use crate::error::RenderError;

/// Map from renderer hint to renderer.
#[derive(Clone, Default)]
pub struct RendererRegistry {
    renderers: HashMap<String, Arc<dyn FormulaRenderer>>,
}

impl RendererRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the LaTeX and KaTeX backends under their names, both
    /// caching into `storage`.
    pub fn with_builtin_backends(latex: LatexBackend, storage: Arc<dyn ImageStorage>) -> Self {
        Self::new()
            .with_renderer(
                LATEX_RENDERER_NAME,
                Arc::new(CachingRenderer::new(latex, Arc::clone(&storage))),
            )
            .with_renderer(
                KATEX_RENDERER_NAME,
                Arc::new(CachingRenderer::new(KatexBackend::new(), storage)),
            )
    }

    /// Register `renderer` under `hint`, returning the renderer it replaces.
    pub fn register(
        &mut self,
        hint: impl Into<String>,
        renderer: Arc<dyn FormulaRenderer>,
    ) -> Option<Arc<dyn FormulaRenderer>> {
        self.renderers.insert(hint.into(), renderer)
    }

    /// Builder form of [`register`](Self::register).
    pub fn with_renderer(mut self, hint: impl Into<String>, renderer: Arc<dyn FormulaRenderer>) -> Self {
        self.register(hint, renderer);
        self
    }

    /// Resolve a renderer by hint.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::RendererNotFound`] if nothing is registered under `hint`.
    pub fn resolve(&self, hint: &str) -> Result<Arc<dyn FormulaRenderer>, RenderError> {
        self.renderers
            .get(hint)
            .cloned()
            .ok_or_else(|| RenderError::RendererNotFound {
                hint: hint.to_string(),
            })
    }

    pub fn contains(&self, hint: &str) -> bool {
        self.renderers.contains_key(hint)
    }

    /// Registered hints in sorted order.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.renderers.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.renderers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.renderers.is_empty()
    }
}

impl fmt::Debug for RendererRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RendererRegistry")
            .field("renderers", &self.names())
            .finish()
    }
}

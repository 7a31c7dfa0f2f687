//! # Formula Imager
//!
//! Renders mathematical formulas to images through pluggable renderers and
//! serves them from a content-addressed image cache.
//!
//! ## Features
//!
//! - **Pluggable renderers**: formulas are rendered by a backend chosen by hint,
//!   with a LaTeX toolchain backend and an embedded KaTeX backend built in
//! - **Safe-renderer fallback**: a failing renderer is retried once with the
//!   configured safe renderer before the formula is reported invalid
//! - **Content-addressed cache**: identical render requests map to one image,
//!   rendered once even under concurrent requests
//! - **Display trees**: rendered formulas come back as image elements, wrapped
//!   in a paragraph for block formulas
//! - **HTTP surface**: an Axum service renders formulas and serves the images,
//!   optionally behind HMAC-SHA256 signed URLs
//!
//! ## Architecture
//!
//! - [`formula`] - Requests, display tree and the render-with-fallback service
//! - [`render`] - Renderer contract, registry, caching renderer and backends
//! - [`cache`] - Image cache over temporary resources
//! - [`store`] - Temporary resource references, stores and URLs
//! - [`server`] - Axum-based HTTP server and routes
//! - [`config`] - CLI and configuration types
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use formula_imager::{
//!     FormulaConfig, FormulaService, ImageStorage, LatexBackend, MemoryImageStorage,
//!     RenderScope, RendererRegistry, ResourceUrlSerializer,
//! };
//!
//! #[tokio::main]
//! async fn main() {
//!     let images: Arc<dyn ImageStorage> = Arc::new(MemoryImageStorage::new());
//!     let registry = RendererRegistry::with_builtin_backends(LatexBackend::new(), images);
//!     let service = FormulaService::new(
//!         registry,
//!         FormulaConfig::default(),
//!         ResourceUrlSerializer::default(),
//!     );
//!
//!     let request = service.request("e^{i\\pi} + 1 = 0", false);
//!     let block = service.render(&request, &RenderScope::new("docs")).await;
//!     println!("{:?}", block);
//! }
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod formula;
pub mod render;
pub mod server;
pub mod store;

// Re-export commonly used types
pub use cache::{ImageStorage, MemoryImageStorage, TemporaryImageStorage, TieredImageStorage};
pub use config::{
    BackendConfig, Cli, Command, FormulaConfig, RenderConfig, ServeConfig, SignConfig,
    SignOutputFormat, StorageBackend,
};
pub use error::{CacheError, FormulaError, RenderError, StorageError};
pub use formula::{DisplayBlock, FormulaRequest, FormulaService, ImageElement};
pub use render::{
    CachingRenderer, FontSize, FormulaRenderer, ImageBackend, ImageData, ImageType,
    KatexBackend, LatexBackend, RenderParams, RendererRegistry,
};
pub use server::{create_dev_router, create_router, AppState, RouterConfig, SignedUrlAuth};
pub use store::{
    FileResourceStore, MemoryResourceStore, RenderScope, ResourceStore, ResourceUrlSerializer,
    S3ResourceStore, TemporaryResourceReference,
};

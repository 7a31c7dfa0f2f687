//! Formula rendering.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │           RendererRegistry              │  hint ──▶ renderer
//! └────────────────────┬────────────────────┘
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │       CachingRenderer (per backend)     │  id derivation, single-flight
//! └──────────┬─────────────────┬────────────┘
//!            ▼                 ▼
//!   ┌────────────────┐  ┌─────────────┐
//!   │  LatexBackend  │  │ KatexBackend│
//!   └────────────────┘  └─────────────┘
//!            │
//!            ▼
//!     RasterEncoder (PNG ──▶ GIF / JPEG)
//! ```

mod encoder;
mod katex_backend;
mod latex;
mod registry;
mod renderer;
mod types;

pub use encoder::{RasterEncoder, DEFAULT_JPEG_QUALITY};
pub use katex_backend::{KatexBackend, KATEX_RENDERER_NAME};
pub use latex::{latex_document, LatexBackend, DEFAULT_DPI, DEFAULT_TOOL_TIMEOUT, LATEX_RENDERER_NAME};
pub use registry::RendererRegistry;
pub use renderer::{derive_image_id, CachingRenderer, FormulaRenderer, ImageBackend};
pub use types::{FontSize, ImageData, ImageType, RenderParams, UnknownImageType};

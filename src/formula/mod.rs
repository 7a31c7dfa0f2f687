//! Formula requests, orchestration and the display tree.
//!
//! [`FormulaService`] is the entry point: it validates a [`FormulaRequest`],
//! runs the configured renderer with a single fallback to the safe renderer,
//! and wraps the resulting image id into a [`DisplayBlock`].

mod display;
mod request;
mod service;

pub use display::{DisplayBlock, ImageElement, BLOCK_CLASS, INLINE_CLASS};
pub use request::FormulaRequest;
pub use service::FormulaService;

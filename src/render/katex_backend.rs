//! KaTeX backend.
//!
//! Runs KaTeX in an embedded JavaScript engine, so it needs no external
//! tools. The MathML output is wrapped in an SVG `foreignObject`; the image
//! type is always SVG regardless of the requested type.

use async_trait::async_trait;
use katex::{OptsBuilder, OutputType};
use tracing::debug;

use super::renderer::ImageBackend;
use super::types::{ImageData, ImageType, RenderParams};
use crate::error::RenderError;

/// Name of the KaTeX backend.
pub const KATEX_RENDERER_NAME: &str = "katex";

/// [`ImageBackend`] rendering formulas with KaTeX.
#[derive(Debug, Clone, Copy, Default)]
pub struct KatexBackend;

impl KatexBackend {
    pub fn new() -> Self {
        Self
    }

    /// Render `formula` to MathML.
    pub fn render_mathml(&self, formula: &str, display_mode: bool) -> Result<String, RenderError> {
        let mut builder = OptsBuilder::default();
        builder.display_mode(display_mode);
        builder.output_type(OutputType::Mathml);
        builder.throw_on_error(true);

        let opts = builder.build().map_err(|err| {
            RenderError::execution(
                KATEX_RENDERER_NAME,
                format!("failed to build KaTeX options: {err}"),
            )
        })?;

        katex::render_with_opts(formula, opts).map_err(|err| {
            let message = err.to_string();
            if message.to_ascii_lowercase().contains("parse error") || message.contains("ParseError")
            {
                RenderError::invalid_input(KATEX_RENDERER_NAME, message)
            } else {
                RenderError::execution(KATEX_RENDERER_NAME, format!("KaTeX rendering failed: {message}"))
            }
        })
    }
}

#[async_trait]
impl ImageBackend for KatexBackend {
    fn name(&self) -> &str {
        KATEX_RENDERER_NAME
    }

    async fn render_image(
        &self,
        formula: &str,
        params: &RenderParams,
    ) -> Result<ImageData, RenderError> {
        let mathml = self.render_mathml(formula, !params.inline)?;
        let svg = wrap_in_svg(&mathml, formula, params);
        debug!(bytes = svg.len(), inline = params.inline, "Rendered formula with KaTeX");
        Ok(ImageData::new(svg.into_bytes(), ImageType::Svg))
    }
}

/// Embed MathML in an SVG document sized from the formula length and font size.
fn wrap_in_svg(mathml: &str, formula: &str, params: &RenderParams) -> String {
    // pt -> px
    let font_px = params.font_size.points() as f32 * 4.0 / 3.0;
    let chars = formula.chars().filter(|c| !c.is_whitespace()).count().max(1) as f32;
    let width = (chars * font_px * 0.6 + font_px).ceil() as u32;
    let line_factor = if params.inline { 1.6 } else { 2.4 };
    let height = (font_px * line_factor).ceil() as u32;

    format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{width}\" height=\"{height}\" \
         viewBox=\"0 0 {width} {height}\">\
         <foreignObject x=\"0\" y=\"0\" width=\"{width}\" height=\"{height}\">\
         <div xmlns=\"http://www.w3.org/1999/xhtml\" style=\"font-size:{font_px}px\">{mathml}</div>\
         </foreignObject></svg>"
    )
}

use crate::config::FormulaConfig;
use crate::render::{FontSize, ImageType, RenderParams};

/// A request to render one formula.
///
/// Built from the formula text and placement, with font size, image type and
/// renderer taken from the [`FormulaConfig`] unless overridden.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormulaRequest {
    text: String,
    inline: bool,
    font_size: FontSize,
    image_type: ImageType,
    renderer: String,
}

impl FormulaRequest {
    pub fn new(text: impl Into<String>, inline: bool, config: &FormulaConfig) -> Self {
        Self {
            text: text.into(),
            inline,
            font_size: config.default_font_size,
            image_type: config.default_image_type,
            renderer: config.renderer.clone(),
        }
    }

    pub fn with_font_size(mut self, font_size: FontSize) -> Self {
        self.font_size = font_size;
        self
    }

    pub fn with_image_type(mut self, image_type: ImageType) -> Self {
        self.image_type = image_type;
        self
    }

    /// Use the renderer registered under `hint` instead of the configured one.
    pub fn with_renderer(mut self, hint: impl Into<String>) -> Self {
        self.renderer = hint.into();
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn inline(&self) -> bool {
        self.inline
    }

    pub fn font_size(&self) -> FontSize {
        self.font_size
    }

    pub fn image_type(&self) -> ImageType {
        self.image_type
    }

    pub fn renderer(&self) -> &str {
        &self.renderer
    }

    /// True when the text is empty or whitespace only.
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }

    pub fn params(&self) -> RenderParams {
        RenderParams::new(self.inline, self.font_size, self.image_type)
    }
}

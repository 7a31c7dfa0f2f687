//! Value types shared by renderers and the image cache.

use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

// =============================================================================
// Image Type
// =============================================================================

/// Output format of a rendered formula image.
///
/// The upper-case variant name (`"PNG"`, `"SVG"`, ...) is what the image cache
/// persists as the type marker of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ImageType {
    /// Renderer's preferred raster format (PNG)
    #[default]
    Default,
    Png,
    Gif,
    Jpeg,
    Svg,
}

impl ImageType {
    /// All image types, in declaration order.
    pub const ALL: [ImageType; 5] = [
        ImageType::Default,
        ImageType::Png,
        ImageType::Gif,
        ImageType::Jpeg,
        ImageType::Svg,
    ];

    /// Name used for the persisted type marker.
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageType::Default => "DEFAULT",
            ImageType::Png => "PNG",
            ImageType::Gif => "GIF",
            ImageType::Jpeg => "JPEG",
            ImageType::Svg => "SVG",
        }
    }

    /// Parse a persisted type marker. Only the exact [`as_str`](Self::as_str)
    /// spelling is accepted; use [`FromStr`] for user input.
    pub fn from_marker(marker: &str) -> Option<ImageType> {
        ImageType::ALL.iter().copied().find(|t| t.as_str() == marker)
    }

    /// MIME type served for images of this type.
    pub fn mime_type(&self) -> &'static str {
        match self {
            ImageType::Default | ImageType::Png => "image/png",
            ImageType::Gif => "image/gif",
            ImageType::Jpeg => "image/jpeg",
            ImageType::Svg => "image/svg+xml",
        }
    }

    /// Conventional file extension, without the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            ImageType::Default | ImageType::Png => "png",
            ImageType::Gif => "gif",
            ImageType::Jpeg => "jpg",
            ImageType::Svg => "svg",
        }
    }
}

impl fmt::Display for ImageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string does not name an image type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownImageType(pub String);

impl fmt::Display for UnknownImageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown image type: {:?}", self.0)
    }
}

impl std::error::Error for UnknownImageType {}

impl FromStr for ImageType {
    type Err = UnknownImageType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ImageType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownImageType(s.to_string()))
    }
}

// =============================================================================
// Font Size
// =============================================================================

/// Font size of a rendered formula, following the LaTeX size commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FontSize {
    #[default]
    Default,
    Tiny,
    VerySmall,
    Smaller,
    Small,
    Normal,
    Large,
    Larger,
    VeryLarge,
    Huge,
    VeryHuge,
}

impl FontSize {
    pub fn as_str(&self) -> &'static str {
        match self {
            FontSize::Default => "DEFAULT",
            FontSize::Tiny => "TINY",
            FontSize::VerySmall => "VERY_SMALL",
            FontSize::Smaller => "SMALLER",
            FontSize::Small => "SMALL",
            FontSize::Normal => "NORMAL",
            FontSize::Large => "LARGE",
            FontSize::Larger => "LARGER",
            FontSize::VeryLarge => "VERY_LARGE",
            FontSize::Huge => "HUGE",
            FontSize::VeryHuge => "VERY_HUGE",
        }
    }

    /// LaTeX size command, without the backslash.
    pub fn command(&self) -> &'static str {
        match self {
            FontSize::Tiny => "tiny",
            FontSize::VerySmall => "scriptsize",
            FontSize::Smaller => "footnotesize",
            FontSize::Small => "small",
            FontSize::Default | FontSize::Normal => "normalsize",
            FontSize::Large => "large",
            FontSize::Larger => "Large",
            FontSize::VeryLarge => "LARGE",
            FontSize::Huge => "huge",
            FontSize::VeryHuge => "Huge",
        }
    }

    /// Size in points for a 10pt base document.
    pub fn points(&self) -> u32 {
        match self {
            FontSize::Tiny => 5,
            FontSize::VerySmall => 7,
            FontSize::Smaller => 8,
            FontSize::Small => 9,
            FontSize::Default | FontSize::Normal => 10,
            FontSize::Large => 12,
            FontSize::Larger => 14,
            FontSize::VeryLarge => 17,
            FontSize::Huge => 20,
            FontSize::VeryHuge => 25,
        }
    }
}

impl fmt::Display for FontSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Image Data
// =============================================================================

/// A rendered formula image together with its format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageData {
    /// Encoded image bytes
    pub data: Bytes,

    /// Format of `data`
    pub image_type: ImageType,
}

impl ImageData {
    pub fn new(data: impl Into<Bytes>, image_type: ImageType) -> Self {
        Self {
            data: data.into(),
            image_type,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

// =============================================================================
// Render Parameters
// =============================================================================

/// Parameters that, together with the formula text, determine the rendered pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RenderParams {
    /// Inline (in a line of text) or block-level placement
    pub inline: bool,

    pub font_size: FontSize,

    pub image_type: ImageType,
}

impl RenderParams {
    pub fn new(inline: bool, font_size: FontSize, image_type: ImageType) -> Self {
        Self {
            inline,
            font_size,
            image_type,
        }
    }
}

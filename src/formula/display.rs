//! Display tree returned to callers.

use serde::{Deserialize, Serialize};

/// Style class of an inline formula image.
pub const INLINE_CLASS: &str = "formula-inline";

/// Style class of a block-level formula image.
pub const BLOCK_CLASS: &str = "formula-block";

/// An image pointing at a rendered formula.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageElement {
    pub url: String,

    /// The formula text
    pub alt: String,

    /// [`INLINE_CLASS`] or [`BLOCK_CLASS`]
    pub class: String,
}

impl ImageElement {
    pub fn new(url: impl Into<String>, alt: impl Into<String>, inline: bool) -> Self {
        Self {
            url: url.into(),
            alt: alt.into(),
            class: if inline { INLINE_CLASS } else { BLOCK_CLASS }.to_string(),
        }
    }
}

/// Element of the display tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DisplayBlock {
    Image(ImageElement),
    Paragraph { children: Vec<DisplayBlock> },
    Word { text: String },
}

impl DisplayBlock {
    /// The image of this block, looking through paragraphs.
    pub fn image(&self) -> Option<&ImageElement> {
        match self {
            DisplayBlock::Image(image) => Some(image),
            DisplayBlock::Paragraph { children } => children.iter().find_map(DisplayBlock::image),
            DisplayBlock::Word { .. } => None,
        }
    }

    /// Render the tree as an HTML fragment.
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        self.write_html(&mut out);
        out
    }

    fn write_html(&self, out: &mut String) {
        match self {
            DisplayBlock::Image(image) => {
                out.push_str("<img src=\"");
                push_escaped(out, &image.url);
                out.push_str("\" alt=\"");
                push_escaped(out, &image.alt);
                out.push_str("\" class=\"");
                push_escaped(out, &image.class);
                out.push_str("\"/>");
            }
            DisplayBlock::Paragraph { children } => {
                out.push_str("<p>");
                for child in children {
                    child.write_html(out);
                }
                out.push_str("</p>");
            }
            DisplayBlock::Word { text } => push_escaped(out, text),
        }
    }
}

fn push_escaped(out: &mut String, text: &str) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
}

//! Addressing of temporary formula resources.
//!
//! Every cached image is stored as two temporary resources living in the
//! `formula` module of a [`RenderScope`]:
//!
//! ```text
//! formula / {scope} / {id}        image bytes
//! formula / {scope} / {id}Type    type marker ("PNG", "SVG", ...)
//! ```

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::StorageError;

/// Module under which formula images are stored.
pub const FORMULA_MODULE: &str = "formula";

/// Suffix appended to an image id to name its type marker.
pub const TYPE_MARKER_SUFFIX: &str = "Type";

// =============================================================================
// Render Scope
// =============================================================================

/// Addressing scope of a render (typically the document or tenant the formula
/// appears in).
///
/// The scope is supplied by the caller and only used to partition temporary
/// resources and the URLs pointing at them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RenderScope(Arc<str>);

impl RenderScope {
    pub fn new(scope: impl Into<Arc<str>>) -> Self {
        Self(scope.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether resources can be stored under this scope.
    pub fn is_addressable(&self) -> bool {
        is_valid_segment(&self.0)
    }
}

impl fmt::Display for RenderScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RenderScope {
    fn from(scope: &str) -> Self {
        Self::new(scope)
    }
}

impl From<String> for RenderScope {
    fn from(scope: String) -> Self {
        Self::new(scope)
    }
}

// =============================================================================
// Temporary Resource Reference
// =============================================================================

/// Reference to a single temporary resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TemporaryResourceReference {
    module: String,
    resource: String,
    scope: RenderScope,
}

impl TemporaryResourceReference {
    pub fn new(
        module: impl Into<String>,
        resource: impl Into<String>,
        scope: RenderScope,
    ) -> Self {
        Self {
            module: module.into(),
            resource: resource.into(),
            scope,
        }
    }

    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn scope(&self) -> &RenderScope {
        &self.scope
    }

    /// Percent-encoded path segments `[module, scope, resource]`.
    ///
    /// Fails with [`StorageError::InvalidLocation`] when a segment is empty or
    /// would escape its parent directory.
    pub fn segments(&self) -> Result<[String; 3], StorageError> {
        let module = encode_segment(&self.module, self)?;
        let scope = encode_segment(self.scope.as_str(), self)?;
        let resource = encode_segment(&self.resource, self)?;
        Ok([module, scope, resource])
    }

    /// Slash-separated storage key, e.g. `formula/wiki%3APage/abc123`.
    pub fn storage_key(&self) -> Result<String, StorageError> {
        Ok(self.segments()?.join("/"))
    }
}

impl fmt::Display for TemporaryResourceReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.module, self.scope, self.resource)
    }
}

fn encode_segment(
    segment: &str,
    reference: &TemporaryResourceReference,
) -> Result<String, StorageError> {
    if !is_valid_segment(segment) {
        return Err(StorageError::InvalidLocation(reference.to_string()));
    }
    Ok(urlencoding::encode(segment).into_owned())
}

fn is_valid_segment(segment: &str) -> bool {
    !segment.is_empty() && segment != "." && segment != ".."
}

// =============================================================================
// Formula Addressing
// =============================================================================

/// Reference to the image bytes of the entry `image_id`.
pub fn image_reference(image_id: &str, scope: &RenderScope) -> TemporaryResourceReference {
    TemporaryResourceReference::new(FORMULA_MODULE, image_id, scope.clone())
}

/// Reference to the type marker of the entry `image_id`.
pub fn image_type_reference(image_id: &str, scope: &RenderScope) -> TemporaryResourceReference {
    TemporaryResourceReference::new(
        FORMULA_MODULE,
        format!("{}{}", image_id, TYPE_MARKER_SUFFIX),
        scope.clone(),
    )
}

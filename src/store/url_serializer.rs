use std::time::Duration;

use super::reference::TemporaryResourceReference;
use crate::error::StorageError;
use crate::server::auth::SignedUrlAuth;

/// Path prefix under which temporary resources are served.
pub const TEMPORARY_RESOURCE_PREFIX: &str = "/tmp";

/// Serializes temporary resource references into URLs a browser can fetch.
///
/// URLs have the form `{base_path}/tmp/{module}/{scope}/{resource}`. When a
/// signer is configured, `exp` and `sig` query parameters are appended so the
/// URL passes the server's signed-URL check.
#[derive(Clone)]
pub struct ResourceUrlSerializer {
    base_path: String,
    signer: Option<(SignedUrlAuth, Duration)>,
}

impl ResourceUrlSerializer {
    /// Create a serializer producing unsigned URLs under `base_path`
    /// (empty for the server root).
    pub fn new(base_path: impl Into<String>) -> Self {
        let base_path = base_path.into().trim_end_matches('/').to_string();
        Self {
            base_path,
            signer: None,
        }
    }

    /// Sign every serialized URL, valid for `ttl`.
    pub fn with_signer(mut self, auth: SignedUrlAuth, ttl: Duration) -> Self {
        self.signer = Some((auth, ttl));
        self
    }

    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    /// Path of a resource as seen by the server router (without `base_path`).
    pub fn resource_path(reference: &TemporaryResourceReference) -> Result<String, StorageError> {
        let [module, scope, resource] = reference.segments()?;
        Ok(format!(
            "{}/{}/{}/{}",
            TEMPORARY_RESOURCE_PREFIX, module, scope, resource
        ))
    }

    /// Serialize a reference into a URL string.
    pub fn serialize(&self, reference: &TemporaryResourceReference) -> Result<String, StorageError> {
        let path = Self::resource_path(reference)?;
        Ok(match &self.signer {
            Some((auth, ttl)) => auth.generate_signed_url(&self.base_path, &path, *ttl, &[]),
            None => format!("{}{}", self.base_path, path),
        })
    }
}

impl Default for ResourceUrlSerializer {
    fn default() -> Self {
        Self::new("")
    }
}

//! Image storage on top of temporary resources.
//!
//! An entry is persisted as a pair of resources: the image bytes under
//! `{id}` and a type marker under `{id}Type`. A lookup only succeeds when both
//! halves can be read; anything less is a miss, never a partial image.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::{debug, error};

use crate::error::{CacheError, StorageError};
use crate::render::{ImageData, ImageType};
use crate::store::{
    image_reference, image_type_reference, RenderScope, ResourceStore, TemporaryResourceReference,
};

// =============================================================================
// ImageStorage Trait
// =============================================================================

/// Content-addressed store for rendered formula images.
///
/// Identifiers are opaque to the storage; renderers derive them from their
/// inputs so that equal inputs share an entry. An empty identifier never
/// matches anything and is never stored.
#[async_trait]
pub trait ImageStorage: Send + Sync {
    /// Look up an image.
    ///
    /// Returns `Ok(None)` when the entry is missing, incomplete or unreadable.
    /// Fails only with [`CacheError::Corrupted`] when the stored type marker
    /// cannot be parsed.
    async fn get(&self, id: &str, scope: &RenderScope) -> Result<Option<ImageData>, CacheError>;

    /// Store an image. Storing the same image twice under one id is harmless.
    async fn put(&self, id: &str, scope: &RenderScope, image: &ImageData)
        -> Result<(), CacheError>;

    /// Check whether a complete entry exists.
    async fn contains(&self, id: &str, scope: &RenderScope) -> Result<bool, CacheError> {
        Ok(self.get(id, scope).await?.is_some())
    }
}

#[async_trait]
impl<T: ImageStorage + ?Sized> ImageStorage for Arc<T> {
    async fn get(&self, id: &str, scope: &RenderScope) -> Result<Option<ImageData>, CacheError> {
        (**self).get(id, scope).await
    }

    async fn put(
        &self,
        id: &str,
        scope: &RenderScope,
        image: &ImageData,
    ) -> Result<(), CacheError> {
        (**self).put(id, scope, image).await
    }

    async fn contains(&self, id: &str, scope: &RenderScope) -> Result<bool, CacheError> {
        (**self).contains(id, scope).await
    }
}

// =============================================================================
// TemporaryImageStorage
// =============================================================================

/// [`ImageStorage`] persisting each entry as two temporary resources.
pub struct TemporaryImageStorage<S: ResourceStore> {
    store: S,
}

impl<S: ResourceStore> TemporaryImageStorage<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Get a reference to the underlying resource store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Read one half of an entry, mapping every storage failure to a miss.
    async fn load(&self, reference: &TemporaryResourceReference) -> Option<Bytes> {
        match self.store.read(reference).await {
            Ok(data) => Some(data),
            Err(StorageError::NotFound(_)) => None,
            Err(e) => {
                debug!(
                    resource = %reference,
                    store = self.store.identifier(),
                    error = %e,
                    "Treating unreadable formula resource as missing"
                );
                None
            }
        }
    }
}

#[async_trait]
impl<S: ResourceStore> ImageStorage for TemporaryImageStorage<S> {
    async fn get(&self, id: &str, scope: &RenderScope) -> Result<Option<ImageData>, CacheError> {
        if id.is_empty() {
            return Ok(None);
        }

        let Some(data) = self.load(&image_reference(id, scope)).await else {
            return Ok(None);
        };
        let Some(marker) = self.load(&image_type_reference(id, scope)).await else {
            return Ok(None);
        };

        if data.is_empty() {
            debug!(image_id = id, scope = %scope, "Ignoring formula entry with empty image data");
            return Ok(None);
        }

        let marker = String::from_utf8_lossy(&marker);
        let image_type = ImageType::from_marker(&marker).ok_or_else(|| {
            error!(
                image_id = id,
                scope = %scope,
                marker = %marker,
                "Formula image type marker is corrupted"
            );
            CacheError::Corrupted {
                id: id.to_string(),
                marker: marker.to_string(),
            }
        })?;

        Ok(Some(ImageData::new(data, image_type)))
    }

    async fn put(
        &self,
        id: &str,
        scope: &RenderScope,
        image: &ImageData,
    ) -> Result<(), CacheError> {
        if id.is_empty() {
            return Ok(());
        }

        let write_error = |source: StorageError| CacheError::Write {
            id: id.to_string(),
            source,
        };

        // The marker goes last: until it exists, readers see no entry at all
        self.store
            .write(&image_reference(id, scope), image.data.clone())
            .await
            .map_err(write_error)?;
        self.store
            .write(
                &image_type_reference(id, scope),
                Bytes::from_static(image.image_type.as_str().as_bytes()),
            )
            .await
            .map_err(write_error)?;

        Ok(())
    }

    async fn contains(&self, id: &str, scope: &RenderScope) -> Result<bool, CacheError> {
        if id.is_empty() {
            return Ok(false);
        }
        for reference in [image_reference(id, scope), image_type_reference(id, scope)] {
            match self.store.exists(&reference).await {
                Ok(true) => {}
                Ok(false) | Err(_) => return Ok(false),
            }
        }
        Ok(true)
    }
}

// =============================================================================
// Tests
// =============================================================================

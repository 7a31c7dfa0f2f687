use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::memory::MemoryImageStorage;
use super::storage::ImageStorage;
use crate::error::CacheError;
use crate::render::ImageData;
use crate::store::RenderScope;

/// Two-level [`ImageStorage`]: an in-memory LRU in front of a durable store.
///
/// Reads are served from memory when possible and back-filled from the
/// durable store on a memory miss. Writes always land in memory first, so an
/// image stays servable by this process even when the durable write fails;
/// that failure is still returned to the caller.
pub struct TieredImageStorage {
    front: MemoryImageStorage,
    back: Arc<dyn ImageStorage>,
}

impl TieredImageStorage {
    pub fn new(front: MemoryImageStorage, back: Arc<dyn ImageStorage>) -> Self {
        Self { front, back }
    }

    /// Get a reference to the in-memory level.
    pub fn front(&self) -> &MemoryImageStorage {
        &self.front
    }
}

#[async_trait]
impl ImageStorage for TieredImageStorage {
    async fn get(&self, id: &str, scope: &RenderScope) -> Result<Option<ImageData>, CacheError> {
        if let Some(image) = self.front.get(id, scope).await? {
            return Ok(Some(image));
        }

        let image = self.back.get(id, scope).await?;
        if let Some(ref image) = image {
            debug!(image_id = id, scope = %scope, "Promoting formula image to memory cache");
            self.front.put(id, scope, image).await?;
        }
        Ok(image)
    }

    async fn put(
        &self,
        id: &str,
        scope: &RenderScope,
        image: &ImageData,
    ) -> Result<(), CacheError> {
        self.front.put(id, scope, image).await?;
        self.back.put(id, scope, image).await
    }

    async fn contains(&self, id: &str, scope: &RenderScope) -> Result<bool, CacheError> {
        if self.front.contains(id, scope).await? {
            return Ok(true);
        }
        self.back.contains(id, scope).await
    }
}

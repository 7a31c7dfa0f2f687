use std::collections::HashMap;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::RwLock;

use super::reference::TemporaryResourceReference;
use crate::error::StorageError;

/// Trait for the storage area holding temporary resources.
///
/// Lifetime and eviction of the stored resources are up to the implementation;
/// callers must cope with resources disappearing between two calls.
#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// Read a whole resource.
    ///
    /// Returns [`StorageError::NotFound`] if the resource does not exist.
    async fn read(&self, reference: &TemporaryResourceReference) -> Result<Bytes, StorageError>;

    /// Create or replace a resource.
    async fn write(
        &self,
        reference: &TemporaryResourceReference,
        data: Bytes,
    ) -> Result<(), StorageError>;

    /// Check whether a resource exists.
    async fn exists(&self, reference: &TemporaryResourceReference) -> Result<bool, StorageError> {
        match self.read(reference).await {
            Ok(_) => Ok(true),
            Err(StorageError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Human-readable location of the store, for logging.
    fn identifier(&self) -> &str;
}

// =============================================================================
// In-memory store
// =============================================================================

/// Process-local resource store. Resources live until the store is dropped.
#[derive(Default)]
pub struct MemoryResourceStore {
    resources: RwLock<HashMap<TemporaryResourceReference, Bytes>>,
}

impl MemoryResourceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove a resource, returning its content if it existed.
    pub async fn remove(&self, reference: &TemporaryResourceReference) -> Option<Bytes> {
        self.resources.write().await.remove(reference)
    }

    pub async fn len(&self) -> usize {
        self.resources.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.resources.read().await.is_empty()
    }
}

#[async_trait]
impl ResourceStore for MemoryResourceStore {
    async fn read(&self, reference: &TemporaryResourceReference) -> Result<Bytes, StorageError> {
        // Reject references the other stores could not address either
        reference.storage_key()?;
        self.resources
            .read()
            .await
            .get(reference)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(reference.to_string()))
    }

    async fn write(
        &self,
        reference: &TemporaryResourceReference,
        data: Bytes,
    ) -> Result<(), StorageError> {
        reference.storage_key()?;
        self.resources
            .write()
            .await
            .insert(reference.clone(), data);
        Ok(())
    }

    fn identifier(&self) -> &str {
        "memory://"
    }
}

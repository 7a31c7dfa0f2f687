//! In-memory image storage.
//!
//! Entries are kept as a single record (bytes and type together), so a
//! lookup can never observe half of an entry. The cache tracks the total size
//! of cached images in bytes and evicts least-recently-used entries when the
//! capacity is exceeded.

use std::num::NonZeroUsize;

use async_trait::async_trait;
use lru::LruCache;
use tokio::sync::Mutex;

use super::storage::ImageStorage;
use crate::error::CacheError;
use crate::render::ImageData;
use crate::store::RenderScope;

/// Default cache capacity: 64MB
pub const DEFAULT_IMAGE_CACHE_CAPACITY: usize = 64 * 1024 * 1024;

/// Default maximum number of entries (to bound LRU overhead)
const DEFAULT_MAX_ENTRIES: usize = 10_000;

type EntryKey = (RenderScope, String);

struct LruState {
    entries: LruCache<EntryKey, ImageData>,
    current_size: usize,
}

/// LRU [`ImageStorage`] with size-based capacity.
///
/// The cache is thread-safe and can be shared across async tasks via `Arc`.
///
/// # Example
///
/// ```
/// use formula_imager::cache::{ImageStorage, MemoryImageStorage};
/// use formula_imager::render::{ImageData, ImageType};
/// use formula_imager::store::RenderScope;
///
/// #[tokio::main]
/// async fn main() {
///     let cache = MemoryImageStorage::new();
///     let scope = RenderScope::new("wiki:Space.Page");
///     let image = ImageData::new(vec![0x89, 0x50, 0x4E, 0x47], ImageType::Png);
///
///     cache.put("abc123", &scope, &image).await.unwrap();
///     assert_eq!(cache.get("abc123", &scope).await.unwrap(), Some(image));
/// }
/// ```
pub struct MemoryImageStorage {
    state: Mutex<LruState>,

    /// Maximum total size in bytes
    max_size: usize,
}

impl MemoryImageStorage {
    /// Create a new cache with default capacity (64MB).
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_IMAGE_CACHE_CAPACITY)
    }

    /// Create a new cache with the specified capacity in bytes.
    pub fn with_capacity(max_size: usize) -> Self {
        Self::with_capacity_and_entries(max_size, DEFAULT_MAX_ENTRIES)
    }

    /// Create a new cache with specified capacity and maximum entries.
    ///
    /// A `max_entries` of zero is treated as one.
    pub fn with_capacity_and_entries(max_size: usize, max_entries: usize) -> Self {
        let max_entries = NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            state: Mutex::new(LruState {
                entries: LruCache::new(max_entries),
                current_size: 0,
            }),
            max_size,
        }
    }

    /// Remove an entry, returning it if it existed.
    pub async fn remove(&self, id: &str, scope: &RenderScope) -> Option<ImageData> {
        let mut state = self.state.lock().await;
        let key = (scope.clone(), id.to_string());
        let removed = state.entries.pop(&key);
        if let Some(ref image) = removed {
            state.current_size = state.current_size.saturating_sub(image.len());
        }
        removed
    }

    /// Clear all entries from the cache.
    pub async fn clear(&self) {
        let mut state = self.state.lock().await;
        state.entries.clear();
        state.current_size = 0;
    }

    /// Get the current number of cached images.
    pub async fn len(&self) -> usize {
        self.state.lock().await.entries.len()
    }

    /// Check if the cache is empty.
    pub async fn is_empty(&self) -> bool {
        self.state.lock().await.entries.is_empty()
    }

    /// Get the current total size of cached images in bytes.
    pub async fn size(&self) -> usize {
        self.state.lock().await.current_size
    }

    /// Get the maximum capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.max_size
    }
}

impl Default for MemoryImageStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ImageStorage for MemoryImageStorage {
    async fn get(&self, id: &str, scope: &RenderScope) -> Result<Option<ImageData>, CacheError> {
        if id.is_empty() {
            return Ok(None);
        }
        let mut state = self.state.lock().await;
        Ok(state.entries.get(&(scope.clone(), id.to_string())).cloned())
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

        let mut state = self.state.lock().await;
        let key = (scope.clone(), id.to_string());

        // If key exists, subtract old size first
        let old_len = state.entries.peek(&key).map(ImageData::len);
        if let Some(old_len) = old_len {
            state.current_size = state.current_size.saturating_sub(old_len);
        }

        // An entry pushed out by the entry cap leaves the size tally too
        let pushed_out = state.entries.push(key.clone(), image.clone());
        if let Some((evicted_key, evicted)) = pushed_out {
            if evicted_key != key {
                state.current_size = state.current_size.saturating_sub(evicted.len());
            }
        }
        state.current_size += image.len();

        while state.current_size > self.max_size {
            match state.entries.pop_lru() {
                Some((_, evicted)) => {
                    state.current_size = state.current_size.saturating_sub(evicted.len());
                }
                None => break,
            }
        }

        Ok(())
    }

    async fn contains(&self, id: &str, scope: &RenderScope) -> Result<bool, CacheError> {
        if id.is_empty() {
            return Ok(false);
        }
        let state = self.state.lock().await;
        Ok(state.entries.contains(&(scope.clone(), id.to_string())))
    }
}

// =============================================================================
// Tests
// =============================================================================

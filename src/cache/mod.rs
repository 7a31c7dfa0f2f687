//! Image cache.
//!
//! Rendered formula images are cached under content-derived identifiers so
//! that repeated renders of the same formula are served without invoking a
//! backend again.
//!
//! # Components
//!
//! - [`ImageStorage`]: the cache contract (`get`, `put`, `contains`)
//! - [`TemporaryImageStorage`]: persists each entry as an image resource plus a
//!   type marker resource in a [`ResourceStore`](crate::store::ResourceStore)
//! - [`MemoryImageStorage`]: size-bounded LRU holding each entry as one record
//! - [`TieredImageStorage`]: memory in front of a durable storage

mod memory;
mod storage;
mod tiered;

pub use memory::{MemoryImageStorage, DEFAULT_IMAGE_CACHE_CAPACITY};
pub use storage::{ImageStorage, TemporaryImageStorage};
pub use tiered::TieredImageStorage;

//! Temporary resource layer.
//!
//! Rendered formula images live in a shared temporary storage area. This
//! module defines how resources in that area are addressed, where they are
//! stored, and how they are exposed as URLs:
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │              Image Cache                │
//! └────────────────────┬────────────────────┘
//!                      │  TemporaryResourceReference
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │          ResourceStore Trait            │
//! └────────────────────┬────────────────────┘
//!          ┌───────────┼───────────┐
//!          ▼           ▼           ▼
//!      ┌────────┐ ┌─────────┐ ┌─────────┐
//!      │ Memory │ │  File   │ │   S3    │
//!      └────────┘ └─────────┘ └─────────┘
//! ```

mod file_store;
mod reference;
mod resource_store;
mod s3_store;
mod url_serializer;

pub use file_store::FileResourceStore;
pub use reference::{
    image_reference, image_type_reference, RenderScope, TemporaryResourceReference,
    FORMULA_MODULE, TYPE_MARKER_SUFFIX,
};
pub use resource_store::{MemoryResourceStore, ResourceStore};
pub use s3_store::{create_s3_client, S3ResourceStore};
pub use url_serializer::{ResourceUrlSerializer, TEMPORARY_RESOURCE_PREFIX};

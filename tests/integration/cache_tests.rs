//! Image cache integration tests.
//!
//! Tests verify:
//! - Entries are persisted as an image file plus a type marker file
//! - Persisted entries survive a restart and are not rendered again
//! - Half-written entries are treated as misses and re-rendered
//! - The in-memory tier serves and promotes entries

use std::sync::Arc;

use formula_imager::cache::{
    ImageStorage, MemoryImageStorage, TemporaryImageStorage, TieredImageStorage,
};
use formula_imager::render::{CachingRenderer, FormulaRenderer};
use formula_imager::store::FileResourceStore;
use formula_imager::{FontSize, ImageData, ImageType, RenderParams, RenderScope};

use super::test_utils::ScriptedBackend;

fn file_storage(root: &std::path::Path) -> Arc<dyn ImageStorage> {
    Arc::new(TemporaryImageStorage::new(FileResourceStore::new(root)))
}

fn params() -> RenderParams {
    RenderParams::new(true, FontSize::Default, ImageType::Png)
}

// =============================================================================
// File Layout
// =============================================================================

#[tokio::test]
async fn test_entry_is_stored_as_image_and_marker_files() {
    let dir = tempfile::tempdir().unwrap();
    let storage = file_storage(dir.path());
    let scope = RenderScope::new("page");

    storage
        .put("abc123", &scope, &ImageData::new("png-bytes", ImageType::Png))
        .await
        .unwrap();

    let entry_dir = dir.path().join("formula").join("page");
    assert_eq!(
        std::fs::read(entry_dir.join("abc123")).unwrap(),
        b"png-bytes"
    );
    assert_eq!(std::fs::read(entry_dir.join("abc123Type")).unwrap(), b"PNG");

    let image = storage.get("abc123", &scope).await.unwrap().unwrap();
    assert_eq!(image.image_type, ImageType::Png);
    assert_eq!(&image.data[..], b"png-bytes");
}

#[tokio::test]
async fn test_scope_cannot_escape_storage_root() {
    let dir = tempfile::tempdir().unwrap();
    let storage = file_storage(dir.path());
    let scope = RenderScope::new("../outside");

    storage
        .put("abc", &scope, &ImageData::new("svg", ImageType::Svg))
        .await
        .unwrap();

    assert!(!dir.path().join("outside").exists());
    assert!(dir.path().join("formula").join("..%2Foutside").exists());
    assert!(storage.contains("abc", &scope).await.unwrap());
}

// =============================================================================
// Persistence
// =============================================================================

#[tokio::test]
async fn test_persisted_image_is_not_rendered_again() {
    let dir = tempfile::tempdir().unwrap();
    let scope = RenderScope::new("page");

    let first_backend = ScriptedBackend::new("scripted");
    let first = CachingRenderer::new(first_backend.clone(), file_storage(dir.path()));
    let id = first.process("x^2", &params(), &scope).await.unwrap();
    assert_eq!(first_backend.calls(), 1);

    // A new renderer over the same directory, as after a restart
    let second_backend = ScriptedBackend::new("scripted");
    let second = CachingRenderer::new(second_backend.clone(), file_storage(dir.path()));
    let again = second.process("x^2", &params(), &scope).await.unwrap();

    assert_eq!(id, again);
    assert_eq!(second_backend.calls(), 0);

    let image = second.get_image(&id, &scope).await.unwrap().unwrap();
    assert_eq!(&image.data[..], b"image:x^2");
}

#[tokio::test]
async fn test_missing_marker_triggers_rerender() {
    let dir = tempfile::tempdir().unwrap();
    let scope = RenderScope::new("page");
    let backend = ScriptedBackend::new("scripted");
    let renderer = CachingRenderer::new(backend.clone(), file_storage(dir.path()));

    let id = renderer.process("y", &params(), &scope).await.unwrap();
    let marker = dir
        .path()
        .join("formula")
        .join("page")
        .join(format!("{id}Type"));
    std::fs::remove_file(&marker).unwrap();

    assert!(renderer.get_image(&id, &scope).await.unwrap().is_none());

    let again = renderer.process("y", &params(), &scope).await.unwrap();
    assert_eq!(id, again);
    assert_eq!(backend.calls(), 2);
    assert!(marker.exists());
}

// =============================================================================
// Memory Tier
// =============================================================================

#[tokio::test]
async fn test_memory_tier_serves_after_durable_loss() {
    let dir = tempfile::tempdir().unwrap();
    let scope = RenderScope::new("page");
    let tiered = TieredImageStorage::new(MemoryImageStorage::new(), file_storage(dir.path()));

    tiered
        .put("abc", &scope, &ImageData::new("gif", ImageType::Gif))
        .await
        .unwrap();
    std::fs::remove_dir_all(dir.path().join("formula")).unwrap();

    let image = tiered.get("abc", &scope).await.unwrap().unwrap();
    assert_eq!(image.image_type, ImageType::Gif);
}

#[tokio::test]
async fn test_memory_tier_is_filled_from_durable_storage() {
    let dir = tempfile::tempdir().unwrap();
    let scope = RenderScope::new("page");

    file_storage(dir.path())
        .put("abc", &scope, &ImageData::new("jpeg", ImageType::Jpeg))
        .await
        .unwrap();

    let tiered = TieredImageStorage::new(MemoryImageStorage::new(), file_storage(dir.path()));
    assert!(!tiered.front().contains("abc", &scope).await.unwrap());

    let image = tiered.get("abc", &scope).await.unwrap().unwrap();
    assert_eq!(image.image_type, ImageType::Jpeg);
    assert!(tiered.front().contains("abc", &scope).await.unwrap());
}

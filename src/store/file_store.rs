//! Filesystem-backed resource store.
//!
//! Resources are laid out as `{root}/{module}/{scope}/{resource}` with every
//! segment percent-encoded, so neither scopes nor resource names can reach
//! outside the root directory.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;

use super::reference::TemporaryResourceReference;
use super::resource_store::ResourceStore;
use crate::error::StorageError;

/// Resource store writing each resource to its own file.
///
/// Writes go to a hidden temporary file in the target directory which is then
/// renamed over the final path, so readers never observe a half-written file.
pub struct FileResourceStore {
    root: PathBuf,
    identifier: String,
    write_counter: AtomicU64,
}

impl FileResourceStore {
    /// Create a store rooted at `root`. The directory is created lazily on first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let identifier = format!("file://{}", root.display());
        Self {
            root,
            identifier,
            write_counter: AtomicU64::new(0),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Filesystem path of a resource.
    pub fn path_for(&self, reference: &TemporaryResourceReference) -> Result<PathBuf, StorageError> {
        let [module, scope, resource] = reference.segments()?;
        Ok(self.root.join(module).join(scope).join(resource))
    }
}

#[async_trait]
impl ResourceStore for FileResourceStore {
    async fn read(&self, reference: &TemporaryResourceReference) -> Result<Bytes, StorageError> {
        let path = self.path_for(reference)?;
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(StorageError::NotFound(path.display().to_string()))
            }
            Err(e) => Err(StorageError::Io(format!("{}: {}", path.display(), e))),
        }
    }

    async fn write(
        &self,
        reference: &TemporaryResourceReference,
        data: Bytes,
    ) -> Result<(), StorageError> {
        let path = self.path_for(reference)?;
        let dir = path
            .parent()
            .ok_or_else(|| StorageError::InvalidLocation(reference.to_string()))?;

        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| StorageError::Io(format!("{}: {}", dir.display(), e)))?;

        let sequence = self.write_counter.fetch_add(1, Ordering::Relaxed);
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let temp_path = dir.join(format!(
            ".{}.{}.{}.tmp",
            file_name,
            std::process::id(),
            sequence
        ));

        if let Err(e) = tokio::fs::write(&temp_path, &data).await {
            return Err(StorageError::Io(format!("{}: {}", temp_path.display(), e)));
        }

        if let Err(e) = tokio::fs::rename(&temp_path, &path).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(StorageError::Io(format!("{}: {}", path.display(), e)));
        }

        debug!(path = %path.display(), bytes = data.len(), "Wrote temporary resource");
        Ok(())
    }

    async fn exists(&self, reference: &TemporaryResourceReference) -> Result<bool, StorageError> {
        let path = self.path_for(reference)?;
        match tokio::fs::metadata(&path).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::Io(format!("{}: {}", path.display(), e))),
        }
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }
}

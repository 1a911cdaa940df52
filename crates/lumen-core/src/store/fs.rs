//! Filesystem-backed blob store.

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::debug;

use crate::error::StoreError;

use super::BlobStore;

/// Blob store that maps keys to files under a root directory.
///
/// Keys are treated as relative paths ("images/beach.jpg"), so originals
/// and thumbnails naturally land in separate subdirectories.
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn read(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        let path = self.resolve(key);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, key: &str, bytes: &[u8]) -> Result<(), StoreError> {
        let path = self.resolve(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, bytes).await?;
        debug!(key, size = bytes.len(), "wrote blob");
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let path = self.resolve(key);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        Ok(tokio::fs::try_exists(self.resolve(key)).await?)
    }
}

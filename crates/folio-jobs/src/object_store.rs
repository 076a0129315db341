//! Object storage for uploaded documents.

use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};

use folio_core::{ProcessingError, ProcessingResult, ProcessingStage};

/// Durable storage for raw uploaded bytes.
///
/// Puts are idempotent overwrites; deleting a missing key is not an error.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, key: &str, bytes: &[u8]) -> ProcessingResult<()>;
    async fn get(&self, key: &str) -> ProcessingResult<Vec<u8>>;
    async fn delete(&self, key: &str) -> ProcessingResult<()>;
}

/// Filesystem-backed object store rooted at a base directory.
pub struct FsObjectStore {
    base: PathBuf,
}

impl FsObjectStore {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    /// Resolve a key under the base directory. Keys must be relative and
    /// free of parent-directory components.
    fn resolve(&self, key: &str) -> ProcessingResult<PathBuf> {
        let path = Path::new(key);
        let valid = !key.is_empty()
            && path.is_relative()
            && path
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !valid {
            return Err(
                ProcessingError::dependency(format!("invalid storage key '{}'", key))
                    .at_stage(ProcessingStage::Validation),
            );
        }
        Ok(self.base.join(path))
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn put(&self, key: &str, bytes: &[u8]) -> ProcessingResult<()> {
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ProcessingError::from_io(e, ProcessingStage::Validation))?;
        }
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| ProcessingError::from_io(e, ProcessingStage::Validation))?;
        tracing::debug!(key, size = bytes.len(), "object stored");
        Ok(())
    }

    async fn get(&self, key: &str) -> ProcessingResult<Vec<u8>> {
        let path = self.resolve(key)?;
        tokio::fs::read(&path)
            .await
            .map_err(|e| ProcessingError::from_io(e, ProcessingStage::Validation))
    }

    async fn delete(&self, key: &str) -> ProcessingResult<()> {
        let path = self.resolve(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ProcessingError::from_io(e, ProcessingStage::Validation)),
        }
    }
}

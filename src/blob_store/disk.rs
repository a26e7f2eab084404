/// Disk-based blob storage backend
use crate::{
    blob_store::{BlobBackend, RemoveFailure},
    error::{AppError, AppResult},
};
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::fs;

/// Disk storage backend
///
/// Stores blobs on the local filesystem under their storage path. Paths are
/// relative keys like `messages/<id>/<file>`; traversal components are
/// rejected before they touch the filesystem.
#[derive(Clone)]
pub struct DiskBlobBackend {
    base_path: PathBuf,
    public_base_url: String,
}

impl DiskBlobBackend {
    /// Create a new disk storage backend
    pub fn new(base_path: PathBuf, public_base_url: String) -> Self {
        Self {
            base_path,
            public_base_url,
        }
    }

    /// Resolve a storage key to a filesystem path
    fn resolve(&self, path: &str) -> AppResult<PathBuf> {
        if path.is_empty() || path.split('/').any(|c| c.is_empty() || c == "." || c == "..") {
            return Err(AppError::Validation(format!(
                "Invalid storage path: {}",
                path
            )));
        }
        Ok(self.base_path.join(path))
    }

    /// Ensure the parent directory for a blob exists
    async fn ensure_parent(&self, path: &str) -> AppResult<PathBuf> {
        let blob_path = self.resolve(path)?;
        if let Some(parent) = blob_path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                AppError::BlobStorage(format!("Failed to create blob directory: {}", e))
            })?;
        }
        Ok(blob_path)
    }
}

#[async_trait]
impl BlobBackend for DiskBlobBackend {
    async fn put(&self, path: &str, data: Vec<u8>) -> AppResult<()> {
        let blob_path = self.ensure_parent(path).await?;

        fs::write(&blob_path, data)
            .await
            .map_err(|e| AppError::BlobStorage(format!("Failed to write blob {}: {}", path, e)))?;

        Ok(())
    }

    async fn get(&self, path: &str) -> AppResult<Option<Vec<u8>>> {
        let blob_path = self.resolve(path)?;

        match fs::read(&blob_path).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::BlobStorage(format!(
                "Failed to read blob {}: {}",
                path, e
            ))),
        }
    }

    async fn remove(&self, paths: &[String]) -> AppResult<Vec<RemoveFailure>> {
        let mut failures = Vec::new();

        for path in paths {
            let blob_path = match self.resolve(path) {
                Ok(p) => p,
                Err(e) => {
                    failures.push(RemoveFailure {
                        path: path.clone(),
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            match fs::remove_file(&blob_path).await {
                Ok(()) => {}
                // Already gone counts as removed (delete-if-exists)
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => failures.push(RemoveFailure {
                    path: path.clone(),
                    reason: e.to_string(),
                }),
            }
        }

        Ok(failures)
    }

    async fn exists(&self, path: &str) -> AppResult<bool> {
        let blob_path = self.resolve(path)?;
        Ok(blob_path.exists())
    }

    async fn size(&self, path: &str) -> AppResult<Option<u64>> {
        let blob_path = self.resolve(path)?;

        match fs::metadata(&blob_path).await {
            Ok(metadata) => Ok(Some(metadata.len())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::BlobStorage(format!(
                "Failed to get blob size {}: {}",
                path, e
            ))),
        }
    }

    fn public_url(&self, path: &str) -> String {
        format!("{}/{}", self.public_base_url.trim_end_matches('/'), path)
    }
}

/// Blob Storage Gateway
///
/// Handles binary file storage for message attachments (images, videos).
/// Supports multiple backend implementations (disk today; S3-compatible
/// stores fit the same trait).

pub mod disk;

pub use disk::DiskBlobBackend;

use crate::error::AppResult;
use async_trait::async_trait;

/// Per-path failure reported by a bulk remove
#[derive(Debug, Clone)]
pub struct RemoveFailure {
    pub path: String,
    pub reason: String,
}

/// Blob storage backend trait
///
/// Implementations must treat `remove` as delete-if-exists: a path that is
/// already absent is a success, not an error. Cleanup relies on this to stay
/// idempotent across concurrent runs.
#[async_trait]
pub trait BlobBackend: Send + Sync {
    /// Store a blob at the given path
    async fn put(&self, path: &str, data: Vec<u8>) -> AppResult<()>;

    /// Retrieve a blob by path
    async fn get(&self, path: &str) -> AppResult<Option<Vec<u8>>>;

    /// Remove blobs by path, returning per-path failures
    ///
    /// The call itself only errors if the backend is unreachable; individual
    /// failed paths come back in the result list.
    async fn remove(&self, paths: &[String]) -> AppResult<Vec<RemoveFailure>>;

    /// Check if a blob exists
    async fn exists(&self, path: &str) -> AppResult<bool>;

    /// Get the size of a blob in bytes
    async fn size(&self, path: &str) -> AppResult<Option<u64>>;

    /// Resolve the public URL for a stored path
    fn public_url(&self, path: &str) -> String;
}

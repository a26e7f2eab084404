/// Cleanup Engine
///
/// Finds expired media, deletes blobs then rows, and aggregates partial
/// failures into a `CleanupRun`. Every trigger surface (scheduled endpoint,
/// background job, manual dashboard action) funnels through this one
/// implementation.
use crate::{
    blob_store::BlobBackend,
    error::AppResult,
    media::{MediaAsset, MediaRecordStore},
    metrics,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

/// Result of one cleanup invocation
///
/// Produced fresh by every run, never merged across runs. `success` only
/// reflects the candidate fetch; per-item failures live in `errors`, which
/// callers must inspect to distinguish a fully clean run from a partial one.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupRun {
    pub success: bool,
    pub deleted_count: u64,
    pub total_expired: u64,
    pub errors: Option<Vec<String>>,
    pub timestamp: DateTime<Utc>,
}

impl CleanupRun {
    /// True when every candidate was fully removed
    pub fn is_fully_clean(&self) -> bool {
        self.success && self.errors.is_none()
    }
}

/// The central cleanup algorithm over the record store and storage gateway
#[derive(Clone)]
pub struct CleanupEngine {
    media_store: Arc<MediaRecordStore>,
    blob_store: Arc<dyn BlobBackend>,
}

impl CleanupEngine {
    pub fn new(media_store: Arc<MediaRecordStore>, blob_store: Arc<dyn BlobBackend>) -> Self {
        Self {
            media_store,
            blob_store,
        }
    }

    /// Run one cleanup pass
    ///
    /// Only a candidate-fetch failure is fatal and propagates to the caller.
    /// Each candidate is processed independently: a storage failure is
    /// recorded but never blocks the row delete, and a failed row delete
    /// leaves the row to be retried on the next run. Safe to invoke
    /// concurrently: the row delete is conditional on the row still
    /// existing, so two racing runs count each deletion exactly once.
    pub async fn run(&self) -> AppResult<CleanupRun> {
        let now = Utc::now();

        let candidates = self.media_store.list_expired(now).await?;
        let total_expired = candidates.len() as u64;

        info!("Found {} expired media files", total_expired);

        let mut deleted_count = 0u64;
        let mut errors: Vec<String> = Vec::new();

        for asset in &candidates {
            self.process_candidate(asset, &mut deleted_count, &mut errors)
                .await;
        }

        // Best-effort orphan sweep; never surfaces into the run result
        match self.media_store.prune_orphaned_messages(now).await {
            Ok(pruned) if pruned > 0 => info!("Deleted {} orphaned messages", pruned),
            Ok(_) => {}
            Err(e) => warn!("Orphaned message sweep failed: {}", e),
        }

        metrics::CLEANUP_RUNS_TOTAL.inc();
        metrics::CLEANUP_DELETED_TOTAL.inc_by(deleted_count);
        metrics::CLEANUP_ITEM_ERRORS_TOTAL.inc_by(errors.len() as u64);

        let run = CleanupRun {
            success: true,
            deleted_count,
            total_expired,
            errors: if errors.is_empty() {
                None
            } else {
                Some(errors)
            },
            timestamp: Utc::now(),
        };

        info!(
            deleted = run.deleted_count,
            total = run.total_expired,
            errors = run.errors.as_ref().map_or(0, |e| e.len()),
            "Cleanup completed"
        );

        Ok(run)
    }

    /// Process one candidate: blob first, thumbnail next, row last
    ///
    /// Storage deletion is always attempted before the row delete so a crash
    /// mid-item leaves an orphaned blob with its row intact (recovered next
    /// run), never a row pointing at a deleted blob.
    async fn process_candidate(
        &self,
        asset: &MediaAsset,
        deleted_count: &mut u64,
        errors: &mut Vec<String>,
    ) {
        let mut paths = vec![asset.file_path.clone()];
        if let Some(thumb) = &asset.thumbnail_path {
            paths.push(thumb.clone());
        }

        match self.blob_store.remove(&paths).await {
            Ok(failures) => {
                for failure in failures {
                    warn!("Failed to delete blob {}: {}", failure.path, failure.reason);
                    errors.push(format!("File {}: {}", failure.path, failure.reason));
                }
            }
            Err(e) => {
                warn!("Storage delete failed for media {}: {}", asset.id, e);
                errors.push(format!("File {}: {}", asset.file_path, e));
            }
        }

        match self.media_store.delete_media_by_id(&asset.id).await {
            Ok(true) => {
                *deleted_count += 1;
                info!("Deleted expired media: {}", asset.id);
            }
            // Row already gone (concurrent run); nothing to count
            Ok(false) => {}
            Err(e) => {
                warn!("Failed to delete media record {}: {}", asset.id, e);
                errors.push(format!("Record {}: {}", asset.id, e));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        blob_store::DiskBlobBackend,
        db,
        media::{MediaKind, ModerationStatus},
    };
    use chrono::Duration;
    use tempfile::tempdir;
    use uuid::Uuid;

    struct Fixture {
        engine: CleanupEngine,
        store: Arc<MediaRecordStore>,
        blobs: Arc<DiskBlobBackend>,
        _dir: tempfile::TempDir,
    }

    async fn fixture() -> Fixture {
        let dir = tempdir().unwrap();
        let blobs = Arc::new(DiskBlobBackend::new(
            dir.path().to_path_buf(),
            "http://localhost:8380/blob".to_string(),
        ));
        let store = Arc::new(MediaRecordStore::new(db::create_test_pool().await));
        let engine = CleanupEngine::new(Arc::clone(&store), blobs.clone());
        Fixture {
            engine,
            store,
            blobs,
            _dir: dir,
        }
    }

    async fn seed_expired_asset(f: &Fixture, with_blob: bool) -> MediaAsset {
        let profile_handle = format!("h{}", &Uuid::new_v4().simple().to_string()[..8]);
        let profile = f
            .store
            .create_profile(&profile_handle, "", "")
            .await
            .unwrap();
        let message = f
            .store
            .create_message(&profile.id, Some("msg"), "hash")
            .await
            .unwrap();

        let asset = MediaAsset {
            id: Uuid::new_v4().to_string(),
            message_id: message.id.clone(),
            media_kind: MediaKind::Image,
            file_path: format!("messages/{}/photo.jpg", message.id),
            thumbnail_path: Some(format!("messages/{}/thumb.jpg", message.id)),
            file_size: 4,
            mime_type: "image/jpeg".to_string(),
            width: None,
            height: None,
            duration_secs: None,
            moderation_status: ModerationStatus::Approved,
            created_at: Utc::now() - Duration::hours(2),
            expires_at: Utc::now() - Duration::hours(1),
        };

        if with_blob {
            f.blobs.put(&asset.file_path, b"blob".to_vec()).await.unwrap();
            f.blobs
                .put(asset.thumbnail_path.as_ref().unwrap(), b"thmb".to_vec())
                .await
                .unwrap();
        }

        f.store.insert_media(&asset).await.unwrap();
        asset
    }

    #[tokio::test]
    async fn test_run_deletes_expired_blob_and_row() {
        let f = fixture().await;
        let asset = seed_expired_asset(&f, true).await;

        let run = f.engine.run().await.unwrap();

        assert!(run.success);
        assert_eq!(run.total_expired, 1);
        assert_eq!(run.deleted_count, 1);
        assert!(run.errors.is_none());
        assert!(!f.blobs.exists(&asset.file_path).await.unwrap());
        assert!(f.store.list_all_media().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_run_is_idempotent() {
        let f = fixture().await;
        seed_expired_asset(&f, true).await;

        let first = f.engine.run().await.unwrap();
        assert_eq!(first.deleted_count, 1);
        assert_eq!(first.total_expired, 1);

        let second = f.engine.run().await.unwrap();
        assert_eq!(second.deleted_count, 0);
        assert_eq!(second.total_expired, 0);
        assert!(second.errors.is_none());
    }

    #[tokio::test]
    async fn test_missing_blob_still_deletes_row() {
        let f = fixture().await;
        let asset = seed_expired_asset(&f, false).await;

        let run = f.engine.run().await.unwrap();

        assert!(run.success);
        assert_eq!(run.deleted_count, 1);
        assert!(run.errors.is_none(), "missing blob must not be an error");
        assert!(f.store.list_all_media().await.unwrap().is_empty());
        let _ = asset;
    }

    #[tokio::test]
    async fn test_storage_failure_is_reported_and_row_still_deleted() {
        let f = fixture().await;
        let profile = f.store.create_profile("badpath", "", "").await.unwrap();
        let message = f
            .store
            .create_message(&profile.id, Some("msg"), "hash")
            .await
            .unwrap();

        // A path the disk backend refuses to resolve
        let asset = MediaAsset {
            id: Uuid::new_v4().to_string(),
            message_id: message.id.clone(),
            media_kind: MediaKind::Image,
            file_path: "../escape.jpg".to_string(),
            thumbnail_path: None,
            file_size: 4,
            mime_type: "image/jpeg".to_string(),
            width: None,
            height: None,
            duration_secs: None,
            moderation_status: ModerationStatus::Approved,
            created_at: Utc::now() - Duration::hours(2),
            expires_at: Utc::now() - Duration::hours(1),
        };
        f.store.insert_media(&asset).await.unwrap();

        let run = f.engine.run().await.unwrap();

        // The run itself succeeds; the storage failure is named but does not
        // block the row delete
        assert!(run.success);
        assert!(!run.is_fully_clean());
        assert_eq!(run.total_expired, 1);
        assert_eq!(run.deleted_count, 1);
        let errors = run.errors.expect("storage failure must be reported");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("../escape.jpg"));
        assert!(f.store.list_all_media().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_active_media_is_untouched() {
        let f = fixture().await;
        let profile = f.store.create_profile("alive", "", "").await.unwrap();
        let message = f
            .store
            .create_message(&profile.id, Some("msg"), "hash")
            .await
            .unwrap();

        let asset = MediaAsset {
            id: Uuid::new_v4().to_string(),
            message_id: message.id.clone(),
            media_kind: MediaKind::Image,
            file_path: format!("messages/{}/keep.jpg", message.id),
            thumbnail_path: None,
            file_size: 4,
            mime_type: "image/jpeg".to_string(),
            width: None,
            height: None,
            duration_secs: None,
            moderation_status: ModerationStatus::Approved,
            created_at: Utc::now(),
            expires_at: Utc::now() + Duration::hours(1),
        };
        f.blobs.put(&asset.file_path, b"keep".to_vec()).await.unwrap();
        f.store.insert_media(&asset).await.unwrap();

        let run = f.engine.run().await.unwrap();

        assert_eq!(run.total_expired, 0);
        assert_eq!(run.deleted_count, 0);
        assert!(f.blobs.exists(&asset.file_path).await.unwrap());
    }

    #[tokio::test]
    async fn test_concurrent_runs_count_each_asset_once() {
        let f = fixture().await;
        for _ in 0..5 {
            seed_expired_asset(&f, true).await;
        }

        let (a, b) = tokio::join!(f.engine.run(), f.engine.run());
        let a = a.unwrap();
        let b = b.unwrap();

        assert_eq!(a.deleted_count + b.deleted_count, 5);
        assert!(a.errors.is_none());
        assert!(b.errors.is_none());
        assert!(f.store.list_all_media().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_orphaned_messages_pruned_after_cleanup() {
        let f = fixture().await;
        let asset = seed_expired_asset(&f, true).await;

        // Strip the body so the message is media-only
        sqlx::query("UPDATE messages SET body = NULL WHERE id = ?1")
            .bind(&asset.message_id)
            .execute(f.store_pool())
            .await
            .unwrap();

        f.engine.run().await.unwrap();

        assert!(f
            .store
            .get_message(&asset.message_id)
            .await
            .unwrap()
            .is_none());
    }

    impl Fixture {
        fn store_pool(&self) -> &sqlx::SqlitePool {
            self.store.pool()
        }
    }
}

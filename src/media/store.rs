/// Media record store backed by SQLite
use crate::{
    error::{AppError, AppResult},
    media::{MediaAsset, MediaChange, MediaKind, Message, ModerationStatus, Profile, ProfileUpdate},
};
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Capacity of the change-notification channel; a lagging subscriber only
/// misses intermediate events and re-fetches on the next one
const CHANGE_CHANNEL_CAPACITY: usize = 64;

/// Store for media metadata rows and their owning messages/profiles
#[derive(Clone)]
pub struct MediaRecordStore {
    db: SqlitePool,
    changes: broadcast::Sender<MediaChange>,
}

impl MediaRecordStore {
    pub fn new(db: SqlitePool) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self { db, changes }
    }

    /// Subscribe to insert/delete notifications on the media table
    pub fn subscribe(&self) -> broadcast::Receiver<MediaChange> {
        self.changes.subscribe()
    }

    /// Underlying pool, for callers that need raw queries (tests, health)
    pub fn pool(&self) -> &SqlitePool {
        &self.db
    }

    fn notify(&self, change: MediaChange) {
        // No subscribers is fine; send only fails when nobody listens
        let _ = self.changes.send(change);
    }

    // ===== Profiles =====

    pub async fn create_profile(
        &self,
        handle: &str,
        display_name: &str,
        bio: &str,
    ) -> AppResult<Profile> {
        let profile = Profile {
            id: Uuid::new_v4().to_string(),
            handle: handle.to_string(),
            display_name: display_name.to_string(),
            bio: bio.to_string(),
            is_active: true,
            allow_media: true,
            created_at: Utc::now(),
        };

        let result = sqlx::query(
            r#"
            INSERT INTO profiles (id, handle, display_name, bio, is_active, allow_media, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&profile.id)
        .bind(&profile.handle)
        .bind(&profile.display_name)
        .bind(&profile.bio)
        .bind(profile.is_active)
        .bind(profile.allow_media)
        .bind(profile.created_at)
        .execute(&self.db)
        .await;

        match result {
            Ok(_) => Ok(profile),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Err(AppError::Conflict(
                format!("Handle already taken: {}", handle),
            )),
            Err(e) => Err(AppError::Database(e)),
        }
    }

    pub async fn get_profile_by_handle(&self, handle: &str) -> AppResult<Option<Profile>> {
        let row = sqlx::query(
            r#"
            SELECT id, handle, display_name, bio, is_active, allow_media, created_at
            FROM profiles
            WHERE handle = ?1
            "#,
        )
        .bind(handle)
        .fetch_optional(&self.db)
        .await?;

        row.map(|r| Self::map_profile(&r)).transpose()
    }

    pub async fn get_profile_by_id(&self, id: &str) -> AppResult<Option<Profile>> {
        let row = sqlx::query(
            r#"
            SELECT id, handle, display_name, bio, is_active, allow_media, created_at
            FROM profiles
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;

        row.map(|r| Self::map_profile(&r)).transpose()
    }

    /// Apply a partial settings update; absent fields keep their value
    ///
    /// Returns the updated profile, or None when the handle is unknown.
    pub async fn update_profile_settings(
        &self,
        handle: &str,
        update: ProfileUpdate,
    ) -> AppResult<Option<Profile>> {
        let result = sqlx::query(
            r#"
            UPDATE profiles SET
                display_name = COALESCE(?1, display_name),
                bio = COALESCE(?2, bio),
                allow_media = COALESCE(?3, allow_media),
                is_active = COALESCE(?4, is_active)
            WHERE handle = ?5
            "#,
        )
        .bind(&update.display_name)
        .bind(&update.bio)
        .bind(update.allow_media)
        .bind(update.is_active)
        .bind(handle)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_profile_by_handle(handle).await
    }

    // ===== Messages =====

    pub async fn create_message(
        &self,
        profile_id: &str,
        body: Option<&str>,
        sender_hash: &str,
    ) -> AppResult<Message> {
        let message = Message {
            id: Uuid::new_v4().to_string(),
            profile_id: profile_id.to_string(),
            body: body.map(String::from),
            sender_hash: sender_hash.to_string(),
            is_read: false,
            created_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO messages (id, profile_id, body, sender_hash, is_read, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&message.id)
        .bind(&message.profile_id)
        .bind(&message.body)
        .bind(&message.sender_hash)
        .bind(message.is_read)
        .bind(message.created_at)
        .execute(&self.db)
        .await?;

        Ok(message)
    }

    pub async fn get_message(&self, id: &str) -> AppResult<Option<Message>> {
        let row = sqlx::query(
            r#"
            SELECT id, profile_id, body, sender_hash, is_read, created_at
            FROM messages
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;

        row.map(|r| Self::map_message(&r)).transpose()
    }

    pub async fn list_messages_for_profile(&self, profile_id: &str) -> AppResult<Vec<Message>> {
        let rows = sqlx::query(
            r#"
            SELECT id, profile_id, body, sender_hash, is_read, created_at
            FROM messages
            WHERE profile_id = ?1
            ORDER BY created_at DESC
            "#,
        )
        .bind(profile_id)
        .fetch_all(&self.db)
        .await?;

        rows.iter().map(Self::map_message).collect()
    }

    /// Mark a message as read from the dashboard
    pub async fn mark_message_read(&self, id: &str) -> AppResult<bool> {
        let result = sqlx::query("UPDATE messages SET is_read = TRUE WHERE id = ?1")
            .bind(id)
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete a message row. Media rows cascade via the foreign key; blob
    /// deletion is the caller's responsibility.
    pub async fn delete_message(&self, id: &str) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM messages WHERE id = ?1")
            .bind(id)
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete messages that have no body and no surviving media
    ///
    /// Best-effort housekeeping invoked at the end of a cleanup run.
    pub async fn prune_orphaned_messages(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM messages
            WHERE (body IS NULL OR body = '')
              AND NOT EXISTS (
                  SELECT 1 FROM message_media
                  WHERE message_media.message_id = messages.id
                    AND message_media.expires_at > ?1
              )
            "#,
        )
        .bind(now)
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected())
    }

    // ===== Media =====

    pub async fn insert_media(&self, asset: &MediaAsset) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO message_media
                (id, message_id, media_kind, file_path, thumbnail_path, file_size,
                 mime_type, width, height, duration_secs, moderation_status,
                 created_at, expires_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
        )
        .bind(&asset.id)
        .bind(&asset.message_id)
        .bind(asset.media_kind.as_str())
        .bind(&asset.file_path)
        .bind(&asset.thumbnail_path)
        .bind(asset.file_size)
        .bind(&asset.mime_type)
        .bind(asset.width)
        .bind(asset.height)
        .bind(asset.duration_secs)
        .bind(asset.moderation_status.as_str())
        .bind(asset.created_at)
        .bind(asset.expires_at)
        .execute(&self.db)
        .await?;

        self.notify(MediaChange::Inserted {
            media_id: asset.id.clone(),
        });

        Ok(())
    }

    pub async fn count_media_for_message(&self, message_id: &str) -> AppResult<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM message_media WHERE message_id = ?1")
            .bind(message_id)
            .fetch_one(&self.db)
            .await?;

        Ok(row.try_get("n")?)
    }

    pub async fn list_media_for_message(&self, message_id: &str) -> AppResult<Vec<MediaAsset>> {
        let rows = sqlx::query(&format!(
            "{} WHERE message_id = ?1 ORDER BY created_at ASC",
            Self::SELECT_MEDIA
        ))
        .bind(message_id)
        .fetch_all(&self.db)
        .await?;

        rows.iter().map(Self::map_media).collect()
    }

    /// List all media rows, newest first (the monitor read path)
    pub async fn list_all_media(&self) -> AppResult<Vec<MediaAsset>> {
        let rows = sqlx::query(&format!(
            "{} ORDER BY created_at DESC",
            Self::SELECT_MEDIA
        ))
        .fetch_all(&self.db)
        .await?;

        rows.iter().map(Self::map_media).collect()
    }

    /// List media whose expiry has passed (the cleanup candidate set)
    pub async fn list_expired(&self, now: DateTime<Utc>) -> AppResult<Vec<MediaAsset>> {
        let rows = sqlx::query(&format!(
            "{} WHERE expires_at <= ?1 ORDER BY expires_at ASC",
            Self::SELECT_MEDIA
        ))
        .bind(now)
        .fetch_all(&self.db)
        .await?;

        rows.iter().map(Self::map_media).collect()
    }

    /// Find the asset owning a storage path (main file or thumbnail)
    pub async fn get_media_by_path(&self, path: &str) -> AppResult<Option<MediaAsset>> {
        let row = sqlx::query(&format!(
            "{} WHERE file_path = ?1 OR thumbnail_path = ?1",
            Self::SELECT_MEDIA
        ))
        .bind(path)
        .fetch_optional(&self.db)
        .await?;

        row.map(|r| Self::map_media(&r)).transpose()
    }

    /// Delete a media row by id
    ///
    /// Delete-if-exists: returns whether a row was actually removed, and an
    /// already-absent row is a no-op success. Concurrent cleanup runs rely
    /// on this to count each deletion exactly once.
    pub async fn delete_media_by_id(&self, id: &str) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM message_media WHERE id = ?1")
            .bind(id)
            .execute(&self.db)
            .await?;

        let deleted = result.rows_affected() > 0;
        if deleted {
            self.notify(MediaChange::Deleted {
                media_id: id.to_string(),
            });
        }

        Ok(deleted)
    }

    pub async fn set_moderation_status(
        &self,
        id: &str,
        status: ModerationStatus,
    ) -> AppResult<bool> {
        let result = sqlx::query("UPDATE message_media SET moderation_status = ?1 WHERE id = ?2")
            .bind(status.as_str())
            .bind(id)
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    // ===== Row mapping =====

    const SELECT_MEDIA: &'static str = r#"
        SELECT id, message_id, media_kind, file_path, thumbnail_path, file_size,
               mime_type, width, height, duration_secs, moderation_status,
               created_at, expires_at
        FROM message_media
    "#;

    fn map_media(row: &SqliteRow) -> AppResult<MediaAsset> {
        let kind: String = row.try_get("media_kind")?;
        let moderation: String = row.try_get("moderation_status")?;

        Ok(MediaAsset {
            id: row.try_get("id")?,
            message_id: row.try_get("message_id")?,
            media_kind: MediaKind::parse(&kind)?,
            file_path: row.try_get("file_path")?,
            thumbnail_path: row.try_get("thumbnail_path")?,
            file_size: row.try_get("file_size")?,
            mime_type: row.try_get("mime_type")?,
            width: row.try_get("width")?,
            height: row.try_get("height")?,
            duration_secs: row.try_get("duration_secs")?,
            moderation_status: ModerationStatus::parse(&moderation)?,
            created_at: row.try_get("created_at")?,
            expires_at: row.try_get("expires_at")?,
        })
    }

    fn map_message(row: &SqliteRow) -> AppResult<Message> {
        Ok(Message {
            id: row.try_get("id")?,
            profile_id: row.try_get("profile_id")?,
            body: row.try_get("body")?,
            sender_hash: row.try_get("sender_hash")?,
            is_read: row.try_get("is_read")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn map_profile(row: &SqliteRow) -> AppResult<Profile> {
        Ok(Profile {
            id: row.try_get("id")?,
            handle: row.try_get("handle")?,
            display_name: row.try_get("display_name")?,
            bio: row.try_get("bio")?,
            is_active: row.try_get("is_active")?,
            allow_media: row.try_get("allow_media")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use chrono::Duration;

    async fn test_store() -> MediaRecordStore {
        let pool = db::create_test_pool().await;
        MediaRecordStore::new(pool)
    }

    async fn seed_message(store: &MediaRecordStore) -> Message {
        let profile = store
            .create_profile("test_handle", "Test", "")
            .await
            .unwrap();
        store
            .create_message(&profile.id, Some("hello"), "abc123")
            .await
            .unwrap()
    }

    fn asset_for(message_id: &str, expires_at: DateTime<Utc>) -> MediaAsset {
        MediaAsset {
            id: Uuid::new_v4().to_string(),
            message_id: message_id.to_string(),
            media_kind: MediaKind::Image,
            file_path: format!("messages/{}/photo.jpg", message_id),
            thumbnail_path: None,
            file_size: 100,
            mime_type: "image/jpeg".to_string(),
            width: Some(10),
            height: Some(10),
            duration_secs: None,
            moderation_status: ModerationStatus::Pending,
            created_at: Utc::now(),
            expires_at,
        }
    }

    #[tokio::test]
    async fn test_duplicate_handle_is_conflict() {
        let store = test_store().await;
        store.create_profile("taken", "A", "").await.unwrap();

        let err = store.create_profile("taken", "B", "").await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_list_expired_filters_by_threshold() {
        let store = test_store().await;
        let message = seed_message(&store).await;
        let now = Utc::now();

        store
            .insert_media(&asset_for(&message.id, now - Duration::minutes(1)))
            .await
            .unwrap();
        store
            .insert_media(&asset_for(&message.id, now + Duration::hours(1)))
            .await
            .unwrap();

        let expired = store.list_expired(now).await.unwrap();
        assert_eq!(expired.len(), 1);

        let all = store.list_all_media().await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn test_delete_media_is_idempotent() {
        let store = test_store().await;
        let message = seed_message(&store).await;
        let asset = asset_for(&message.id, Utc::now());
        store.insert_media(&asset).await.unwrap();

        assert!(store.delete_media_by_id(&asset.id).await.unwrap());
        // Second delete is a no-op, not an error
        assert!(!store.delete_media_by_id(&asset.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_insert_and_delete_emit_change_events() {
        let store = test_store().await;
        let message = seed_message(&store).await;
        let mut rx = store.subscribe();

        let asset = asset_for(&message.id, Utc::now());
        store.insert_media(&asset).await.unwrap();
        store.delete_media_by_id(&asset.id).await.unwrap();

        assert!(matches!(
            rx.recv().await.unwrap(),
            MediaChange::Inserted { .. }
        ));
        assert!(matches!(
            rx.recv().await.unwrap(),
            MediaChange::Deleted { .. }
        ));
    }

    #[tokio::test]
    async fn test_prune_orphaned_messages() {
        let store = test_store().await;
        let profile = store.create_profile("pruner", "P", "").await.unwrap();
        let now = Utc::now();

        // Media-only message whose media has expired and been removed
        let orphan = store.create_message(&profile.id, None, "h1").await.unwrap();

        // Message with a body survives even with no media
        let with_body = store
            .create_message(&profile.id, Some("keep me"), "h2")
            .await
            .unwrap();

        // Media-only message with live media survives
        let live = store.create_message(&profile.id, None, "h3").await.unwrap();
        store
            .insert_media(&asset_for(&live.id, now + Duration::hours(1)))
            .await
            .unwrap();

        let pruned = store.prune_orphaned_messages(now).await.unwrap();
        assert_eq!(pruned, 1);

        assert!(store.get_message(&orphan.id).await.unwrap().is_none());
        assert!(store.get_message(&with_body.id).await.unwrap().is_some());
        assert!(store.get_message(&live.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_update_profile_settings() {
        let store = test_store().await;
        store.create_profile("owner", "Old", "").await.unwrap();

        let updated = store
            .update_profile_settings(
                "owner",
                ProfileUpdate {
                    display_name: Some("New".to_string()),
                    allow_media: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .unwrap();

        assert_eq!(updated.display_name, "New");
        assert!(!updated.allow_media);
        // Untouched fields keep their values
        assert!(updated.is_active);
        assert_eq!(updated.bio, "");

        let missing = store
            .update_profile_settings("nobody", ProfileUpdate::default())
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_mark_message_read() {
        let store = test_store().await;
        let message = seed_message(&store).await;
        assert!(!message.is_read);

        assert!(store.mark_message_read(&message.id).await.unwrap());
        let stored = store.get_message(&message.id).await.unwrap().unwrap();
        assert!(stored.is_read);

        assert!(!store.mark_message_read("missing").await.unwrap());
    }

    #[tokio::test]
    async fn test_set_moderation_status() {
        let store = test_store().await;
        let message = seed_message(&store).await;
        let asset = asset_for(&message.id, Utc::now() + Duration::hours(1));
        store.insert_media(&asset).await.unwrap();

        assert!(store
            .set_moderation_status(&asset.id, ModerationStatus::Approved)
            .await
            .unwrap());
        let stored = store.get_media_by_path(&asset.file_path).await.unwrap();
        assert_eq!(
            stored.unwrap().moderation_status,
            ModerationStatus::Approved
        );

        assert!(!store
            .set_moderation_status("missing", ModerationStatus::Rejected)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_message_delete_cascades_media_rows() {
        let store = test_store().await;
        let message = seed_message(&store).await;
        store
            .insert_media(&asset_for(&message.id, Utc::now()))
            .await
            .unwrap();

        assert!(store.delete_message(&message.id).await.unwrap());
        assert_eq!(
            store.list_media_for_message(&message.id).await.unwrap().len(),
            0
        );
    }
}

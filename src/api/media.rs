/// Media upload, blob serving, and the expiration status monitor surface
use crate::{
    api::middleware,
    context::AppContext,
    error::{AppError, AppResult},
    media::{MediaAsset, MediaKind, ModerationStatus},
    metrics,
    monitor::MonitorSnapshot,
};
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use image::ImageFormat;
use serde::Serialize;
use uuid::Uuid;

/// MIME types accepted for message attachments
const ALLOWED_TYPES: &[&str] = &[
    "image/jpeg",
    "image/png",
    "image/gif",
    "image/webp",
    "video/mp4",
    "video/quicktime",
    "video/webm",
];

/// Build media routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/messages/:id/media", post(upload_media))
        .route("/blob/*path", get(get_blob))
        .route("/api/media/status", get(media_status))
        .route("/api/media/status/refresh", post(refresh_media_status))
        .route("/api/media/:id/moderation", post(moderate_media))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MediaUploadResponse {
    #[serde(flatten)]
    asset: MediaAsset,
    url: String,
}

/// Attach a media file to a message
///
/// Accepts raw binary data with a Content-Type header. The blob is written
/// before the row is inserted so a crash never leaves a row pointing at a
/// missing blob.
async fn upload_media(
    State(ctx): State<AppContext>,
    Path(message_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<impl IntoResponse> {
    let message = ctx
        .media_store
        .get_message(&message_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Message not found: {}", message_id)))?;

    let profile = ctx
        .media_store
        .get_profile_by_id(&message.profile_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Message not found: {}", message_id)))?;
    if !profile.allow_media {
        return Err(AppError::Validation(
            "Profile does not accept media attachments".to_string(),
        ));
    }

    let mime_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(';').next().unwrap_or(v).trim().to_string())
        .ok_or_else(|| AppError::Validation("Content-Type header required".to_string()))?;

    validate_mime_type(&mime_type)?;
    let kind = MediaKind::from_mime(&mime_type)?;

    if body.len() > ctx.config.media.max_blob_size {
        return Err(AppError::Validation(format!(
            "Upload of {} bytes exceeds maximum of {} bytes",
            body.len(),
            ctx.config.media.max_blob_size
        )));
    }
    if body.is_empty() {
        return Err(AppError::Validation("Upload is empty".to_string()));
    }

    let attached = ctx.media_store.count_media_for_message(&message.id).await?;
    if attached >= ctx.config.media.max_per_message as i64 {
        return Err(AppError::Validation(format!(
            "Message already has the maximum of {} attachments",
            ctx.config.media.max_per_message
        )));
    }

    let data = body.to_vec();
    let dimensions = extract_image_dimensions(&data, &mime_type);

    let asset_id = Uuid::new_v4().to_string();
    let file_path = format!(
        "messages/{}/{}.{}",
        message.id,
        asset_id,
        extension_for(&mime_type)
    );

    // Best-effort; a failure stores the asset without a thumbnail
    let thumbnail = generate_thumbnail(&data, &mime_type, 256);

    ctx.blob_store.put(&file_path, data).await?;

    let thumbnail_path = match thumbnail {
        Some(thumb_data) => {
            let path = format!("messages/{}/{}_thumb.jpg", message.id, asset_id);
            ctx.blob_store.put(&path, thumb_data).await?;
            Some(path)
        }
        None => None,
    };

    let now = Utc::now();
    let asset = MediaAsset {
        id: asset_id,
        message_id: message.id.clone(),
        media_kind: kind,
        file_path,
        thumbnail_path,
        file_size: body.len() as i64,
        mime_type,
        width: dimensions.map(|(w, _)| w as i64),
        height: dimensions.map(|(_, h)| h as i64),
        duration_secs: None,
        moderation_status: ModerationStatus::Pending,
        created_at: now,
        expires_at: ctx.policy.expires_at(now, None),
    };

    ctx.media_store.insert_media(&asset).await?;
    metrics::MEDIA_UPLOADS_TOTAL.inc();

    let url = ctx.blob_store.public_url(&asset.file_path);
    Ok((
        StatusCode::CREATED,
        Json(MediaUploadResponse { asset, url }),
    ))
}

/// Serve a blob with content type and immutable caching
async fn get_blob(
    State(ctx): State<AppContext>,
    Path(path): Path<String>,
) -> AppResult<Response> {
    let data = ctx
        .blob_store
        .get(&path)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Blob not found: {}", path)))?;

    let mime_type = match ctx.media_store.get_media_by_path(&path).await? {
        // Thumbnails are always JPEG regardless of the original type
        Some(asset) if asset.thumbnail_path.as_deref() == Some(path.as_str()) => {
            "image/jpeg".to_string()
        }
        Some(asset) => asset.mime_type,
        None => "application/octet-stream".to_string(),
    };

    Ok(Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, mime_type)
        .header(header::CONTENT_LENGTH, data.len().to_string())
        .header(header::CACHE_CONTROL, "public, max-age=3600")
        .body(axum::body::Body::from(data))
        .map_err(|e| AppError::Internal(format!("Failed to build response: {}", e)))?)
}

/// Latest media status snapshot (dashboard)
async fn media_status(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
) -> AppResult<Json<MonitorSnapshot>> {
    middleware::require_bearer(&headers, &ctx.config.auth.dashboard_token, "dashboard")?;

    Ok(Json(ctx.monitor.latest()))
}

/// Explicit monitor refresh (dashboard)
async fn refresh_media_status(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
) -> AppResult<Json<MonitorSnapshot>> {
    middleware::require_bearer(&headers, &ctx.config.auth.dashboard_token, "dashboard")?;

    Ok(Json(ctx.monitor.refresh().await?))
}

#[derive(Debug, serde::Deserialize)]
struct ModerateMediaRequest {
    status: ModerationStatus,
}

/// Set the moderation state of a media asset (dashboard)
async fn moderate_media(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(req): Json<ModerateMediaRequest>,
) -> AppResult<StatusCode> {
    middleware::require_bearer(&headers, &ctx.config.auth.dashboard_token, "dashboard")?;

    let updated = ctx.media_store.set_moderation_status(&id, req.status).await?;
    if !updated {
        return Err(AppError::NotFound(format!("Media not found: {}", id)));
    }

    Ok(StatusCode::NO_CONTENT)
}

/// Validate MIME type is allowed
fn validate_mime_type(mime_type: &str) -> AppResult<()> {
    if ALLOWED_TYPES.contains(&mime_type) {
        Ok(())
    } else {
        Err(AppError::Validation(format!(
            "Unsupported MIME type: {}",
            mime_type
        )))
    }
}

/// File extension for a stored blob
fn extension_for(mime_type: &str) -> &'static str {
    match mime_type {
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "video/mp4" => "mp4",
        "video/quicktime" => "mov",
        "video/webm" => "webm",
        _ => "bin",
    }
}

/// Extract image dimensions from data
fn extract_image_dimensions(data: &[u8], mime_type: &str) -> Option<(u32, u32)> {
    if !mime_type.starts_with("image/") {
        return None;
    }

    match image::load_from_memory(data) {
        Ok(img) => Some((img.width(), img.height())),
        Err(e) => {
            tracing::warn!("Failed to extract image dimensions: {}", e);
            None
        }
    }
}

/// Generate a JPEG thumbnail for an image, preserving aspect ratio
fn generate_thumbnail(data: &[u8], mime_type: &str, max_size: u32) -> Option<Vec<u8>> {
    if !mime_type.starts_with("image/") {
        return None;
    }

    match image::load_from_memory(data) {
        Ok(img) => {
            let thumb = img.thumbnail(max_size, max_size);

            let mut buf = Vec::new();
            let mut cursor = std::io::Cursor::new(&mut buf);

            match thumb.to_rgb8().write_to(&mut cursor, ImageFormat::Jpeg) {
                Ok(_) => Some(buf),
                Err(e) => {
                    tracing::warn!("Failed to encode thumbnail: {}", e);
                    None
                }
            }
        }
        Err(e) => {
            tracing::warn!("Failed to generate thumbnail: {}", e);
            None
        }
    }
}

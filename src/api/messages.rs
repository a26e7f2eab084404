/// Anonymous message submission and dashboard message management
use crate::{
    api::middleware,
    context::AppContext,
    error::{AppError, AppResult},
    media::{MediaAsset, Message},
    metrics,
    validation::{format_file_size, format_time_ago},
};
use axum::{
    extract::{ConnectInfo, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tracing::warn;

/// Build message routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/profiles/:handle/messages", post(submit_message))
        .route("/api/messages", get(list_messages))
        .route("/api/messages/:id", delete(delete_message))
        .route("/api/messages/:id/read", post(mark_read))
}

#[derive(Debug, Deserialize)]
struct SubmitMessageRequest {
    body: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SubmitMessageResponse {
    id: String,
    created_at: chrono::DateTime<chrono::Utc>,
    media_upload_limit: u32,
}

#[derive(Debug, Deserialize)]
struct ListMessagesQuery {
    handle: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MessageView {
    #[serde(flatten)]
    message: Message,
    received: String,
    media: Vec<MediaView>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MediaView {
    #[serde(flatten)]
    asset: MediaAsset,
    url: String,
    thumbnail_url: Option<String>,
    size: String,
}

/// Submit an anonymous message to a profile
async fn submit_message(
    State(ctx): State<AppContext>,
    Path(handle): Path<String>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(req): Json<SubmitMessageRequest>,
) -> AppResult<impl IntoResponse> {
    let profile = ctx
        .media_store
        .get_profile_by_handle(&handle)
        .await?
        .filter(|p| p.is_active)
        .ok_or_else(|| AppError::NotFound(format!("Profile not found: {}", handle)))?;

    let sender = middleware::sender_hash(&headers, &peer);

    if ctx.config.rate_limit.enabled && !ctx.rate_limiter.check_default(&sender) {
        return Err(AppError::RateLimitExceeded {
            retry_after: ctx.rate_limiter.remaining_time(&sender),
        });
    }

    let body = req
        .body
        .as_deref()
        .map(str::trim)
        .filter(|b| !b.is_empty());
    if let Some(body) = body {
        if body.len() > 2000 {
            return Err(AppError::Validation(
                "Message body must be at most 2000 characters".to_string(),
            ));
        }
    }

    let message = ctx
        .media_store
        .create_message(&profile.id, body, &sender)
        .await?;

    metrics::MESSAGES_RECEIVED_TOTAL.inc();

    Ok((
        StatusCode::CREATED,
        Json(SubmitMessageResponse {
            id: message.id,
            created_at: message.created_at,
            media_upload_limit: if profile.allow_media {
                ctx.config.media.max_per_message
            } else {
                0
            },
        }),
    ))
}

/// List messages for a profile with their media (dashboard)
async fn list_messages(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
    Query(query): Query<ListMessagesQuery>,
) -> AppResult<Json<Vec<MessageView>>> {
    middleware::require_bearer(&headers, &ctx.config.auth.dashboard_token, "dashboard")?;

    let profile = ctx
        .media_store
        .get_profile_by_handle(&query.handle)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Profile not found: {}", query.handle)))?;

    let now = Utc::now();
    let messages = ctx.media_store.list_messages_for_profile(&profile.id).await?;

    let mut views = Vec::with_capacity(messages.len());
    for message in messages {
        let media = ctx.media_store.list_media_for_message(&message.id).await?;
        let media = media
            .into_iter()
            .map(|asset| MediaView {
                url: ctx.blob_store.public_url(&asset.file_path),
                thumbnail_url: asset
                    .thumbnail_path
                    .as_deref()
                    .map(|p| ctx.blob_store.public_url(p)),
                size: format_file_size(asset.file_size),
                asset,
            })
            .collect();

        views.push(MessageView {
            received: format_time_ago(message.created_at, now),
            message,
            media,
        });
    }

    Ok(Json(views))
}

/// Mark a message as read (dashboard)
async fn mark_read(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    middleware::require_bearer(&headers, &ctx.config.auth.dashboard_token, "dashboard")?;

    if !ctx.media_store.mark_message_read(&id).await? {
        return Err(AppError::NotFound(format!("Message not found: {}", id)));
    }

    Ok(StatusCode::NO_CONTENT)
}

/// Delete a message and its media (dashboard)
///
/// Blobs are removed before the rows so a failure leaves rows for the
/// cleanup engine to retry, never dangling rows without blobs.
async fn delete_message(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    middleware::require_bearer(&headers, &ctx.config.auth.dashboard_token, "dashboard")?;

    let message = ctx
        .media_store
        .get_message(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Message not found: {}", id)))?;

    let media = ctx.media_store.list_media_for_message(&message.id).await?;
    let mut paths = Vec::new();
    for asset in &media {
        paths.push(asset.file_path.clone());
        if let Some(thumb) = &asset.thumbnail_path {
            paths.push(thumb.clone());
        }
    }

    if !paths.is_empty() {
        match ctx.blob_store.remove(&paths).await {
            Ok(failures) => {
                for failure in failures {
                    warn!(
                        "Failed to delete blob {} for message {}: {}",
                        failure.path, id, failure.reason
                    );
                }
            }
            Err(e) => warn!("Storage delete failed for message {}: {}", id, e),
        }
    }

    // Media rows cascade with the message row
    ctx.media_store.delete_message(&id).await?;

    Ok(StatusCode::NO_CONTENT)
}

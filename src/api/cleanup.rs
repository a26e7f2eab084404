/// Cleanup trigger surfaces: the scheduled endpoint and the manual action
///
/// Both invoke the one shared engine; neither duplicates any cleanup logic.
use crate::{api::middleware, cleanup::CleanupRun, context::AppContext, error::AppError};
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use chrono::Utc;
use serde::Serialize;
use tracing::error;

/// Build cleanup routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/internal/cleanup", post(scheduled_cleanup))
        .route("/api/cleanup", post(manual_cleanup))
}

/// Failure body for the scheduled endpoint
#[derive(Debug, Serialize)]
struct CleanupFailure {
    success: bool,
    error: String,
    timestamp: chrono::DateTime<chrono::Utc>,
}

/// Scheduled cleanup, invoked by an external time-based caller
///
/// Safe to re-invoke while a previous run is still in flight; overlapping
/// runs each count a given asset at most once.
async fn scheduled_cleanup(State(ctx): State<AppContext>, headers: HeaderMap) -> Response {
    if let Err(e) =
        middleware::require_bearer(&headers, &ctx.config.auth.cleanup_token, "scheduled cleanup")
    {
        return e.into_response();
    }

    match crate::jobs::tasks::cleanup_expired_media(&ctx).await {
        Ok(run) => (StatusCode::OK, Json(run)).into_response(),
        Err(e) => {
            error!("Scheduled cleanup failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(CleanupFailure {
                    success: false,
                    error: e.to_string(),
                    timestamp: Utc::now(),
                }),
            )
                .into_response()
        }
    }
}

/// Manual cleanup from the dashboard
///
/// Rejects a second submission while one is in flight, then refreshes the
/// status monitor so the dashboard reflects the result.
async fn manual_cleanup(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
) -> Result<Json<CleanupRun>, AppError> {
    middleware::require_bearer(&headers, &ctx.config.auth.dashboard_token, "dashboard")?;

    let _guard = ctx
        .manual_cleanup_gate
        .try_lock()
        .map_err(|_| AppError::Conflict("Cleanup already in progress".to_string()))?;

    let run = crate::jobs::tasks::cleanup_expired_media(&ctx).await?;

    Ok(Json(run))
}

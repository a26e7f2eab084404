/// Profile claiming, settings, and public lookup
use crate::{
    api::middleware,
    context::AppContext,
    error::{AppError, AppResult},
    media::{Profile, ProfileUpdate},
    validation::validate_handle,
};
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

/// Build profile routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/profiles", post(claim_profile))
        .route(
            "/api/profiles/:handle",
            get(get_profile).patch(update_profile),
        )
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClaimProfileRequest {
    handle: String,
    #[serde(default)]
    display_name: String,
    #[serde(default)]
    bio: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PublicProfile {
    handle: String,
    display_name: String,
    bio: String,
    allow_media: bool,
}

/// Claim a handle (dashboard credential required)
async fn claim_profile(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
    Json(req): Json<ClaimProfileRequest>,
) -> AppResult<impl IntoResponse> {
    middleware::require_bearer(&headers, &ctx.config.auth.dashboard_token, "dashboard")?;

    validate_handle(&req.handle)?;

    let profile = ctx
        .media_store
        .create_profile(&req.handle, &req.display_name, &req.bio)
        .await?;

    Ok((StatusCode::CREATED, Json(profile)))
}

/// Update profile settings (dashboard credential required)
///
/// Partial update; omitted fields keep their value. Flipping `allowMedia`
/// off stops new uploads immediately but leaves existing media to expire
/// on its own schedule.
async fn update_profile(
    State(ctx): State<AppContext>,
    Path(handle): Path<String>,
    headers: HeaderMap,
    Json(update): Json<ProfileUpdate>,
) -> AppResult<Json<Profile>> {
    middleware::require_bearer(&headers, &ctx.config.auth.dashboard_token, "dashboard")?;

    let profile = ctx
        .media_store
        .update_profile_settings(&handle, update)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Profile not found: {}", handle)))?;

    Ok(Json(profile))
}

/// Public profile lookup by handle
async fn get_profile(
    State(ctx): State<AppContext>,
    Path(handle): Path<String>,
) -> AppResult<Json<PublicProfile>> {
    let profile = ctx
        .media_store
        .get_profile_by_handle(&handle)
        .await?
        .filter(|p| p.is_active)
        .ok_or_else(|| AppError::NotFound(format!("Profile not found: {}", handle)))?;

    Ok(Json(PublicProfile {
        handle: profile.handle,
        display_name: profile.display_name,
        bio: profile.bio,
        allow_media: profile.allow_media,
    }))
}

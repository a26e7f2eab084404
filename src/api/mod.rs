/// API routes and handlers
pub mod cleanup;
pub mod media;
pub mod messages;
pub mod middleware;
pub mod profiles;

use crate::context::AppContext;
use axum::Router;

/// Build API routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .merge(profiles::routes())
        .merge(messages::routes())
        .merge(media::routes())
        .merge(cleanup::routes())
}

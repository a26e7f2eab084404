/// Background task implementations
use crate::{cleanup::CleanupRun, context::AppContext, error::AppResult};

/// Run one cleanup pass through the shared engine and refresh the monitor
pub async fn cleanup_expired_media(ctx: &AppContext) -> AppResult<CleanupRun> {
    let run = ctx.cleanup_engine.run().await?;

    // Keep the status view current; a failed refresh is not a cleanup failure
    if let Err(e) = ctx.monitor.refresh().await {
        tracing::warn!("Monitor refresh after cleanup failed: {}", e);
    }

    Ok(run)
}

/// Evict rate limiter records whose window has elapsed
pub fn sweep_rate_limiter(ctx: &AppContext) -> usize {
    ctx.rate_limiter.sweep_stale()
}

/// Health check - verify the database is reachable
pub async fn health_check(ctx: &AppContext) -> AppResult<()> {
    sqlx::query("SELECT 1").fetch_one(&ctx.db).await?;

    Ok(())
}

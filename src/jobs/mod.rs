use std::sync::Arc;
use tokio::time::{interval, Duration};
use tracing::{error, info};

pub mod tasks;

/// Job scheduler for background tasks
pub struct JobScheduler {
    context: Arc<crate::context::AppContext>,
}

impl JobScheduler {
    pub fn new(context: Arc<crate::context::AppContext>) -> Self {
        Self { context }
    }

    /// Start all background jobs
    pub fn start(self: Arc<Self>) {
        info!("Starting background job scheduler");

        tokio::spawn(Self::media_cleanup_job(Arc::clone(&self)));
        tokio::spawn(Self::rate_limit_sweep_job(Arc::clone(&self)));
        tokio::spawn(Self::health_check_job(Arc::clone(&self)));

        // The status monitor runs its own refresh loop
        Arc::clone(&self.context.monitor).spawn(Duration::from_secs(
            self.context.config.media.monitor_poll_secs,
        ));

        info!("Background jobs started");
    }

    /// Cleanup expired media (default: every 15 minutes)
    ///
    /// The same engine also serves the scheduled HTTP endpoint and the
    /// manual dashboard trigger; overlapping runs are safe.
    async fn media_cleanup_job(scheduler: Arc<Self>) {
        let mut interval = interval(Duration::from_secs(
            scheduler.context.config.media.cleanup_interval_secs,
        ));

        loop {
            interval.tick().await;
            info!("Running scheduled media cleanup");

            match tasks::cleanup_expired_media(&scheduler.context).await {
                Ok(run) if run.is_fully_clean() => {
                    if run.deleted_count > 0 {
                        info!(
                            "Cleaned up {} of {} expired media files",
                            run.deleted_count, run.total_expired
                        );
                    } else {
                        info!("Media cleanup: no expired media found");
                    }
                }
                Ok(run) => error!(
                    "Media cleanup deleted {} of {} with {} item errors",
                    run.deleted_count,
                    run.total_expired,
                    run.errors.as_ref().map_or(0, |e| e.len())
                ),
                Err(e) => error!("Failed to run media cleanup: {}", e),
            }
        }
    }

    /// Sweep stale rate limiter records (default: every 5 minutes)
    async fn rate_limit_sweep_job(scheduler: Arc<Self>) {
        let mut interval = interval(Duration::from_secs(
            scheduler.context.config.rate_limit.sweep_interval_secs,
        ));

        loop {
            interval.tick().await;

            let removed = tasks::sweep_rate_limiter(&scheduler.context);
            if removed > 0 {
                info!("Swept {} stale rate limit records", removed);
            }
        }
    }

    /// Health check job (runs every 5 minutes)
    async fn health_check_job(scheduler: Arc<Self>) {
        let mut interval = interval(Duration::from_secs(300));

        loop {
            interval.tick().await;

            match tasks::health_check(&scheduler.context).await {
                Ok(_) => {
                    // Silent success - health is good
                }
                Err(e) => error!("Health check failed: {}", e),
            }
        }
    }
}

/// Application context and dependency injection
use crate::{
    blob_store::{BlobBackend, DiskBlobBackend},
    cleanup::CleanupEngine,
    config::ServerConfig,
    db,
    error::AppResult,
    expiration::ExpirationPolicy,
    media::MediaRecordStore,
    monitor::ExpirationMonitor,
    rate_limit::{RateLimitConfig, RateLimiter},
};
use sqlx::SqlitePool;
use std::sync::Arc;

/// Application context holding all shared services
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<ServerConfig>,
    pub db: SqlitePool,
    pub media_store: Arc<MediaRecordStore>,
    pub blob_store: Arc<dyn BlobBackend>,
    pub policy: ExpirationPolicy,
    pub cleanup_engine: Arc<CleanupEngine>,
    pub monitor: Arc<ExpirationMonitor>,
    pub rate_limiter: Arc<RateLimiter>,
    /// Guard against concurrent manual cleanup submissions; the engine
    /// itself is safe to run concurrently, this only backs the dashboard's
    /// "disabled while in flight" behavior
    pub manual_cleanup_gate: Arc<tokio::sync::Mutex<()>>,
}

impl AppContext {
    /// Create a new application context from configuration
    pub async fn new(config: ServerConfig) -> AppResult<Self> {
        config.validate()?;

        Self::ensure_directories(&config).await?;

        let pool = db::create_pool(&config.storage.database, db::DatabaseOptions::default()).await?;
        db::run_migrations(&pool).await?;
        db::test_connection(&pool).await?;

        let media_store = Arc::new(MediaRecordStore::new(pool.clone()));

        let blob_store: Arc<dyn BlobBackend> = Arc::new(DiskBlobBackend::new(
            config.storage.blob_location.clone(),
            config.storage.public_blob_url.clone(),
        ));

        let policy = ExpirationPolicy::new(chrono::Duration::seconds(
            config.media.retention_secs as i64,
        ));

        let cleanup_engine = Arc::new(CleanupEngine::new(
            Arc::clone(&media_store),
            Arc::clone(&blob_store),
        ));

        let monitor = Arc::new(ExpirationMonitor::new(Arc::clone(&media_store), policy));

        let rate_limiter = Arc::new(RateLimiter::new(RateLimitConfig {
            max_attempts: config.rate_limit.max_attempts,
            window: std::time::Duration::from_secs(config.rate_limit.window_secs),
        }));

        Ok(Self {
            config: Arc::new(config),
            db: pool,
            media_store,
            blob_store,
            policy,
            cleanup_engine,
            monitor,
            rate_limiter,
            manual_cleanup_gate: Arc::new(tokio::sync::Mutex::new(())),
        })
    }

    /// Ensure required directories exist
    async fn ensure_directories(config: &ServerConfig) -> AppResult<()> {
        tokio::fs::create_dir_all(&config.storage.data_directory).await?;
        tokio::fs::create_dir_all(&config.storage.blob_location).await?;
        Ok(())
    }

    /// Get service URL
    pub fn service_url(&self) -> String {
        format!(
            "http://{}:{}",
            self.config.service.hostname, self.config.service.port
        )
    }
}

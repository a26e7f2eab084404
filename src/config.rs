/// Configuration management for Whisperbox
use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Main server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub service: ServiceConfig,
    pub storage: StorageConfig,
    pub media: MediaConfig,
    pub auth: AuthConfig,
    pub rate_limit: RateLimitSettings,
    pub logging: LoggingConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub hostname: String,
    pub port: u16,
    pub version: String,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_directory: PathBuf,
    pub database: PathBuf,
    pub blob_location: PathBuf,
    pub public_blob_url: String,
}

/// Media lifecycle configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    /// Retention window in seconds applied to every upload
    ///
    /// The original product shipped with two conflicting windows (1 hour and
    /// 30 days); this is a single explicit value pending product
    /// clarification. See DESIGN.md.
    pub retention_secs: u64,
    /// Maximum upload size in bytes
    pub max_blob_size: usize,
    /// Maximum attachments per message
    pub max_per_message: u32,
    /// Interval between scheduled cleanup runs, in seconds
    pub cleanup_interval_secs: u64,
    /// Interval between status monitor refreshes, in seconds
    pub monitor_poll_secs: u64,
}

/// Credentials for the two authenticated surfaces
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Bearer credential for the scheduled cleanup endpoint
    pub cleanup_token: String,
    /// Bearer credential for dashboard routes
    pub dashboard_token: String,
}

/// Rate limiting configuration for message submission
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitSettings {
    pub enabled: bool,
    pub max_attempts: u32,
    pub window_secs: u64,
    /// Interval between stale-record sweeps, in seconds
    pub sweep_interval_secs: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> AppResult<Self> {
        dotenv::dotenv().ok();

        let hostname = env::var("WBX_HOSTNAME").unwrap_or_else(|_| "localhost".to_string());
        let port = env::var("WBX_PORT")
            .unwrap_or_else(|_| "8380".to_string())
            .parse()
            .map_err(|_| AppError::Validation("Invalid port number".to_string()))?;
        let version = env::var("WBX_VERSION").unwrap_or_else(|_| "0.1.0".to_string());

        let data_directory: PathBuf = env::var("WBX_DATA_DIRECTORY")
            .unwrap_or_else(|_| "./data".to_string())
            .into();
        let database = env::var("WBX_DB_LOCATION")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_directory.join("whisperbox.sqlite"));
        let blob_location = env::var("WBX_BLOB_LOCATION")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_directory.join("blobs"));
        let public_blob_url = env::var("WBX_PUBLIC_BLOB_URL")
            .unwrap_or_else(|_| format!("http://{}:{}/blob", hostname, port));

        let retention_secs = env::var("WBX_MEDIA_RETENTION_SECS")
            .unwrap_or_else(|_| "3600".to_string())
            .parse()
            .unwrap_or(3600);
        let max_blob_size = env::var("WBX_MAX_BLOB_SIZE")
            .unwrap_or_else(|_| "10485760".to_string())
            .parse()
            .unwrap_or(10 * 1024 * 1024);
        let max_per_message = env::var("WBX_MAX_MEDIA_PER_MESSAGE")
            .unwrap_or_else(|_| "4".to_string())
            .parse()
            .unwrap_or(4);
        let cleanup_interval_secs = env::var("WBX_CLEANUP_INTERVAL_SECS")
            .unwrap_or_else(|_| "900".to_string())
            .parse()
            .unwrap_or(900);
        let monitor_poll_secs = env::var("WBX_MONITOR_POLL_SECS")
            .unwrap_or_else(|_| "30".to_string())
            .parse()
            .unwrap_or(30);

        let cleanup_token = env::var("WBX_CLEANUP_TOKEN")
            .map_err(|_| AppError::Validation("Cleanup token required".to_string()))?;
        let dashboard_token = env::var("WBX_DASHBOARD_TOKEN")
            .map_err(|_| AppError::Validation("Dashboard token required".to_string()))?;

        let rate_limit_enabled = env::var("WBX_RATE_LIMIT_ENABLED")
            .unwrap_or_else(|_| "true".to_string())
            .parse()
            .unwrap_or(true);
        let max_attempts = env::var("WBX_RATE_LIMIT_MAX_ATTEMPTS")
            .unwrap_or_else(|_| "5".to_string())
            .parse()
            .unwrap_or(5);
        let window_secs = env::var("WBX_RATE_LIMIT_WINDOW_SECS")
            .unwrap_or_else(|_| "60".to_string())
            .parse()
            .unwrap_or(60);
        let sweep_interval_secs = env::var("WBX_RATE_LIMIT_SWEEP_SECS")
            .unwrap_or_else(|_| "300".to_string())
            .parse()
            .unwrap_or(300);

        let log_level = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        Ok(ServerConfig {
            service: ServiceConfig {
                hostname,
                port,
                version,
            },
            storage: StorageConfig {
                data_directory,
                database,
                blob_location,
                public_blob_url,
            },
            media: MediaConfig {
                retention_secs,
                max_blob_size,
                max_per_message,
                cleanup_interval_secs,
                monitor_poll_secs,
            },
            auth: AuthConfig {
                cleanup_token,
                dashboard_token,
            },
            rate_limit: RateLimitSettings {
                enabled: rate_limit_enabled,
                max_attempts,
                window_secs,
                sweep_interval_secs,
            },
            logging: LoggingConfig { level: log_level },
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> AppResult<()> {
        if self.service.hostname.is_empty() {
            return Err(AppError::Validation("Hostname cannot be empty".to_string()));
        }

        if self.auth.cleanup_token.len() < 16 {
            return Err(AppError::Validation(
                "Cleanup token must be at least 16 characters".to_string(),
            ));
        }

        if self.auth.dashboard_token.len() < 16 {
            return Err(AppError::Validation(
                "Dashboard token must be at least 16 characters".to_string(),
            ));
        }

        if self.media.retention_secs == 0 {
            return Err(AppError::Validation(
                "Media retention must be positive".to_string(),
            ));
        }

        Ok(())
    }
}

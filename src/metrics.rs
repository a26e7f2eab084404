/// Metrics and telemetry for Whisperbox
///
/// Prometheus-compatible counters for:
/// - Cleanup runs and deletions
/// - Message and media submissions
/// - Rate limiter decisions

use lazy_static::lazy_static;
use prometheus::{
    register_int_counter, register_int_gauge, Encoder, IntCounter, IntGauge, TextEncoder,
};

lazy_static! {
    // ========== Cleanup ==========

    /// Total cleanup runs, regardless of trigger surface
    pub static ref CLEANUP_RUNS_TOTAL: IntCounter = register_int_counter!(
        "cleanup_runs_total",
        "Total number of cleanup runs"
    )
    .unwrap();

    /// Media rows actually deleted by cleanup
    pub static ref CLEANUP_DELETED_TOTAL: IntCounter = register_int_counter!(
        "cleanup_deleted_total",
        "Total media assets deleted by cleanup"
    )
    .unwrap();

    /// Per-item cleanup errors (storage or record failures)
    pub static ref CLEANUP_ITEM_ERRORS_TOTAL: IntCounter = register_int_counter!(
        "cleanup_item_errors_total",
        "Total per-item cleanup errors"
    )
    .unwrap();

    // ========== Submission ==========

    /// Anonymous messages accepted
    pub static ref MESSAGES_RECEIVED_TOTAL: IntCounter = register_int_counter!(
        "messages_received_total",
        "Total anonymous messages received"
    )
    .unwrap();

    /// Media uploads accepted
    pub static ref MEDIA_UPLOADS_TOTAL: IntCounter = register_int_counter!(
        "media_uploads_total",
        "Total media uploads accepted"
    )
    .unwrap();

    /// Submissions rejected by the rate limiter
    pub static ref RATE_LIMITED_TOTAL: IntCounter = register_int_counter!(
        "rate_limited_total",
        "Total submissions rejected by the rate limiter"
    )
    .unwrap();

    /// Keys currently tracked by the rate limiter
    pub static ref RATE_LIMIT_KEYS: IntGauge = register_int_gauge!(
        "rate_limit_keys",
        "Number of keys currently tracked by the rate limiter"
    )
    .unwrap();
}

/// Render all registered metrics in Prometheus text format
pub fn gather() -> String {
    let encoder = TextEncoder::new();
    let families = prometheus::gather();
    let mut buffer = Vec::new();
    if encoder.encode(&families, &mut buffer).is_err() {
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

/// Media expiration policy
///
/// Pure status computation for expiring media: given timestamps and a
/// retention window, classify an asset and render a countdown. All
/// functions are deterministic for a given `now`; nothing here touches
/// the database or storage.
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Assets within this many minutes of their expiry are flagged as expiring soon
pub const EXPIRING_SOON_MINUTES: i64 = 10;

/// Expiring-soon threshold as a duration
pub fn expiring_soon_window() -> Duration {
    Duration::minutes(EXPIRING_SOON_MINUTES)
}

/// Countdown rendering for already-expired assets. Callers interpret this
/// as "expired", never as a literal negative countdown.
pub const EXPIRED_SENTINEL: &str = "-00:00:00";

/// Lifecycle classification of a media asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExpirationStatus {
    Active,
    ExpiringSoon,
    Expired,
}

/// Expiration policy with a single configurable retention window
///
/// The retention default is deliberately a configuration value rather than
/// a constant; see DESIGN.md for the open question around the window length.
#[derive(Debug, Clone, Copy)]
pub struct ExpirationPolicy {
    retention: Duration,
}

impl ExpirationPolicy {
    pub fn new(retention: Duration) -> Self {
        Self { retention }
    }

    /// Retention window applied when no explicit expiry is stored
    pub fn retention(&self) -> Duration {
        self.retention
    }

    /// Effective expiry: the explicit timestamp when present, otherwise
    /// creation time plus the retention window
    pub fn expires_at(
        &self,
        created_at: DateTime<Utc>,
        explicit: Option<DateTime<Utc>>,
    ) -> DateTime<Utc> {
        explicit.unwrap_or(created_at + self.retention)
    }

    /// Signed time remaining until expiry
    pub fn time_remaining(&self, expires_at: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
        expires_at - now
    }

    /// Classify an asset given its remaining lifetime
    pub fn status(&self, remaining: Duration) -> ExpirationStatus {
        if remaining <= Duration::zero() {
            ExpirationStatus::Expired
        } else if remaining <= expiring_soon_window() {
            ExpirationStatus::ExpiringSoon
        } else {
            ExpirationStatus::Active
        }
    }
}

/// Render a countdown as `HH:MM:SS`
///
/// Non-positive durations render the expired sentinel.
pub fn format_countdown(remaining: Duration) -> String {
    let ms = remaining.num_milliseconds();
    if ms <= 0 {
        return EXPIRED_SENTINEL.to_string();
    }

    let total_secs = ms / 1000;
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;

    format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
}

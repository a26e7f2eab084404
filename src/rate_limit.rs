/// Rate Limiting System
///
/// Keyed fixed-window limiter used to throttle anonymous message
/// submission. Each key holds an attempt counter and a window-reset
/// instant; the read-modify-write is guarded by a mutex so two racing
/// requests cannot both claim the last slot. Stale records are swept by a
/// background job rather than growing without bound.
use crate::metrics;
use std::{
    collections::HashMap,
    sync::Mutex,
    time::{Duration, Instant},
};

/// Per-key attempt record
#[derive(Debug, Clone, Copy)]
struct RateLimitRecord {
    count: u32,
    reset_at: Instant,
}

/// Rate limiter configuration
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Attempts allowed per key per window
    pub max_attempts: u32,
    /// Window length
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            window: Duration::from_secs(60),
        }
    }
}

/// Keyed fixed-window rate limiter
pub struct RateLimiter {
    attempts: Mutex<HashMap<String, RateLimitRecord>>,
    config: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            attempts: Mutex::new(HashMap::new()),
            config,
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Check and consume one attempt for `key` using the configured limits
    pub fn check_default(&self, key: &str) -> bool {
        self.check(key, self.config.max_attempts, self.config.window)
    }

    /// Check and consume one attempt for `key`
    ///
    /// First call for a key, or any call after its window elapsed, starts a
    /// fresh window with count 1 and allows. Within a window, attempts are
    /// allowed until `max_attempts` is reached; rejected calls do not
    /// consume an attempt.
    pub fn check(&self, key: &str, max_attempts: u32, window: Duration) -> bool {
        let now = Instant::now();
        let mut attempts = self.attempts.lock().expect("rate limiter lock poisoned");

        match attempts.get_mut(key) {
            Some(record) if now < record.reset_at => {
                if record.count >= max_attempts {
                    metrics::RATE_LIMITED_TOTAL.inc();
                    return false;
                }
                record.count += 1;
                true
            }
            _ => {
                attempts.insert(
                    key.to_string(),
                    RateLimitRecord {
                        count: 1,
                        reset_at: now + window,
                    },
                );
                metrics::RATE_LIMIT_KEYS.set(attempts.len() as i64);
                true
            }
        }
    }

    /// Time until the window for `key` resets; zero when no window is open
    pub fn remaining_time(&self, key: &str) -> Duration {
        let attempts = self.attempts.lock().expect("rate limiter lock poisoned");
        match attempts.get(key) {
            Some(record) => record.reset_at.saturating_duration_since(Instant::now()),
            None => Duration::ZERO,
        }
    }

    /// Drop records whose window has elapsed; returns how many were removed
    ///
    /// Invoked periodically by the job scheduler to keep the map bounded.
    pub fn sweep_stale(&self) -> usize {
        let now = Instant::now();
        let mut attempts = self.attempts.lock().expect("rate limiter lock poisoned");
        let before = attempts.len();
        attempts.retain(|_, record| now < record.reset_at);
        metrics::RATE_LIMIT_KEYS.set(attempts.len() as i64);
        before - attempts.len()
    }

    #[cfg(test)]
    fn tracked_keys(&self) -> usize {
        self.attempts.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter() -> RateLimiter {
        RateLimiter::new(RateLimitConfig::default())
    }

    #[test]
    fn test_allows_until_limit_then_rejects() {
        let limiter = limiter();
        let window = Duration::from_secs(60);

        assert!(limiter.check("k", 3, window));
        assert!(limiter.check("k", 3, window));
        assert!(limiter.check("k", 3, window));
        assert!(!limiter.check("k", 3, window));
        // Rejection does not consume an attempt or extend the window
        assert!(!limiter.check("k", 3, window));
    }

    #[test]
    fn test_window_elapse_resets_counter() {
        let limiter = limiter();
        let window = Duration::from_millis(30);

        for _ in 0..3 {
            assert!(limiter.check("k", 3, window));
        }
        assert!(!limiter.check("k", 3, window));

        std::thread::sleep(Duration::from_millis(40));
        assert!(limiter.check("k", 3, window));
    }

    #[test]
    fn test_keys_are_independent() {
        let limiter = limiter();
        let window = Duration::from_secs(60);

        assert!(limiter.check("a", 1, window));
        assert!(!limiter.check("a", 1, window));
        assert!(limiter.check("b", 1, window));
    }

    #[test]
    fn test_remaining_time() {
        let limiter = limiter();

        assert_eq!(limiter.remaining_time("nobody"), Duration::ZERO);

        limiter.check("k", 3, Duration::from_secs(60));
        let remaining = limiter.remaining_time("k");
        assert!(remaining > Duration::from_secs(50));
        assert!(remaining <= Duration::from_secs(60));
    }

    #[test]
    fn test_sweep_removes_only_stale_records() {
        let limiter = limiter();

        limiter.check("stale", 3, Duration::from_millis(10));
        limiter.check("fresh", 3, Duration::from_secs(60));
        std::thread::sleep(Duration::from_millis(20));

        assert_eq!(limiter.sweep_stale(), 1);
        assert_eq!(limiter.tracked_keys(), 1);
    }

    #[test]
    fn test_concurrent_checks_never_exceed_limit() {
        use std::sync::Arc;

        let limiter = Arc::new(limiter());
        let window = Duration::from_secs(60);
        let mut handles = Vec::new();

        for _ in 0..8 {
            let limiter = Arc::clone(&limiter);
            handles.push(std::thread::spawn(move || {
                limiter.check("shared", 4, window) as u32
            }));
        }

        let allowed: u32 = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(allowed, 4);
    }
}

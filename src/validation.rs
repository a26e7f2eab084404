/// Input validation and display formatting helpers
use crate::error::{AppError, AppResult};
use chrono::{DateTime, Utc};

/// Validate a profile handle: 3-30 chars of lowercase letters, digits,
/// and underscores
pub fn validate_handle(handle: &str) -> AppResult<()> {
    if handle.len() < 3 {
        return Err(AppError::Validation(
            "Handle must be at least 3 characters".to_string(),
        ));
    }
    if handle.len() > 30 {
        return Err(AppError::Validation(
            "Handle must be at most 30 characters".to_string(),
        ));
    }
    if !handle
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
    {
        return Err(AppError::Validation(
            "Handle can only contain lowercase letters, numbers, and underscores".to_string(),
        ));
    }
    Ok(())
}

/// Human-readable file size
pub fn format_file_size(bytes: i64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

/// Human-readable "time ago" for dashboard listings
pub fn format_time_ago(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let seconds = (now - then).num_seconds();

    if seconds < 60 {
        "just now".to_string()
    } else if seconds < 3600 {
        format!("{}m ago", seconds / 60)
    } else if seconds < 86400 {
        format!("{}h ago", seconds / 3600)
    } else if seconds < 604800 {
        format!("{}d ago", seconds / 86400)
    } else {
        then.format("%Y-%m-%d").to_string()
    }
}

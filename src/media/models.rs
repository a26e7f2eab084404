/// Media and message data models
use crate::error::{AppError, AppResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of media attached to a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
        }
    }

    pub fn parse(s: &str) -> AppResult<Self> {
        match s {
            "image" => Ok(MediaKind::Image),
            "video" => Ok(MediaKind::Video),
            other => Err(AppError::Validation(format!(
                "Unknown media kind: {}",
                other
            ))),
        }
    }

    /// Classify from a MIME type
    pub fn from_mime(mime_type: &str) -> AppResult<Self> {
        if mime_type.starts_with("image/") {
            Ok(MediaKind::Image)
        } else if mime_type.starts_with("video/") {
            Ok(MediaKind::Video)
        } else {
            Err(AppError::Validation(format!(
                "Unsupported MIME type: {}",
                mime_type
            )))
        }
    }
}

/// Moderation state of a media asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModerationStatus {
    Pending,
    Approved,
    Rejected,
}

impl ModerationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModerationStatus::Pending => "pending",
            ModerationStatus::Approved => "approved",
            ModerationStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> AppResult<Self> {
        match s {
            "pending" => Ok(ModerationStatus::Pending),
            "approved" => Ok(ModerationStatus::Approved),
            "rejected" => Ok(ModerationStatus::Rejected),
            other => Err(AppError::Validation(format!(
                "Unknown moderation status: {}",
                other
            ))),
        }
    }
}

/// One uploaded file attached to a message
///
/// A media row and its storage blob are logically one unit: the row is
/// created only after the blob upload succeeds, and cleanup always attempts
/// the blob delete before removing the row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaAsset {
    pub id: String,
    pub message_id: String,
    pub media_kind: MediaKind,
    pub file_path: String,
    pub thumbnail_path: Option<String>,
    pub file_size: i64,
    pub mime_type: String,
    pub width: Option<i64>,
    pub height: Option<i64>,
    pub duration_secs: Option<f64>,
    pub moderation_status: ModerationStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// An anonymous submission to a profile
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub profile_id: String,
    pub body: Option<String>,
    pub sender_hash: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// A claimed handle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub handle: String,
    pub display_name: String,
    pub bio: String,
    pub is_active: bool,
    pub allow_media: bool,
    pub created_at: DateTime<Utc>,
}

/// Partial settings update applied to a profile
///
/// None leaves the field untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub allow_media: Option<bool>,
    pub is_active: Option<bool>,
}

/// Change notification emitted by the media store
///
/// Consumers (the status monitor) re-fetch on any event; the payload only
/// carries enough to log what happened.
#[derive(Debug, Clone)]
pub enum MediaChange {
    Inserted { media_id: String },
    Deleted { media_id: String },
}

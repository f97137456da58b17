use chrono::{DateTime, Utc};
use postq_core::recurrence::RecurrenceRule;
use postq_core::types::EndCondition;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "post_mode", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PostMode {
    Bulk,
    Described,
}

/// Post lifecycle. `Publishing` is the transient in-flight state a poller
/// moves a row into when it wins the claim; it never outlives one cycle.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "post_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    Queued,
    Scheduled,
    Publishing,
    Posted,
    Failed,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "media_kind", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Photo,
    Video,
    Audio,
    Animation,
    Document,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "batch_state", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum BatchState {
    Created,
    Populated,
    Scheduled,
    Deleted,
}

impl From<postq_core::types::PostMode> for PostMode {
    fn from(mode: postq_core::types::PostMode) -> Self {
        match mode {
            postq_core::types::PostMode::Bulk => PostMode::Bulk,
            postq_core::types::PostMode::Described => PostMode::Described,
        }
    }
}

impl From<PostMode> for postq_core::types::PostMode {
    fn from(mode: PostMode) -> Self {
        match mode {
            PostMode::Bulk => postq_core::types::PostMode::Bulk,
            PostMode::Described => postq_core::types::PostMode::Described,
        }
    }
}

impl From<postq_core::types::MediaType> for MediaKind {
    fn from(media: postq_core::types::MediaType) -> Self {
        match media {
            postq_core::types::MediaType::Photo => MediaKind::Photo,
            postq_core::types::MediaType::Video => MediaKind::Video,
            postq_core::types::MediaType::Audio => MediaKind::Audio,
            postq_core::types::MediaType::Animation => MediaKind::Animation,
            postq_core::types::MediaType::Document => MediaKind::Document,
        }
    }
}

impl From<MediaKind> for postq_core::types::MediaType {
    fn from(media: MediaKind) -> Self {
        match media {
            MediaKind::Photo => postq_core::types::MediaType::Photo,
            MediaKind::Video => postq_core::types::MediaType::Video,
            MediaKind::Audio => postq_core::types::MediaType::Audio,
            MediaKind::Animation => postq_core::types::MediaType::Animation,
            MediaKind::Document => postq_core::types::MediaType::Document,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Post {
    pub id: String,
    pub user_id: String,
    pub channel_id: String,
    pub mode: PostMode,
    pub media_ref: String,
    pub media_type: MediaKind,
    pub caption: Option<String>,
    pub status: PostStatus,
    pub scheduled_time: Option<DateTime<Utc>>,
    pub recurrence_id: Option<String>,
    pub batch_id: Option<String>,
    pub failure_reason: Option<String>,
    pub retry_count: i32,
    pub created_at: DateTime<Utc>,
    pub posted_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Channel {
    pub id: String,
    pub user_id: String,
    pub channel_id: String,
    pub display_name: String,
    pub is_default: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Batch {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub channel_id: String,
    pub mode: PostMode,
    pub state: BatchState,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Recurrence {
    pub id: String,
    pub user_id: String,
    pub channel_id: String,
    pub interval_secs: i64,
    pub end_count: Option<i32>,
    pub end_date: Option<DateTime<Utc>>,
    pub occurrences_fired: i32,
    pub active: bool,
    pub media_ref: String,
    pub media_type: MediaKind,
    pub caption: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Recurrence {
    /// Count bound wins when both columns are set, matching the advance
    /// rule's evaluation order.
    pub fn end_condition(&self) -> EndCondition {
        if let Some(count) = self.end_count {
            EndCondition::AfterCount(count)
        } else if let Some(date) = self.end_date {
            EndCondition::OnDate(date)
        } else {
            EndCondition::Never
        }
    }

    pub fn rule(&self) -> RecurrenceRule {
        RecurrenceRule {
            interval_secs: self.interval_secs,
            end: self.end_condition(),
        }
    }
}

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Engine-level failures. Validation variants are rejected before any
/// mutation; firing-time variants are recorded on the post, never retried
/// automatically.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("channel {channel_id} is not registered to user {user_id}")]
    InvalidChannel { user_id: String, channel_id: String },

    #[error("scheduled time {0} is not in the future")]
    PastTime(DateTime<Utc>),

    #[error("post set spans more than one channel")]
    MixedChannel,

    #[error("post count and time count differ ({posts} posts, {times} times)")]
    CountMismatch { posts: usize, times: usize },

    #[error("media {0} is missing from the store")]
    MissingMedia(String),

    #[error("{0} not found")]
    NotFound(String),
}

pub type EngineResult<T> = Result<T, EngineError>;

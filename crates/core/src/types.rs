use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How a post's publish time is determined.
///
/// `Bulk` posts are distributed automatically over computed slots;
/// `Described` posts carry an individually authored caption and time.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PostMode {
    Bulk,
    Described,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    #[default]
    Photo,
    Video,
    Audio,
    Animation,
    Document,
}

/// Termination rule for a recurrence.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase", tag = "kind", content = "value")]
pub enum EndCondition {
    Never,
    AfterCount(i32),
    OnDate(DateTime<Utc>),
}

/// The media + caption + destination a recurrence re-creates each cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostTemplate {
    pub user_id: String,
    pub channel_id: String,
    pub media_ref: String,
    pub media_type: MediaType,
    pub caption: Option<String>,
}

/// Per-user daily posting window used by the bulk calculator.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PostingWindow {
    pub start_hour: u32,
    pub end_hour: u32,
    pub interval_hours: u32,
}

impl Default for PostingWindow {
    fn default() -> Self {
        PostingWindow {
            start_hour: 10,
            end_hour: 20,
            interval_hours: 2,
        }
    }
}

impl PostingWindow {
    /// A usable window spans at least one slot inside a single day.
    pub fn is_valid(&self) -> bool {
        self.start_hour < self.end_hour && self.end_hour <= 24 && self.interval_hours >= 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_window_is_valid() {
        assert!(PostingWindow::default().is_valid());
    }

    #[test]
    fn test_inverted_or_degenerate_windows_rejected() {
        let inverted = PostingWindow {
            start_hour: 20,
            end_hour: 10,
            interval_hours: 2,
        };
        assert!(!inverted.is_valid());

        let past_midnight = PostingWindow {
            start_hour: 10,
            end_hour: 25,
            interval_hours: 2,
        };
        assert!(!past_midnight.is_valid());

        let zero_step = PostingWindow {
            start_hour: 10,
            end_hour: 20,
            interval_hours: 0,
        };
        assert!(!zero_step.is_valid());
    }
}

//! Queue isolation guard.
//!
//! Every query or deletion aimed at "the current queue" is parameterized
//! by an explicit `QueueScope`. Widening a scope to all channels is a
//! deliberate constructor call, not an omitted argument, so a clearing
//! operation can never silently reach across channels or users.

use serde::{Deserialize, Serialize};

use crate::types::PostMode;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase", tag = "kind", content = "channelId")]
pub enum ChannelFilter {
    /// Only posts destined for this channel.
    Only(String),
    /// Every channel the user owns. Callers must opt in explicitly.
    AllChannels,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QueueScope {
    pub user_id: String,
    pub channel: ChannelFilter,
    pub mode: Option<PostMode>,
}

impl QueueScope {
    pub fn channel(user_id: impl Into<String>, channel_id: impl Into<String>) -> Self {
        QueueScope {
            user_id: user_id.into(),
            channel: ChannelFilter::Only(channel_id.into()),
            mode: None,
        }
    }

    /// The one sanctioned cross-channel scope; calling it is the explicit,
    /// separately confirmed "all channels" decision.
    pub fn all_channels(user_id: impl Into<String>) -> Self {
        QueueScope {
            user_id: user_id.into(),
            channel: ChannelFilter::AllChannels,
            mode: None,
        }
    }

    pub fn with_mode(mut self, mode: PostMode) -> Self {
        self.mode = Some(mode);
        self
    }

    /// The single predicate every clearing/selection site goes through.
    pub fn matches(&self, user_id: &str, channel_id: &str, mode: PostMode) -> bool {
        if self.user_id != user_id {
            return false;
        }
        match &self.channel {
            ChannelFilter::Only(id) if id != channel_id => return false,
            _ => {}
        }
        match self.mode {
            Some(m) if m != mode => false,
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_never_matches_other_user() {
        let scope = QueueScope::channel("u1", "ch_a").with_mode(PostMode::Bulk);
        assert!(!scope.matches("u2", "ch_a", PostMode::Bulk));

        let wide = QueueScope::all_channels("u1");
        assert!(!wide.matches("u2", "ch_a", PostMode::Bulk));
        assert!(!wide.matches("u2", "ch_b", PostMode::Described));
    }

    #[test]
    fn test_channel_filter_holds() {
        let scope = QueueScope::channel("u1", "ch_a");
        assert!(scope.matches("u1", "ch_a", PostMode::Bulk));
        assert!(scope.matches("u1", "ch_a", PostMode::Described));
        assert!(!scope.matches("u1", "ch_b", PostMode::Bulk));
    }

    #[test]
    fn test_mode_filter_holds() {
        let scope = QueueScope::channel("u1", "ch_a").with_mode(PostMode::Bulk);
        assert!(scope.matches("u1", "ch_a", PostMode::Bulk));
        assert!(!scope.matches("u1", "ch_a", PostMode::Described));
    }

    #[test]
    fn test_all_channels_is_user_bound() {
        let scope = QueueScope::all_channels("u1");
        assert!(scope.matches("u1", "ch_a", PostMode::Bulk));
        assert!(scope.matches("u1", "ch_b", PostMode::Described));
    }
}

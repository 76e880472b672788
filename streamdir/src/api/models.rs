//! API response models.
//!
//! The public roster endpoints serve these instead of the stored records so
//! lease metadata (hub callback, HMAC secret) never leaves the service.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::{LiveStatus, PageAttachment, Streamer, TwitchAttachment, YouTubeAttachment};

/// Public view of a roster entry.
#[derive(Debug, Clone, Serialize)]
pub struct StreamerResponse {
    pub id: String,
    pub alias: String,
    pub description: String,
    pub languages: Vec<String>,
    pub platforms: PlatformsResponse,
    pub live_status: LiveStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlatformsResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub youtube: Option<YouTubeChannelResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub twitch: Option<TwitchAttachment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<PageAttachment>,
}

/// YouTube channel without its lease.
#[derive(Debug, Clone, Serialize)]
pub struct YouTubeChannelResponse {
    pub channel_id: Option<String>,
    pub handle: Option<String>,
    /// Whether push notifications are active for the channel.
    pub subscribed: bool,
}

impl From<YouTubeAttachment> for YouTubeChannelResponse {
    fn from(attachment: YouTubeAttachment) -> Self {
        Self {
            channel_id: attachment.resolved_channel_id(),
            handle: attachment.handle,
            subscribed: attachment.subscription.is_some(),
        }
    }
}

impl From<Streamer> for StreamerResponse {
    fn from(streamer: Streamer) -> Self {
        Self {
            id: streamer.id,
            alias: streamer.alias,
            description: streamer.description,
            languages: streamer.languages,
            platforms: PlatformsResponse {
                youtube: streamer.platforms.youtube.map(Into::into),
                twitch: streamer.platforms.twitch,
                page: streamer.platforms.page,
            },
            live_status: streamer.live_status,
            created_at: streamer.created_at,
        }
    }
}

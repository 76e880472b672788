//! Streamer record and platform attachments.

use chrono::{DateTime, Utc};
use platforms_api::api::BroadcasterRef;
use platforms_api::youtube::{channel_id_from_topic, infer_channel_id};
use serde::{Deserialize, Serialize};

use super::lease::Lease;
use super::live_status::LiveStatus;
use super::platform::{ChannelKey, Platform};

/// A content creator in the public roster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Streamer {
    pub id: String,
    pub alias: String,
    #[serde(default)]
    pub description: String,
    /// Ordered by preference.
    #[serde(default)]
    pub languages: Vec<String>,
    #[serde(default)]
    pub platforms: PlatformAttachments,
    #[serde(default)]
    pub live_status: LiveStatus,
    pub created_at: DateTime<Utc>,
}

impl Streamer {
    /// Create a new streamer with a generated id.
    pub fn new(alias: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            alias: alias.into(),
            description: String::new(),
            languages: Vec::new(),
            platforms: PlatformAttachments::default(),
            live_status: LiveStatus::default(),
            created_at: Utc::now(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_languages<I, S>(mut self, languages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.languages = languages.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_youtube(mut self, attachment: YouTubeAttachment) -> Self {
        self.platforms.youtube = Some(attachment);
        self
    }

    pub fn with_twitch(mut self, attachment: TwitchAttachment) -> Self {
        self.platforms.twitch = Some(attachment);
        self
    }

    pub fn with_page(mut self, url: impl Into<String>) -> Self {
        self.platforms.page = Some(PageAttachment { url: url.into() });
        self
    }

    /// Whether this record owns the attachment addressed by `key`.
    pub fn owns(&self, key: &ChannelKey) -> bool {
        match key.platform {
            Platform::YouTube => self
                .platforms
                .youtube
                .as_ref()
                .is_some_and(|yt| yt.matches(&key.channel_id)),
            Platform::Twitch => self
                .platforms
                .twitch
                .as_ref()
                .is_some_and(|tw| tw.matches(&key.channel_id)),
            Platform::Page => self
                .platforms
                .page
                .as_ref()
                .is_some_and(|page| page.url == key.channel_id),
        }
    }
}

/// One optional attachment slot per platform.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlatformAttachments {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub youtube: Option<YouTubeAttachment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub twitch: Option<TwitchAttachment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<PageAttachment>,
}

/// YouTube channel attachment; the only push-capable platform.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "YouTubeAttachmentRepr", into = "YouTubeAttachmentRepr")]
pub struct YouTubeAttachment {
    pub channel_id: Option<String>,
    pub handle: Option<String>,
    pub topic_url: Option<String>,
    /// Present exactly when the channel is subscribed at the hub.
    pub subscription: Option<Lease>,
    /// Set by an explicit unsubscribe; the renewal sweep leaves the channel
    /// alone until it is established again.
    pub unsubscribed_at: Option<DateTime<Utc>>,
}

/// Persisted form: an explicit `subscribed` flag next to the lease.
#[derive(Serialize, Deserialize)]
struct YouTubeAttachmentRepr {
    #[serde(default)]
    channel_id: Option<String>,
    #[serde(default)]
    handle: Option<String>,
    #[serde(default)]
    topic_url: Option<String>,
    #[serde(default)]
    subscribed: bool,
    #[serde(default)]
    lease: Option<Lease>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    unsubscribed_at: Option<DateTime<Utc>>,
}

impl From<YouTubeAttachmentRepr> for YouTubeAttachment {
    fn from(repr: YouTubeAttachmentRepr) -> Self {
        Self {
            channel_id: repr.channel_id,
            handle: repr.handle,
            topic_url: repr.topic_url,
            subscription: repr.lease.filter(|_| repr.subscribed),
            unsubscribed_at: repr.unsubscribed_at,
        }
    }
}

impl From<YouTubeAttachment> for YouTubeAttachmentRepr {
    fn from(attachment: YouTubeAttachment) -> Self {
        Self {
            channel_id: attachment.channel_id,
            handle: attachment.handle,
            topic_url: attachment.topic_url,
            subscribed: attachment.subscription.is_some(),
            lease: attachment.subscription,
            unsubscribed_at: attachment.unsubscribed_at,
        }
    }
}

impl YouTubeAttachment {
    pub fn with_channel_id(channel_id: impl Into<String>) -> Self {
        Self {
            channel_id: Some(channel_id.into()),
            ..Default::default()
        }
    }

    /// The channel id to query: the explicit field, else parsed from the topic URL.
    pub fn resolved_channel_id(&self) -> Option<String> {
        self.channel_id
            .as_deref()
            .and_then(infer_channel_id)
            .or_else(|| self.topic_url.as_deref().and_then(channel_id_from_topic))
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscription.is_some()
    }

    /// Whether the renewal sweep should hold a lease for this channel.
    pub fn wants_subscription(&self) -> bool {
        self.subscription.is_some()
            || (self.unsubscribed_at.is_none() && self.resolved_channel_id().is_some())
    }

    fn matches(&self, channel_id: &str) -> bool {
        self.resolved_channel_id().as_deref() == Some(channel_id)
    }
}

/// Twitch channel attachment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TwitchAttachment {
    pub login: String,
    #[serde(default)]
    pub user_id: Option<String>,
}

impl TwitchAttachment {
    pub fn new(login: impl Into<String>) -> Self {
        Self {
            login: login.into(),
            user_id: None,
        }
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Stable key: the user id when known, else the login.
    pub fn channel_key(&self) -> ChannelKey {
        ChannelKey::twitch(self.user_id.clone().unwrap_or_else(|| self.login.clone()))
    }

    pub fn broadcaster_ref(&self) -> BroadcasterRef {
        BroadcasterRef {
            user_id: self.user_id.clone(),
            login: self.login.clone(),
        }
    }

    fn matches(&self, id_or_login: &str) -> bool {
        self.user_id.as_deref() == Some(id_or_login) || self.login.eq_ignore_ascii_case(id_or_login)
    }
}

/// Generic page link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageAttachment {
    pub url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    const ID: &str = "UCabcdefghijklmnopqrstuv";

    #[test]
    fn test_resolved_channel_id_falls_back_to_topic() {
        let explicit = YouTubeAttachment::with_channel_id(ID);
        assert_eq!(explicit.resolved_channel_id().as_deref(), Some(ID));

        let from_topic = YouTubeAttachment {
            topic_url: Some(platforms_api::youtube::topic_url(ID)),
            ..Default::default()
        };
        assert_eq!(from_topic.resolved_channel_id().as_deref(), Some(ID));

        let handle_only = YouTubeAttachment {
            handle: Some("@someone".into()),
            ..Default::default()
        };
        assert_eq!(handle_only.resolved_channel_id(), None);
    }

    #[test]
    fn test_owns_by_channel_key() {
        let streamer = Streamer::new("alias")
            .with_youtube(YouTubeAttachment::with_channel_id(ID))
            .with_twitch(TwitchAttachment::new("SomeOne").with_user_id("77"));

        assert!(streamer.owns(&ChannelKey::youtube(ID)));
        assert!(streamer.owns(&ChannelKey::twitch("77")));
        assert!(streamer.owns(&ChannelKey::twitch("someone")));
        assert!(!streamer.owns(&ChannelKey::twitch("other")));
        assert!(!streamer.owns(&ChannelKey::youtube("UCzzzzzzzzzzzzzzzzzzzzzz")));
    }

    #[test]
    fn test_wants_subscription() {
        let attached = YouTubeAttachment::with_channel_id(ID);
        assert!(attached.wants_subscription());

        let opted_out = YouTubeAttachment {
            unsubscribed_at: Some(Utc::now()),
            ..YouTubeAttachment::with_channel_id(ID)
        };
        assert!(!opted_out.wants_subscription());

        let handle_only = YouTubeAttachment {
            handle: Some("@someone".into()),
            ..Default::default()
        };
        assert!(!handle_only.wants_subscription());
    }

    #[test]
    fn test_lease_dropped_without_subscribed_flag() {
        let json = format!(
            r#"{{
                "channel_id": "{ID}",
                "subscribed": false,
                "lease": {{
                    "hub_url": "h", "topic_url": "t", "callback_url": "c", "secret": "s",
                    "lease_seconds": 10,
                    "subscribed_at": "2024-01-01T00:00:00Z",
                    "expires_at": "2024-01-01T00:00:10Z"
                }}
            }}"#
        );
        let attachment: YouTubeAttachment = serde_json::from_str(&json).unwrap();
        assert!(!attachment.is_subscribed());
    }

    #[test]
    fn test_subscribed_flag_written() {
        let lease = Lease::new("h", "t", "c", "s", 10, Utc::now());
        let attachment = YouTubeAttachment {
            subscription: Some(lease),
            ..YouTubeAttachment::with_channel_id(ID)
        };
        let value = serde_json::to_value(&attachment).unwrap();
        assert_eq!(value["subscribed"], serde_json::Value::Bool(true));

        let back: YouTubeAttachment = serde_json::from_value(value).unwrap();
        assert_eq!(back, attachment);
    }
}

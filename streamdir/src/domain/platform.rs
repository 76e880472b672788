use std::fmt;

use serde::{Deserialize, Serialize};

/// The fixed set of platforms a streamer can be attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    YouTube,
    Twitch,
    /// A generic page link; never polled.
    Page,
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Platform::YouTube => "youtube",
            Platform::Twitch => "twitch",
            Platform::Page => "page",
        };
        f.write_str(name)
    }
}

/// Addresses one platform attachment by its channel identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChannelKey {
    pub platform: Platform,
    pub channel_id: String,
}

impl ChannelKey {
    pub fn new(platform: Platform, channel_id: impl Into<String>) -> Self {
        Self {
            platform,
            channel_id: channel_id.into(),
        }
    }

    pub fn youtube(channel_id: impl Into<String>) -> Self {
        Self::new(Platform::YouTube, channel_id)
    }

    /// A Twitch key may hold either the numeric user id or the login.
    pub fn twitch(id_or_login: impl Into<String>) -> Self {
        Self::new(Platform::Twitch, id_or_login)
    }
}

impl fmt::Display for ChannelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.platform, self.channel_id)
    }
}

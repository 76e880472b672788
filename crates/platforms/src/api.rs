//! Trait seams consumed by the status reconciler and the notification path.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::PlatformError;

/// A single live session as reported by a platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Broadcast {
    /// Platform-specific broadcast identifier (video id / stream id).
    pub id: String,
    pub title: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
}

impl Broadcast {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: None,
            started_at: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_started_at(mut self, started_at: DateTime<Utc>) -> Self {
        self.started_at = Some(started_at);
        self
    }
}

/// Identifies one broadcaster in a batched stream lookup.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BroadcasterRef {
    pub user_id: Option<String>,
    pub login: String,
}

impl BroadcasterRef {
    /// Whether a stream returned by the batch endpoint belongs to this broadcaster.
    pub fn matches(&self, stream: &LiveStream) -> bool {
        match &self.user_id {
            Some(id) if id == &stream.user_id => true,
            _ => self.login.eq_ignore_ascii_case(&stream.user_login),
        }
    }
}

/// A currently-live stream returned by a batch lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveStream {
    pub user_id: String,
    pub user_login: String,
    pub broadcast: Broadcast,
}

/// Per-channel "live now?" queries against a quota-limited API.
#[async_trait]
pub trait LiveQueryApi: Send + Sync {
    /// The channel's current live broadcast, or `None` when offline.
    async fn live_broadcast(
        &self,
        channel_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<Broadcast>, PlatformError>;

    /// The broadcast for a single video if that video is live right now.
    async fn video_broadcast(
        &self,
        video_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<Broadcast>, PlatformError>;
}

/// Batched "current streams for these broadcasters" lookups.
#[async_trait]
pub trait StreamsBatchApi: Send + Sync {
    /// Every currently-live stream among `broadcasters`. Broadcasters missing
    /// from the result are offline.
    async fn live_streams(
        &self,
        broadcasters: &[BroadcasterRef],
        cancel: &CancellationToken,
    ) -> Result<Vec<LiveStream>, PlatformError>;
}

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::api::{Broadcast, LiveQueryApi};
use crate::error::PlatformError;
use crate::http::status_error;
use crate::rate_limit::RateLimitedClient;

use super::models::{SearchListResponse, VideoListResponse};

/// YouTube Data API v3 client. Every request draws from the shared quota gate.
#[derive(Debug, Clone)]
pub struct YouTubeClient {
    http: RateLimitedClient,
    api_key: String,
    base_url: String,
}

impl YouTubeClient {
    pub const DEFAULT_BASE_URL: &str = "https://www.googleapis.com/youtube/v3";

    pub fn new(http: RateLimitedClient, api_key: impl Into<String>) -> Self {
        Self {
            http,
            api_key: api_key.into(),
            base_url: Self::DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Point the client at a different API root (e.g. a local test server).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
        cancel: &CancellationToken,
    ) -> Result<T, PlatformError> {
        let request = self
            .http
            .get(format!("{}/{}", self.base_url, path))
            .query(query)
            .query(&[("key", self.api_key.as_str())]);

        let response = self.http.send(request, cancel).await?;
        if !response.status().is_success() {
            return Err(status_error(response).await);
        }

        response.json::<T>().await.map_err(PlatformError::from_reqwest)
    }
}

#[async_trait]
impl LiveQueryApi for YouTubeClient {
    async fn live_broadcast(
        &self,
        channel_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<Broadcast>, PlatformError> {
        if channel_id.trim().is_empty() {
            return Err(PlatformError::InvalidIdentifier(
                "empty channel id".to_string(),
            ));
        }

        let response: SearchListResponse = self
            .get_json(
                "search",
                &[
                    ("part", "snippet"),
                    ("channelId", channel_id),
                    ("eventType", "live"),
                    ("type", "video"),
                    ("maxResults", "1"),
                ],
                cancel,
            )
            .await?;

        // Search only knows the publish time, which for a scheduled stream is
        // not the start. The video lookup carries `actualStartTime`, the same
        // value the notification path records.
        let Some(video_id) = response.items.into_iter().find_map(|item| item.id.video_id) else {
            debug!(channel_id = %channel_id, live = false, "YouTube live query complete");
            return Ok(None);
        };
        let broadcast = self.video_broadcast(&video_id, cancel).await?;

        debug!(
            channel_id = %channel_id,
            live = broadcast.is_some(),
            "YouTube live query complete"
        );
        Ok(broadcast)
    }

    async fn video_broadcast(
        &self,
        video_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<Broadcast>, PlatformError> {
        if video_id.trim().is_empty() {
            return Err(PlatformError::InvalidIdentifier("empty video id".to_string()));
        }

        let response: VideoListResponse = self
            .get_json(
                "videos",
                &[("part", "snippet,liveStreamingDetails"), ("id", video_id)],
                cancel,
            )
            .await?;

        let Some(video) = response.items.into_iter().find(|v| v.id == video_id) else {
            return Ok(None);
        };
        if !video.is_live() {
            return Ok(None);
        }

        Ok(Some(Broadcast {
            id: video.id,
            title: video.snippet.and_then(|s| s.title),
            started_at: video
                .live_streaming_details
                .and_then(|d| d.actual_start_time),
        }))
    }
}

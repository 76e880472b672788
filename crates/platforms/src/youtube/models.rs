use chrono::{DateTime, Utc};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub(super) struct SearchListResponse {
    #[serde(default)]
    pub items: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
pub(super) struct SearchResult {
    pub id: SearchResultId,
}

#[derive(Debug, Deserialize)]
pub(super) struct SearchResultId {
    #[serde(rename = "videoId")]
    pub video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct VideoListResponse {
    #[serde(default)]
    pub items: Vec<Video>,
}

#[derive(Debug, Deserialize)]
pub(super) struct Video {
    pub id: String,
    pub snippet: Option<VideoSnippet>,
    #[serde(rename = "liveStreamingDetails")]
    pub live_streaming_details: Option<LiveStreamingDetails>,
}

#[derive(Debug, Deserialize)]
pub(super) struct VideoSnippet {
    pub title: Option<String>,
    #[serde(rename = "liveBroadcastContent")]
    pub live_broadcast_content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct LiveStreamingDetails {
    #[serde(rename = "actualStartTime")]
    pub actual_start_time: Option<DateTime<Utc>>,
    #[serde(rename = "actualEndTime")]
    pub actual_end_time: Option<DateTime<Utc>>,
}

impl Video {
    /// Live right now: flagged live, or started and not yet ended.
    pub fn is_live(&self) -> bool {
        let flagged = self
            .snippet
            .as_ref()
            .and_then(|s| s.live_broadcast_content.as_deref())
            == Some("live");
        let running = self
            .live_streaming_details
            .as_ref()
            .is_some_and(|d| d.actual_start_time.is_some() && d.actual_end_time.is_none());
        flagged || running
    }
}

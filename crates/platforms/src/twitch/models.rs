use chrono::{DateTime, Utc};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub(super) struct TokenResponse {
    pub access_token: String,
    pub expires_in: u64,
}

#[derive(Debug, Deserialize)]
pub(super) struct StreamsResponse {
    #[serde(default)]
    pub data: Vec<HelixStream>,
}

#[derive(Debug, Deserialize)]
pub(super) struct HelixStream {
    pub id: String,
    pub user_id: String,
    pub user_login: String,
    /// "live", or empty when the stream errored.
    #[serde(rename = "type", default)]
    pub stream_type: String,
    #[serde(default)]
    pub title: String,
    pub started_at: Option<DateTime<Utc>>,
}

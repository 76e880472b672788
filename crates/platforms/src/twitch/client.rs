use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::api::{Broadcast, BroadcasterRef, LiveStream, StreamsBatchApi};
use crate::error::PlatformError;
use crate::http::status_error;

use super::models::{StreamsResponse, TokenResponse};

/// Helix accepts at most this many broadcasters per `/streams` request.
const MAX_BATCH_SIZE: usize = 100;

/// Tokens are refreshed this long before Twitch says they expire.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// App credentials for the client-credentials grant.
#[derive(Debug, Clone)]
pub struct TwitchCredentials {
    pub client_id: String,
    pub client_secret: String,
}

#[derive(Debug, Clone)]
struct AppToken {
    access_token: String,
    expires_at: Instant,
}

/// Twitch Helix client holding a cached app access token.
#[derive(Debug)]
pub struct TwitchClient {
    http: reqwest::Client,
    credentials: TwitchCredentials,
    api_base: String,
    auth_url: String,
    token: Mutex<Option<AppToken>>,
}

impl TwitchClient {
    pub const DEFAULT_API_BASE: &str = "https://api.twitch.tv/helix";
    pub const DEFAULT_AUTH_URL: &str = "https://id.twitch.tv/oauth2/token";

    pub fn new(http: reqwest::Client, credentials: TwitchCredentials) -> Self {
        Self {
            http,
            credentials,
            api_base: Self::DEFAULT_API_BASE.to_string(),
            auth_url: Self::DEFAULT_AUTH_URL.to_string(),
            token: Mutex::new(None),
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_auth_url(mut self, auth_url: impl Into<String>) -> Self {
        self.auth_url = auth_url.into();
        self
    }

    /// Return the cached app token, fetching a new one when missing or stale.
    async fn access_token(&self, cancel: &CancellationToken) -> Result<String, PlatformError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref()
            && Instant::now() + TOKEN_EXPIRY_MARGIN < token.expires_at
        {
            return Ok(token.access_token.clone());
        }

        debug!("Requesting Twitch app access token");
        let request = self.http.post(&self.auth_url).form(&[
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
            ("grant_type", "client_credentials"),
        ]);

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(PlatformError::Cancelled),
            result = request.send() => result.map_err(PlatformError::from_reqwest)?,
        };

        if !response.status().is_success() {
            let err = status_error(response).await;
            return Err(PlatformError::Auth(err.to_string()));
        }

        let token: TokenResponse = response.json().await.map_err(PlatformError::from_reqwest)?;
        info!(expires_in = token.expires_in, "Obtained Twitch app access token");

        let access_token = token.access_token.clone();
        *cached = Some(AppToken {
            access_token: token.access_token,
            expires_at: Instant::now() + Duration::from_secs(token.expires_in),
        });
        Ok(access_token)
    }

    async fn invalidate_token(&self) {
        *self.token.lock().await = None;
    }

    async fn fetch_chunk(
        &self,
        chunk: &[BroadcasterRef],
        token: &str,
        cancel: &CancellationToken,
    ) -> Result<StreamsResponse, PlatformError> {
        let mut query: Vec<(&str, &str)> = Vec::with_capacity(chunk.len() + 1);
        query.push(("first", "100"));
        for broadcaster in chunk {
            match &broadcaster.user_id {
                Some(id) => query.push(("user_id", id.as_str())),
                None => query.push(("user_login", broadcaster.login.as_str())),
            }
        }

        let request = self
            .http
            .get(format!("{}/streams", self.api_base))
            .query(&query)
            .header("Client-Id", &self.credentials.client_id)
            .bearer_auth(token);

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(PlatformError::Cancelled),
            result = request.send() => result.map_err(PlatformError::from_reqwest)?,
        };

        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            self.invalidate_token().await;
            let err = status_error(response).await;
            return Err(PlatformError::Auth(err.to_string()));
        }
        if !response.status().is_success() {
            return Err(status_error(response).await);
        }

        response.json().await.map_err(PlatformError::from_reqwest)
    }
}

#[async_trait]
impl StreamsBatchApi for TwitchClient {
    async fn live_streams(
        &self,
        broadcasters: &[BroadcasterRef],
        cancel: &CancellationToken,
    ) -> Result<Vec<LiveStream>, PlatformError> {
        if broadcasters.is_empty() {
            return Ok(Vec::new());
        }

        let token = self.access_token(cancel).await?;
        let mut streams = Vec::new();

        for chunk in broadcasters.chunks(MAX_BATCH_SIZE) {
            let response = self.fetch_chunk(chunk, &token, cancel).await?;
            for stream in response.data {
                if stream.stream_type != "live" {
                    warn!(user_login = %stream.user_login, stream_type = %stream.stream_type, "Skipping non-live stream entry");
                    continue;
                }
                let mut broadcast = Broadcast::new(stream.id);
                if !stream.title.is_empty() {
                    broadcast.title = Some(stream.title);
                }
                broadcast.started_at = stream.started_at;
                streams.push(LiveStream {
                    user_id: stream.user_id,
                    user_login: stream.user_login,
                    broadcast,
                });
            }
        }

        debug!(
            requested = broadcasters.len(),
            live = streams.len(),
            "Twitch batch lookup complete"
        );
        Ok(streams)
    }
}

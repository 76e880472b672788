//! Subscribe/unsubscribe requests to a WebSub hub.

use std::fmt;

use platforms_api::PlatformError;
use reqwest::StatusCode;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{Error, Result};

/// `hub.mode` of an outbound request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HubMode {
    Subscribe,
    Unsubscribe,
}

impl HubMode {
    pub fn as_str(self) -> &'static str {
        match self {
            HubMode::Subscribe => "subscribe",
            HubMode::Unsubscribe => "unsubscribe",
        }
    }
}

impl fmt::Display for HubMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct HubRequest<'a> {
    pub mode: HubMode,
    pub topic: &'a str,
    pub callback: &'a str,
    pub lease_seconds: Option<u64>,
    pub secret: Option<&'a str>,
}

/// Form-encoded client for a single hub endpoint.
#[derive(Debug, Clone)]
pub struct HubClient {
    http: reqwest::Client,
    hub_url: String,
}

impl HubClient {
    pub const DEFAULT_HUB_URL: &str = "https://pubsubhubbub.appspot.com/subscribe";

    pub fn new(http: reqwest::Client, hub_url: impl Into<String>) -> Self {
        Self {
            http,
            hub_url: hub_url.into(),
        }
    }

    pub fn hub_url(&self) -> &str {
        &self.hub_url
    }

    /// Submit a request. The hub verifies asynchronously, so `202 Accepted`
    /// (or `204`) only means the request was queued.
    pub async fn send(&self, request: &HubRequest<'_>, cancel: &CancellationToken) -> Result<()> {
        let lease = request.lease_seconds.map(|s| s.to_string());
        let mut form: Vec<(&str, &str)> = vec![
            ("hub.callback", request.callback),
            ("hub.topic", request.topic),
            ("hub.verify", "async"),
            ("hub.mode", request.mode.as_str()),
        ];
        if let Some(lease) = lease.as_deref() {
            form.push(("hub.lease_seconds", lease));
        }
        if let Some(secret) = request.secret {
            form.push(("hub.secret", secret));
        }

        debug!(
            hub = %self.hub_url,
            mode = %request.mode,
            topic = %request.topic,
            "Sending hub request"
        );

        let pending = self.http.post(&self.hub_url).form(&form).send();
        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            result = pending => result.map_err(PlatformError::from_reqwest)?,
        };

        match response.status() {
            StatusCode::ACCEPTED | StatusCode::NO_CONTENT => Ok(()),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(Error::Hub {
                    status: status.as_u16(),
                    message: body.trim().chars().take(512).collect(),
                })
            }
        }
    }
}

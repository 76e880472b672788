//! Environment-driven configuration.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use platforms_api::twitch::{TwitchClient, TwitchCredentials};
use platforms_api::youtube::YouTubeClient;

use crate::api::server::ApiServerConfig;
use crate::websub::{HubClient, WebSubConfig};
use crate::{Error, Result};

/// Twitch app credentials and endpoints.
#[derive(Debug, Clone)]
pub struct TwitchConfig {
    pub credentials: TwitchCredentials,
    pub api_base: String,
    pub auth_url: String,
}

/// Full service configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub roster_path: PathBuf,
    pub server: ApiServerConfig,
    pub admin_token: Option<String>,

    pub youtube_api_key: Option<String>,
    pub youtube_api_base: String,
    /// Minimum spacing between YouTube Data API requests.
    pub youtube_min_interval: Duration,

    /// `None` unless both client id and secret are set.
    pub twitch: Option<TwitchConfig>,

    pub hub_url: String,
    pub websub: WebSubConfig,

    /// Zero disables the sweep.
    pub renewal_interval: Duration,
    /// Zero disables the periodic pass.
    pub status_check_interval: Duration,
    pub request_timeout: Duration,

    pub log_dir: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            roster_path: PathBuf::from("data/streamers.json"),
            server: ApiServerConfig::default(),
            admin_token: None,
            youtube_api_key: None,
            youtube_api_base: YouTubeClient::DEFAULT_BASE_URL.to_string(),
            youtube_min_interval: Duration::from_millis(1000),
            twitch: None,
            hub_url: HubClient::DEFAULT_HUB_URL.to_string(),
            websub: WebSubConfig::default(),
            renewal_interval: Duration::from_secs(3600),
            status_check_interval: Duration::from_secs(300),
            request_timeout: Duration::from_secs(20),
            log_dir: PathBuf::from("logs"),
        }
    }
}

impl AppConfig {
    /// Read the process environment. Unset or empty variables keep their
    /// defaults; a value that does not parse is a configuration error.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let mut config = Self::default();

        if let Some(path) = get("ROSTER_PATH") {
            config.roster_path = PathBuf::from(path);
        }
        if let Some(address) = get("API_BIND_ADDRESS") {
            config.server.bind_address = address;
        }
        if let Some(port) = parse::<u16>("API_PORT", get("API_PORT"))? {
            config.server.port = port;
        }
        if let Some(base) = get("PUBLIC_BASE_URL") {
            url::Url::parse(&base)
                .map_err(|e| Error::config(format!("PUBLIC_BASE_URL is not a URL: {e}")))?;
            config.websub.public_base_url = base;
        }
        config.admin_token = get("ADMIN_TOKEN");

        config.youtube_api_key = get("YOUTUBE_API_KEY");
        if let Some(base) = get("YOUTUBE_API_BASE") {
            config.youtube_api_base = base;
        }
        if let Some(ms) = parse::<u64>("YOUTUBE_MIN_INTERVAL_MS", get("YOUTUBE_MIN_INTERVAL_MS"))? {
            config.youtube_min_interval = Duration::from_millis(ms);
        }

        config.twitch = match (get("TWITCH_CLIENT_ID"), get("TWITCH_CLIENT_SECRET")) {
            (Some(client_id), Some(client_secret)) => Some(TwitchConfig {
                credentials: TwitchCredentials {
                    client_id,
                    client_secret,
                },
                api_base: get("TWITCH_API_BASE")
                    .unwrap_or_else(|| TwitchClient::DEFAULT_API_BASE.to_string()),
                auth_url: get("TWITCH_AUTH_URL")
                    .unwrap_or_else(|| TwitchClient::DEFAULT_AUTH_URL.to_string()),
            }),
            (None, None) => None,
            _ => {
                return Err(Error::config(
                    "TWITCH_CLIENT_ID and TWITCH_CLIENT_SECRET must be set together",
                ));
            }
        };

        if let Some(hub) = get("WEBSUB_HUB_URL") {
            config.hub_url = hub;
        }
        if let Some(secs) = parse::<u64>("WEBSUB_LEASE_SECONDS", get("WEBSUB_LEASE_SECONDS"))? {
            if secs == 0 {
                return Err(Error::config("WEBSUB_LEASE_SECONDS must be positive"));
            }
            config.websub.lease_seconds = secs;
        }
        if let Some(ratio) = parse::<f64>("WEBSUB_RENEWAL_RATIO", get("WEBSUB_RENEWAL_RATIO"))? {
            if !(0.0..1.0).contains(&ratio) {
                return Err(Error::config("WEBSUB_RENEWAL_RATIO must be in [0, 1)"));
            }
            config.websub.renewal_ratio = ratio;
        }

        if let Some(secs) = parse::<u64>("RENEWAL_INTERVAL_SECS", get("RENEWAL_INTERVAL_SECS"))? {
            config.renewal_interval = Duration::from_secs(secs);
        }
        if let Some(secs) = parse::<u64>(
            "STATUS_CHECK_INTERVAL_SECS",
            get("STATUS_CHECK_INTERVAL_SECS"),
        )? {
            config.status_check_interval = Duration::from_secs(secs);
        }
        if let Some(secs) = parse::<u64>("REQUEST_TIMEOUT_SECS", get("REQUEST_TIMEOUT_SECS"))? {
            config.request_timeout = Duration::from_secs(secs);
        }
        if let Some(dir) = get("LOG_DIR") {
            config.log_dir = PathBuf::from(dir);
        }

        Ok(config)
    }
}

fn parse<T>(key: &str, value: Option<String>) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .map(|v| {
            v.parse::<T>()
                .map_err(|e| Error::config(format!("{key}={v:?}: {e}")))
        })
        .transpose()
}

use std::sync::Arc;

use anyhow::Context;
use platforms_api::twitch::TwitchClient;
use platforms_api::youtube::YouTubeClient;
use platforms_api::{LiveQueryApi, RateLimitedClient, RateLimiter, StreamsBatchApi};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use streamdir::api::{ApiServer, AppState};
use streamdir::config::AppConfig;
use streamdir::logging::init_logging;
use streamdir::monitor::StatusReconciler;
use streamdir::roster::{JsonRosterRepository, RosterRepository};
use streamdir::scheduler::{Scheduler, SchedulerConfig};
use streamdir::websub::{HubClient, SubscriptionManager};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env().context("invalid configuration")?;

    let logging = init_logging(&config.log_dir).context("failed to initialize logging")?;
    let shutdown = CancellationToken::new();
    logging.start_retention_cleanup(shutdown.clone());

    let http = platforms_api::http::build_client(config.request_timeout)?;

    let youtube: Option<Arc<dyn LiveQueryApi>> = match &config.youtube_api_key {
        Some(key) => {
            let limiter = Arc::new(RateLimiter::new(config.youtube_min_interval));
            let client = YouTubeClient::new(RateLimitedClient::new(http.clone(), limiter), key)
                .with_base_url(&config.youtube_api_base);
            Some(Arc::new(client) as Arc<dyn LiveQueryApi>)
        }
        None => {
            warn!("YOUTUBE_API_KEY not set; YouTube channels will not be checked");
            None
        }
    };

    let twitch: Option<Arc<dyn StreamsBatchApi>> = config.twitch.as_ref().map(|twitch| {
        let client = TwitchClient::new(http.clone(), twitch.credentials.clone())
            .with_api_base(&twitch.api_base)
            .with_auth_url(&twitch.auth_url);
        Arc::new(client) as Arc<dyn StreamsBatchApi>
    });

    let roster: Arc<dyn RosterRepository> = Arc::new(
        JsonRosterRepository::open(&config.roster_path)
            .await
            .with_context(|| format!("failed to open roster {}", config.roster_path.display()))?,
    );

    let reconciler = Arc::new(StatusReconciler::new(
        roster.clone(),
        youtube.clone(),
        twitch,
    ));
    let subscriptions = Arc::new(SubscriptionManager::new(
        roster.clone(),
        HubClient::new(http, &config.hub_url),
        youtube,
        config.websub.clone(),
    ));

    let scheduler = Scheduler::new(
        reconciler.clone(),
        subscriptions.clone(),
        SchedulerConfig {
            status_check_interval: config.status_check_interval,
            renewal_interval: config.renewal_interval,
        },
    );
    let loops = scheduler.start(shutdown.clone());

    let state = AppState::new(roster, reconciler, subscriptions)
        .with_admin_token(config.admin_token.clone())
        .with_shutdown(shutdown.clone());
    let server = ApiServer::new(config.server.clone(), state);

    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!("Shutdown signal received"),
                Err(e) => error!(error = %e, "Failed to listen for shutdown signal"),
            }
            shutdown.cancel();
        });
    }

    info!(
        version = env!("CARGO_PKG_VERSION"),
        roster = %config.roster_path.display(),
        log_dir = %logging.log_dir().display(),
        "streamdir initialized successfully"
    );

    let result = server.run().await;
    shutdown.cancel();
    for handle in loops {
        let _ = handle.await;
    }

    result.context("API server failed")
}

//! Full reconciliation pass over the roster.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use platforms_api::{Broadcast, LiveQueryApi, PlatformError, StreamsBatchApi};
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::domain::{ChannelKey, Platform, PlatformStatus, Streamer, TwitchAttachment};
use crate::roster::RosterRepository;
use crate::{Error, Result};

use super::status::{StatusChange, apply_observation};
use super::summary::{CheckFailure, CheckSummary};

/// One YouTube attachment scheduled for a per-channel query.
#[derive(Debug, Clone)]
struct ChannelTarget {
    streamer_id: String,
    alias: String,
    channel_id: Option<String>,
    current: Option<PlatformStatus>,
}

/// One Twitch attachment folded into the batch query.
#[derive(Debug, Clone)]
struct BatchTarget {
    streamer_id: String,
    alias: String,
    attachment: TwitchAttachment,
    current: Option<PlatformStatus>,
}

enum TaskOutcome {
    Observed { live: bool, written: bool },
    Failed(CheckFailure),
}

/// Brings roster live-status up to date against YouTube (one rate-limited
/// query per channel) and Twitch (one batched query).
pub struct StatusReconciler {
    roster: Arc<dyn RosterRepository>,
    youtube: Option<Arc<dyn LiveQueryApi>>,
    twitch: Option<Arc<dyn StreamsBatchApi>>,
    /// Serializes passes started by the scheduler and by operators.
    pass_lock: Mutex<()>,
}

impl StatusReconciler {
    pub fn new(
        roster: Arc<dyn RosterRepository>,
        youtube: Option<Arc<dyn LiveQueryApi>>,
        twitch: Option<Arc<dyn StreamsBatchApi>>,
    ) -> Self {
        Self {
            roster,
            youtube,
            twitch,
            pass_lock: Mutex::new(()),
        }
    }

    /// Run a pass bounded by `timeout`. Hitting the deadline cancels every
    /// in-flight query and reports a timeout.
    pub async fn check_all_with_timeout(
        &self,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<CheckSummary> {
        let deadline = cancel.child_token();
        let timer = {
            let deadline = deadline.clone();
            tokio::spawn(async move {
                tokio::time::sleep(timeout).await;
                deadline.cancel();
            })
        };

        let result = self.check_all(&deadline).await;
        timer.abort();

        match result {
            Err(e) if e.is_cancelled() && !cancel.is_cancelled() => {
                warn!(timeout_secs = timeout.as_secs_f64(), "Status check hit its deadline");
                Err(Error::Platform(PlatformError::Timeout))
            }
            other => other,
        }
    }

    /// Run one full reconciliation pass.
    ///
    /// Per-channel failures are recorded in the summary. Only an unreadable
    /// roster, Twitch attachments without a Twitch client, or cancellation
    /// fail the pass itself.
    pub async fn check_all(&self, cancel: &CancellationToken) -> Result<CheckSummary> {
        let _pass = self.pass_lock.lock().await;
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let streamers = self.roster.list().await?;
        let (channels, batch) = partition(&streamers);
        debug!(
            streamers = streamers.len(),
            youtube = channels.len(),
            twitch = batch.len(),
            "Starting status check"
        );

        let twitch = match (&self.twitch, batch.is_empty()) {
            (_, true) => None,
            (Some(client), false) => Some(client.clone()),
            (None, false) => {
                return Err(Error::config(format!(
                    "{} Twitch attachments but no Twitch credentials configured",
                    batch.len()
                )));
            }
        };

        let mut summary = CheckSummary::default();

        // Per-channel queries run on the runtime while the batch query runs here.
        let mut tasks = JoinSet::new();
        let mut task_targets = HashMap::new();
        for target in channels {
            let roster = self.roster.clone();
            let youtube = self.youtube.clone();
            let cancel = cancel.clone();
            let handle = {
                let target = target.clone();
                tasks.spawn(async move { check_channel(roster, youtube, target, cancel).await })
            };
            task_targets.insert(handle.id(), target);
        }

        if let Some(client) = twitch {
            self.check_batch(client.as_ref(), batch, cancel, &mut summary)
                .await;
        }

        while let Some(joined) = tasks.join_next_with_id().await {
            match joined {
                Ok((id, outcome)) => {
                    task_targets.remove(&id);
                    match outcome {
                        TaskOutcome::Observed { live, written } => {
                            summary.record_observation(live, written)
                        }
                        TaskOutcome::Failed(failure) => summary.record_failure(failure),
                    }
                }
                Err(e) => {
                    let Some(target) = task_targets.remove(&e.id()) else {
                        continue;
                    };
                    warn!(streamer_id = %target.streamer_id, error = %e, "Status task panicked");
                    summary.record_failure(failure_for(
                        &target.streamer_id,
                        &target.alias,
                        Platform::YouTube,
                        target.channel_id.clone(),
                        format!("status task failed: {e}"),
                    ));
                }
            }
        }

        if cancel.is_cancelled() {
            info!(
                checked = summary.checked,
                updated = summary.updated,
                "Status check cancelled"
            );
            return Err(Error::Cancelled);
        }

        info!(
            checked = summary.checked,
            online = summary.online,
            offline = summary.offline,
            updated = summary.updated,
            failed = summary.failed,
            "Status check complete"
        );
        Ok(summary)
    }

    async fn check_batch(
        &self,
        client: &dyn StreamsBatchApi,
        targets: Vec<BatchTarget>,
        cancel: &CancellationToken,
        summary: &mut CheckSummary,
    ) {
        let refs: Vec<_> = targets
            .iter()
            .map(|t| t.attachment.broadcaster_ref())
            .collect();

        let streams = match client.live_streams(&refs, cancel).await {
            Ok(streams) => streams,
            Err(e) => {
                warn!(count = targets.len(), error = %e, "Twitch batch query failed");
                for target in targets {
                    summary.record_failure(failure_for(
                        &target.streamer_id,
                        &target.alias,
                        Platform::Twitch,
                        Some(target.attachment.login.clone()),
                        e.to_string(),
                    ));
                }
                return;
            }
        };

        let now = Utc::now();
        for (target, broadcaster) in targets.into_iter().zip(refs) {
            let observed = streams
                .iter()
                .find(|s| broadcaster.matches(s))
                .map(|s| &s.broadcast);
            let key = target.attachment.channel_key();

            match apply_observation(
                self.roster.as_ref(),
                &key,
                target.current.as_ref(),
                observed,
                now,
            )
            .await
            {
                Ok(change) => summary.record_observation(observed.is_some(), !change.is_unchanged()),
                Err(e) => {
                    warn!(channel = %key, error = %e, "Failed to write Twitch status");
                    summary.record_failure(failure_for(
                        &target.streamer_id,
                        &target.alias,
                        Platform::Twitch,
                        Some(key.channel_id),
                        e.to_string(),
                    ));
                }
            }
        }
    }
}

async fn check_channel(
    roster: Arc<dyn RosterRepository>,
    youtube: Option<Arc<dyn LiveQueryApi>>,
    target: ChannelTarget,
    cancel: CancellationToken,
) -> TaskOutcome {
    let fail = |error: String| {
        TaskOutcome::Failed(failure_for(
            &target.streamer_id,
            &target.alias,
            Platform::YouTube,
            target.channel_id.clone(),
            error,
        ))
    };

    let Some(channel_id) = target.channel_id.as_deref() else {
        warn!(streamer_id = %target.streamer_id, "YouTube attachment has no usable channel id");
        return fail("no usable channel identifier".to_string());
    };
    let Some(youtube) = youtube else {
        return fail("no YouTube API key configured".to_string());
    };

    let observed: Option<Broadcast> = match youtube.live_broadcast(channel_id, &cancel).await {
        Ok(observed) => observed,
        Err(e) => {
            if e.is_transient() {
                warn!(channel_id, error = %e, "YouTube live query failed, retrying next pass");
            } else if !e.is_cancelled() {
                error!(channel_id, error = %e, "YouTube live query rejected");
            }
            return fail(e.to_string());
        }
    };

    let key = ChannelKey::youtube(channel_id);
    match apply_observation(
        roster.as_ref(),
        &key,
        target.current.as_ref(),
        observed.as_ref(),
        Utc::now(),
    )
    .await
    {
        Ok(change) => TaskOutcome::Observed {
            live: observed.is_some(),
            written: !matches!(change, StatusChange::Unchanged),
        },
        Err(e) => {
            warn!(channel = %key, error = %e, "Failed to write YouTube status");
            fail(e.to_string())
        }
    }
}

fn partition(streamers: &[Streamer]) -> (Vec<ChannelTarget>, Vec<BatchTarget>) {
    let mut channels = Vec::new();
    let mut batch = Vec::new();

    for streamer in streamers {
        if let Some(yt) = &streamer.platforms.youtube {
            channels.push(ChannelTarget {
                streamer_id: streamer.id.clone(),
                alias: streamer.alias.clone(),
                channel_id: yt.resolved_channel_id(),
                current: streamer.live_status.platform(Platform::YouTube).cloned(),
            });
        }
        if let Some(tw) = &streamer.platforms.twitch {
            batch.push(BatchTarget {
                streamer_id: streamer.id.clone(),
                alias: streamer.alias.clone(),
                attachment: tw.clone(),
                current: streamer.live_status.platform(Platform::Twitch).cloned(),
            });
        }
    }

    (channels, batch)
}

fn failure_for(
    streamer_id: &str,
    alias: &str,
    platform: Platform,
    channel_id: Option<String>,
    error: String,
) -> CheckFailure {
    CheckFailure {
        streamer_id: streamer_id.to_string(),
        alias: alias.to_string(),
        platform,
        channel_id,
        error,
    }
}

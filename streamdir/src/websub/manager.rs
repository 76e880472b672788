//! WebSub subscription lifecycle for YouTube channels.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashSet;
use platforms_api::LiveQueryApi;
use platforms_api::youtube::{handle_from_url, infer_channel_id, topic_url};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::domain::{ChannelKey, Lease, LeaseState, Platform, YouTubeAttachment, lease_state};
use crate::monitor::apply_observation;
use crate::roster::RosterRepository;
use crate::{Error, Result};

use super::feed::parse_notification;
use super::hub::{HubClient, HubMode, HubRequest};
use super::signature;

/// Lease and callback settings.
#[derive(Debug, Clone)]
pub struct WebSubConfig {
    /// Public origin the hub calls back to.
    pub public_base_url: String,
    pub lease_seconds: u64,
    /// Final share of a lease during which the sweep renews it.
    pub renewal_ratio: f64,
}

impl Default for WebSubConfig {
    fn default() -> Self {
        Self {
            public_base_url: "http://localhost:8080".to_string(),
            lease_seconds: 864_000,
            renewal_ratio: 0.05,
        }
    }
}

impl WebSubConfig {
    pub fn callback_url(&self, channel_id: &str) -> String {
        format!(
            "{}/websub/youtube/{}",
            self.public_base_url.trim_end_matches('/'),
            channel_id
        )
    }
}

/// Query parameters of a hub verification request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VerificationRequest {
    #[serde(rename = "hub.mode")]
    pub mode: String,
    #[serde(rename = "hub.topic", default)]
    pub topic: String,
    #[serde(rename = "hub.challenge")]
    pub challenge: Option<String>,
    #[serde(rename = "hub.lease_seconds")]
    pub lease_seconds: Option<u64>,
    #[serde(rename = "hub.reason")]
    pub reason: Option<String>,
}

/// Answer to a verification request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    /// Echo the challenge back.
    Accepted { challenge: String },
    /// The hub reported that it refused the subscription.
    Denied,
    Rejected { reason: String },
}

/// Result of handling one notification.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotificationOutcome {
    pub entries: usize,
    pub deleted: usize,
    pub updated: usize,
}

/// Outcome of the approval-time subscription attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SubscribeOutcome {
    Subscribed {
        channel_id: String,
        expires_at: DateTime<Utc>,
    },
    /// Attached but not subscribed; the next renewal sweep retries.
    Deferred { channel_id: String, reason: String },
}

/// Result of a renewal sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RenewalSummary {
    /// Attachments that hold or want a lease.
    pub inspected: usize,
    /// Leases extended inside their renewal window or after expiry.
    pub renewed: usize,
    /// Unsubscribed attachments that now hold a lease.
    pub subscribed: usize,
    pub failed: usize,
    /// Outside the renewal window.
    pub skipped: usize,
    /// Another request for the channel was still in flight.
    pub pending: usize,
    pub failures: Vec<RenewalFailure>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenewalFailure {
    pub streamer_id: String,
    pub channel_id: Option<String>,
    /// State the attachment was in when the sweep acted on it.
    pub state: LeaseState,
    pub error: String,
}

/// Owns hub subscriptions and authenticates hub traffic.
pub struct SubscriptionManager {
    roster: Arc<dyn RosterRepository>,
    hub: HubClient,
    /// Confirms "now live" for notified videos. Without it notifications are
    /// acknowledged and left to the next reconciliation pass.
    youtube: Option<Arc<dyn LiveQueryApi>>,
    config: WebSubConfig,
    /// Channels with a subscribe or unsubscribe request at the hub.
    in_flight: DashSet<String>,
}

/// Marks a channel in flight until dropped.
struct InFlight<'a> {
    channels: &'a DashSet<String>,
    channel_id: String,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.channels.remove(&self.channel_id);
    }
}

impl SubscriptionManager {
    pub fn new(
        roster: Arc<dyn RosterRepository>,
        hub: HubClient,
        youtube: Option<Arc<dyn LiveQueryApi>>,
        config: WebSubConfig,
    ) -> Self {
        Self {
            roster,
            hub,
            youtube,
            config,
            in_flight: DashSet::new(),
        }
    }

    fn claim(&self, channel_id: &str) -> Result<InFlight<'_>> {
        if !self.in_flight.insert(channel_id.to_string()) {
            return Err(Error::validation(format!(
                "a hub request for {channel_id} is already in flight"
            )));
        }
        Ok(InFlight {
            channels: &self.in_flight,
            channel_id: channel_id.to_string(),
        })
    }

    /// Subscription state of an attachment as the sweep sees it.
    pub fn state_of(&self, attachment: &YouTubeAttachment, now: DateTime<Utc>) -> LeaseState {
        let in_flight = attachment
            .resolved_channel_id()
            .is_some_and(|id| self.in_flight.contains(&id));
        lease_state(
            attachment.subscription.as_ref(),
            in_flight,
            now,
            self.config.renewal_ratio,
        )
    }

    /// Request a subscription for `channel_id` and return the lease it would
    /// hold. Nothing is written to the roster.
    pub async fn subscribe(
        &self,
        channel_id: &str,
        callback_url: &str,
        cancel: &CancellationToken,
    ) -> Result<Lease> {
        let _in_flight = self.claim(channel_id)?;
        self.request_subscription(channel_id, callback_url, Utc::now(), cancel)
            .await
    }

    /// The hub request behind [`subscribe`](Self::subscribe). Callers hold the
    /// channel in flight until the lease is stored.
    async fn request_subscription(
        &self,
        channel_id: &str,
        callback_url: &str,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<Lease> {
        let topic = topic_url(channel_id);
        let secret = generate_secret();

        self.hub
            .send(
                &HubRequest {
                    mode: HubMode::Subscribe,
                    topic: &topic,
                    callback: callback_url,
                    lease_seconds: Some(self.config.lease_seconds),
                    secret: Some(&secret),
                },
                cancel,
            )
            .await?;

        let lease = Lease::new(
            self.hub.hub_url(),
            topic,
            callback_url,
            secret,
            self.config.lease_seconds,
            now,
        );
        info!(
            channel_id,
            expires_at = %lease.expires_at,
            "Hub accepted subscription"
        );
        Ok(lease)
    }

    /// Unsubscribe from the hub and drop the stored lease. The channel stays
    /// attached but the renewal sweep no longer subscribes it.
    ///
    /// The lease is cleared before the request so the hub's verification,
    /// which may arrive before the response, finds no lease. It is restored
    /// when the hub rejects the request, unless a new lease took its place.
    pub async fn unsubscribe(&self, channel_id: &str, cancel: &CancellationToken) -> Result<()> {
        let key = ChannelKey::youtube(channel_id);
        let _in_flight = self.claim(channel_id)?;
        let owner = self.roster.find_by_channel(&key).await?;
        let Some(lease) = owner.platforms.youtube.and_then(|yt| yt.subscription) else {
            debug!(channel_id, "No lease held, nothing to unsubscribe");
            return Ok(());
        };

        self.roster.clear_subscription(&key, Some(Utc::now())).await?;
        let sent = self
            .hub
            .send(
                &HubRequest {
                    mode: HubMode::Unsubscribe,
                    topic: &lease.topic_url,
                    callback: &lease.callback_url,
                    lease_seconds: None,
                    secret: None,
                },
                cancel,
            )
            .await;

        if let Err(e) = sent {
            warn!(channel_id, error = %e, "Hub rejected unsubscribe, restoring lease");
            if !self.roster.restore_subscription(&key, lease).await? {
                debug!(channel_id, "Slot already holds a newer lease");
            }
            return Err(e);
        }
        info!(channel_id, "Unsubscribed");
        Ok(())
    }

    /// Approval-time entry point: attach the channel to the streamer and try
    /// to subscribe. A hub failure is reported as [`SubscribeOutcome::Deferred`]
    /// with the attachment kept.
    pub async fn establish(
        &self,
        streamer_id: &str,
        channel_input: &str,
        cancel: &CancellationToken,
    ) -> Result<SubscribeOutcome> {
        let channel_id = infer_channel_id(channel_input).ok_or_else(|| {
            Error::validation(format!("cannot infer a YouTube channel id from {channel_input:?}"))
        })?;

        let streamer = self.roster.get(streamer_id).await?;
        let attachment = match streamer.platforms.youtube {
            Some(existing)
                if existing.resolved_channel_id().as_deref() == Some(channel_id.as_str()) =>
            {
                YouTubeAttachment {
                    unsubscribed_at: None,
                    ..existing
                }
            }
            _ => YouTubeAttachment {
                channel_id: Some(channel_id.clone()),
                handle: handle_from_url(channel_input),
                topic_url: Some(topic_url(&channel_id)),
                subscription: None,
                unsubscribed_at: None,
            },
        };
        self.roster.attach_youtube(streamer_id, attachment).await?;

        let callback = self.config.callback_url(&channel_id);
        let requested = match self.claim(&channel_id) {
            Ok(guard) => self
                .request_subscription(&channel_id, &callback, Utc::now(), cancel)
                .await
                .map(|lease| (guard, lease)),
            Err(e) => Err(e),
        };
        match requested {
            Ok((_in_flight, lease)) => {
                let expires_at = lease.expires_at;
                self.roster
                    .update_subscription(&ChannelKey::youtube(&channel_id), lease)
                    .await?;
                Ok(SubscribeOutcome::Subscribed {
                    channel_id,
                    expires_at,
                })
            }
            Err(e) if e.is_cancelled() => Err(e),
            Err(e) => {
                warn!(streamer_id, channel_id = %channel_id, error = %e, "Subscription deferred");
                Ok(SubscribeOutcome::Deferred {
                    channel_id,
                    reason: e.to_string(),
                })
            }
        }
    }

    /// Answer a hub verification request addressed to `channel_id`.
    ///
    /// Fails with [`Error::NotFound`] when no streamer owns the channel.
    pub async fn verify_callback(
        &self,
        channel_id: &str,
        request: &VerificationRequest,
    ) -> Result<Verification> {
        let key = ChannelKey::youtube(channel_id);
        let owner = self.roster.find_by_channel(&key).await?;
        let Some(attachment) = owner.platforms.youtube else {
            return Err(Error::not_found("Channel", key.to_string()));
        };

        let expected_topic = topic_url(channel_id);
        let topic_matches = request.topic == expected_topic
            || attachment.topic_url.as_deref() == Some(request.topic.as_str());

        match request.mode.as_str() {
            "subscribe" => {
                if !topic_matches {
                    return Ok(reject(channel_id, "topic mismatch"));
                }
                let Some(challenge) = request.challenge.clone() else {
                    return Ok(reject(channel_id, "missing challenge"));
                };

                // Confirm against the lease stored now: a renewal may have
                // replaced the one read above.
                if let Some(seconds) = request.lease_seconds
                    && let Err(e) = self.roster.confirm_lease(&key, seconds, Utc::now()).await
                {
                    warn!(channel_id, error = %e, "Failed to record confirmed lease");
                }
                info!(channel_id, lease_seconds = ?request.lease_seconds, "Subscription verified");
                Ok(Verification::Accepted { challenge })
            }
            "unsubscribe" => {
                if !topic_matches {
                    return Ok(reject(channel_id, "topic mismatch"));
                }
                if attachment.subscription.is_some() {
                    return Ok(reject(channel_id, "lease still held"));
                }
                let Some(challenge) = request.challenge.clone() else {
                    return Ok(reject(channel_id, "missing challenge"));
                };
                info!(channel_id, "Unsubscription verified");
                Ok(Verification::Accepted { challenge })
            }
            "denied" => {
                warn!(
                    channel_id,
                    reason = request.reason.as_deref().unwrap_or("unspecified"),
                    "Hub denied subscription"
                );
                if attachment.subscription.is_some()
                    && let Err(e) = self.roster.clear_subscription(&key, None).await
                {
                    warn!(channel_id, error = %e, "Failed to clear denied lease");
                }
                Ok(Verification::Denied)
            }
            other => Ok(reject(channel_id, &format!("unknown mode {other:?}"))),
        }
    }

    /// Authenticate and apply a notification addressed to `channel_id`.
    ///
    /// The signature is checked against the channel's lease secret before the
    /// body is parsed. Each entry is confirmed with a video lookup; only a
    /// video that is live now, or the stored live broadcast having ended,
    /// produces a status write.
    pub async fn handle_notification(
        &self,
        channel_id: &str,
        body: &[u8],
        signature_header: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<NotificationOutcome> {
        let key = ChannelKey::youtube(channel_id);
        let owner = self.roster.find_by_channel(&key).await?;
        let lease = owner
            .platforms
            .youtube
            .as_ref()
            .and_then(|yt| yt.subscription.as_ref())
            .ok_or_else(|| Error::integrity(format!("no active subscription for {channel_id}")))?;

        if let Err(e) = signature::verify(lease.secret.as_bytes(), body, signature_header) {
            warn!(channel_id, error = %e, "Rejected notification");
            return Err(e);
        }

        let notification = parse_notification(body)?;
        let mut outcome = NotificationOutcome {
            entries: notification.entries.len(),
            deleted: notification.deleted.len(),
            updated: 0,
        };
        if notification.is_empty() {
            debug!(channel_id, "Notification carried no entries");
            return Ok(outcome);
        }
        debug!(
            channel_id,
            entries = outcome.entries,
            deleted = outcome.deleted,
            "Notification received"
        );

        let Some(youtube) = &self.youtube else {
            debug!(channel_id, "No YouTube client, leaving notification to the next pass");
            return Ok(outcome);
        };

        let mut current = owner.live_status.platform(Platform::YouTube).cloned();
        for entry in notification.entries {
            if entry.channel_id.as_deref().is_some_and(|c| c != channel_id) {
                debug!(channel_id, other = ?entry.channel_id, "Skipping entry for another channel");
                continue;
            }

            let observed = youtube.video_broadcast(&entry.video_id, cancel).await?;
            let is_current = current
                .as_ref()
                .is_some_and(|s| s.is_live && s.broadcast_id.as_deref() == Some(entry.video_id.as_str()));
            if observed.is_none() && !is_current {
                // An upload or an unrelated ended stream.
                continue;
            }

            let change = apply_observation(
                self.roster.as_ref(),
                &key,
                current.as_ref(),
                observed.as_ref(),
                Utc::now(),
            )
            .await?;
            if let Some(status) = change.into_write() {
                current = Some(status);
                outcome.updated += 1;
            }
        }

        Ok(outcome)
    }

    /// Renew every lease inside its renewal window (or already expired) and
    /// subscribe attached channels that hold no lease, such as a deferred
    /// approval or a lease the hub denied.
    ///
    /// A failed renewal leaves the old lease in place for the next sweep.
    /// Channels marked unsubscribed are left alone.
    pub async fn renew_due(
        &self,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<RenewalSummary> {
        let mut summary = RenewalSummary::default();

        for streamer in self.roster.list().await? {
            let Some(yt) = &streamer.platforms.youtube else {
                continue;
            };
            if !yt.wants_subscription() {
                continue;
            }
            summary.inspected += 1;

            let state = self.state_of(yt, now);
            let callback_url = match state {
                LeaseState::Subscribed => {
                    summary.skipped += 1;
                    continue;
                }
                LeaseState::Pending => {
                    summary.pending += 1;
                    continue;
                }
                LeaseState::Unsubscribed => yt
                    .resolved_channel_id()
                    .map(|id| self.config.callback_url(&id)),
                LeaseState::Renewing | LeaseState::Expired => {
                    yt.subscription.as_ref().map(|l| l.callback_url.clone())
                }
            };

            let channel_id = yt.resolved_channel_id();
            let result = match (channel_id.as_deref(), callback_url) {
                (Some(id), Some(callback)) => self.renew(id, &callback, now, cancel).await,
                _ => Err(Error::validation("no usable channel identifier")),
            };

            match result {
                Ok(()) if state == LeaseState::Unsubscribed => summary.subscribed += 1,
                Ok(()) => summary.renewed += 1,
                Err(e) if e.is_cancelled() => return Err(e),
                Err(e) => {
                    warn!(
                        streamer_id = %streamer.id,
                        channel_id = ?channel_id,
                        state = %state,
                        error = %e,
                        "Lease renewal failed"
                    );
                    summary.failed += 1;
                    summary.failures.push(RenewalFailure {
                        streamer_id: streamer.id.clone(),
                        channel_id,
                        state,
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            inspected = summary.inspected,
            renewed = summary.renewed,
            subscribed = summary.subscribed,
            failed = summary.failed,
            skipped = summary.skipped,
            pending = summary.pending,
            "Renewal sweep complete"
        );
        Ok(summary)
    }

    async fn renew(
        &self,
        channel_id: &str,
        callback_url: &str,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let _in_flight = self.claim(channel_id)?;
        let lease = self
            .request_subscription(channel_id, callback_url, now, cancel)
            .await?;
        self.roster
            .update_subscription(&ChannelKey::youtube(channel_id), lease)
            .await
    }
}

fn reject(channel_id: &str, reason: &str) -> Verification {
    warn!(channel_id, reason, "Rejected verification request");
    Verification::Rejected {
        reason: reason.to_string(),
    }
}

/// A fresh 256-bit hex secret.
fn generate_secret() -> String {
    hex::encode(rand::random::<[u8; 32]>())
}

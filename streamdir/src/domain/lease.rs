//! WebSub lease metadata.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Lease metadata for an accepted hub subscription.
///
/// `expires_at` is `subscribed_at + lease_seconds`. The hub may shorten or
/// extend a lease on its own, so the value is a local estimate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lease {
    pub hub_url: String,
    pub topic_url: String,
    pub callback_url: String,
    /// Shared HMAC secret for notification signatures.
    pub secret: String,
    pub lease_seconds: u64,
    pub subscribed_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Per-attachment subscription state, derived from the lease, the clock and
/// whether a hub request for the channel is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaseState {
    Unsubscribed,
    /// A subscribe request is in flight.
    Pending,
    Subscribed,
    /// Inside the renewal window.
    Renewing,
    /// Past the local expiry estimate without a successful renewal.
    Expired,
}

impl fmt::Display for LeaseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LeaseState::Unsubscribed => "unsubscribed",
            LeaseState::Pending => "pending",
            LeaseState::Subscribed => "subscribed",
            LeaseState::Renewing => "renewing",
            LeaseState::Expired => "expired",
        };
        f.write_str(name)
    }
}

impl Lease {
    pub fn new(
        hub_url: impl Into<String>,
        topic_url: impl Into<String>,
        callback_url: impl Into<String>,
        secret: impl Into<String>,
        lease_seconds: u64,
        subscribed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            hub_url: hub_url.into(),
            topic_url: topic_url.into(),
            callback_url: callback_url.into(),
            secret: secret.into(),
            lease_seconds,
            subscribed_at,
            expires_at: expiry(subscribed_at, lease_seconds),
        }
    }

    /// Time left until the local expiry estimate (negative once expired).
    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        self.expires_at - now
    }

    /// Length of the renewal window: the final `ratio` share of the lease.
    pub fn renewal_window(&self, ratio: f64) -> Duration {
        let ratio = ratio.clamp(0.0, 1.0);
        Duration::milliseconds((self.lease_seconds as f64 * ratio * 1000.0) as i64)
    }

    /// Whether the sweep should renew this lease now.
    pub fn is_due(&self, now: DateTime<Utc>, ratio: f64) -> bool {
        self.remaining(now) <= self.renewal_window(ratio)
    }

    pub fn state(&self, now: DateTime<Utc>, ratio: f64) -> LeaseState {
        if self.remaining(now) <= Duration::zero() {
            LeaseState::Expired
        } else if self.is_due(now, ratio) {
            LeaseState::Renewing
        } else {
            LeaseState::Subscribed
        }
    }

    /// Apply a lease duration confirmed by the hub during verification.
    pub fn confirm(&mut self, lease_seconds: u64, now: DateTime<Utc>) {
        self.lease_seconds = lease_seconds;
        self.expires_at = expiry(now, lease_seconds);
    }
}

/// State for an optional lease slot. An in-flight request wins over whatever
/// the slot holds.
pub fn lease_state(
    lease: Option<&Lease>,
    in_flight: bool,
    now: DateTime<Utc>,
    ratio: f64,
) -> LeaseState {
    if in_flight {
        return LeaseState::Pending;
    }
    lease.map_or(LeaseState::Unsubscribed, |l| l.state(now, ratio))
}

fn expiry(start: DateTime<Utc>, lease_seconds: u64) -> DateTime<Utc> {
    i64::try_from(lease_seconds)
        .ok()
        .and_then(Duration::try_seconds)
        .and_then(|d| start.checked_add_signed(d))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn lease_at(start: DateTime<Utc>) -> Lease {
        Lease::new(
            "https://hub.example/subscribe",
            "https://www.youtube.com/xml/feeds/videos.xml?channel_id=UC1",
            "https://dir.example/websub/youtube/UC1",
            "secret",
            1000,
            start,
        )
    }

    #[test]
    fn test_expiry_is_start_plus_duration() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let lease = lease_at(start);
        assert_eq!(lease.expires_at, start + Duration::seconds(1000));
    }

    #[test]
    fn test_state_transitions_over_time() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let lease = lease_at(start);

        // 5% of 1000s = 50s window
        assert_eq!(lease.state(start, 0.05), LeaseState::Subscribed);
        assert_eq!(
            lease.state(start + Duration::seconds(949), 0.05),
            LeaseState::Subscribed
        );
        assert_eq!(
            lease.state(start + Duration::seconds(950), 0.05),
            LeaseState::Renewing
        );
        assert_eq!(
            lease.state(start + Duration::seconds(1000), 0.05),
            LeaseState::Expired
        );
        assert!(lease.is_due(start + Duration::seconds(2000), 0.05));
    }

    #[test]
    fn test_lease_state_slot() {
        let now = Utc::now();
        let lease = lease_at(now);
        assert_eq!(lease_state(None, false, now, 0.05), LeaseState::Unsubscribed);
        assert_eq!(lease_state(None, true, now, 0.05), LeaseState::Pending);
        assert_eq!(lease_state(Some(&lease), true, now, 0.05), LeaseState::Pending);
        assert_eq!(lease_state(Some(&lease), false, now, 0.05), LeaseState::Subscribed);
        assert_eq!(LeaseState::Renewing.to_string(), "renewing");
    }

    #[test]
    fn test_confirm_moves_expiry() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut lease = lease_at(start);
        let later = start + Duration::seconds(10);
        lease.confirm(500, later);
        assert_eq!(lease.lease_seconds, 500);
        assert_eq!(lease.expires_at, later + Duration::seconds(500));
    }
}

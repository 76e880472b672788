//! The online/offline/idempotent decision rule shared by full passes and
//! hub notifications.

use chrono::{DateTime, Utc};
use platforms_api::Broadcast;
use tracing::{debug, info};

use crate::Result;
use crate::domain::{ChannelKey, PlatformStatus};
use crate::roster::RosterRepository;

/// Outcome of comparing a stored status with a fresh observation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusChange {
    /// Nothing to write.
    Unchanged,
    /// Previously offline, or live with a different broadcast.
    WentLive(PlatformStatus),
    WentOffline(PlatformStatus),
}

impl StatusChange {
    pub fn is_unchanged(&self) -> bool {
        matches!(self, StatusChange::Unchanged)
    }

    /// The status to persist, if any.
    pub fn into_write(self) -> Option<PlatformStatus> {
        match self {
            StatusChange::Unchanged => None,
            StatusChange::WentLive(status) | StatusChange::WentOffline(status) => Some(status),
        }
    }
}

/// Decide what to write for one attachment.
///
/// - no live broadcast while stored live: offline
/// - live broadcast with the stored broadcast id while stored live: no-op
/// - any other live broadcast: live with the new id and start time
pub fn decide(
    current: Option<&PlatformStatus>,
    observed: Option<&Broadcast>,
    now: DateTime<Utc>,
) -> StatusChange {
    let currently_live = current.is_some_and(|s| s.is_live);
    match observed {
        None if currently_live => StatusChange::WentOffline(PlatformStatus::offline(now)),
        None => StatusChange::Unchanged,
        Some(broadcast)
            if currently_live
                && current.and_then(|s| s.broadcast_id.as_deref()) == Some(broadcast.id.as_str()) =>
        {
            StatusChange::Unchanged
        }
        Some(broadcast) => StatusChange::WentLive(PlatformStatus::live(broadcast, now)),
    }
}

/// Decide and, when the status changed, write it for `key`.
pub async fn apply_observation(
    roster: &dyn RosterRepository,
    key: &ChannelKey,
    current: Option<&PlatformStatus>,
    observed: Option<&Broadcast>,
    now: DateTime<Utc>,
) -> Result<StatusChange> {
    let change = decide(current, observed, now);
    match &change {
        StatusChange::Unchanged => {
            debug!(channel = %key, "Status unchanged");
        }
        StatusChange::WentLive(status) => {
            roster.update_live_status(key, status.clone()).await?;
            info!(
                channel = %key,
                broadcast_id = status.broadcast_id.as_deref().unwrap_or_default(),
                "Channel went live"
            );
        }
        StatusChange::WentOffline(status) => {
            roster.update_live_status(key, status.clone()).await?;
            info!(channel = %key, "Channel went offline");
        }
    }
    Ok(change)
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn live(id: &str) -> PlatformStatus {
        PlatformStatus::live(&Broadcast::new(id), now() - Duration::minutes(5))
    }

    #[test]
    fn test_offline_observations() {
        assert_eq!(decide(None, None, now()), StatusChange::Unchanged);
        assert_eq!(
            decide(Some(&PlatformStatus::offline(now())), None, now()),
            StatusChange::Unchanged
        );
        assert_eq!(
            decide(Some(&live("a")), None, now()),
            StatusChange::WentOffline(PlatformStatus::offline(now()))
        );
    }

    #[test]
    fn test_same_broadcast_is_noop() {
        let current = live("a");
        assert!(decide(Some(&current), Some(&Broadcast::new("a")), now()).is_unchanged());
    }

    #[test]
    fn test_new_broadcast_goes_live() {
        let started = now() - Duration::minutes(1);
        let observed = Broadcast::new("b").with_started_at(started);

        for current in [None, Some(PlatformStatus::offline(now())), Some(live("a"))] {
            let change = decide(current.as_ref(), Some(&observed), now());
            let status = change.into_write().unwrap();
            assert!(status.is_live);
            assert_eq!(status.broadcast_id.as_deref(), Some("b"));
            assert_eq!(status.started_at, Some(started));
        }
    }

    #[test]
    fn test_stale_offline_status_with_old_id_goes_live() {
        // An offline record that still names the broadcast is not "already live".
        let mut current = live("a");
        current.is_live = false;
        let change = decide(Some(&current), Some(&Broadcast::new("a")), now());
        assert!(matches!(change, StatusChange::WentLive(_)));
    }
}

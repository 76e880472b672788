//! Live-status snapshot.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use platforms_api::Broadcast;
use serde::{Deserialize, Serialize};

use super::platform::Platform;

/// Observed status of a single platform attachment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformStatus {
    pub is_live: bool,
    /// Identifier of the current live session; the dedup key.
    pub broadcast_id: Option<String>,
    pub title: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub checked_at: DateTime<Utc>,
}

impl PlatformStatus {
    /// A live status for `broadcast`. Without an upstream start time the
    /// observation time stands in.
    pub fn live(broadcast: &Broadcast, now: DateTime<Utc>) -> Self {
        Self {
            is_live: true,
            broadcast_id: Some(broadcast.id.clone()),
            title: broadcast.title.clone(),
            started_at: Some(broadcast.started_at.unwrap_or(now)),
            checked_at: now,
        }
    }

    pub fn offline(now: DateTime<Utc>) -> Self {
        Self {
            is_live: false,
            broadcast_id: None,
            title: None,
            started_at: None,
            checked_at: now,
        }
    }
}

/// Live-status snapshot of a streamer.
///
/// `is_live` and `live_platforms` are derived from `platforms` on every write
/// and on load, so the overall flag is true exactly when some platform is live.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "LiveStatusRepr")]
pub struct LiveStatus {
    is_live: bool,
    live_platforms: BTreeSet<Platform>,
    platforms: BTreeMap<Platform, PlatformStatus>,
}

#[derive(Deserialize)]
struct LiveStatusRepr {
    #[serde(default)]
    platforms: BTreeMap<Platform, PlatformStatus>,
}

impl From<LiveStatusRepr> for LiveStatus {
    fn from(repr: LiveStatusRepr) -> Self {
        let mut status = LiveStatus {
            platforms: repr.platforms,
            ..Default::default()
        };
        status.recompute();
        status
    }
}

impl LiveStatus {
    pub fn is_live(&self) -> bool {
        self.is_live
    }

    pub fn live_platforms(&self) -> &BTreeSet<Platform> {
        &self.live_platforms
    }

    pub fn platform(&self, platform: Platform) -> Option<&PlatformStatus> {
        self.platforms.get(&platform)
    }

    /// Replace one platform's status and refresh the derived fields.
    pub fn set_platform(&mut self, platform: Platform, status: PlatformStatus) {
        self.platforms.insert(platform, status);
        self.recompute();
    }

    fn recompute(&mut self) {
        self.live_platforms = self
            .platforms
            .iter()
            .filter(|(_, status)| status.is_live)
            .map(|(platform, _)| *platform)
            .collect();
        self.is_live = !self.live_platforms.is_empty();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overall_flag_follows_platforms() {
        let now = Utc::now();
        let mut status = LiveStatus::default();
        assert!(!status.is_live());

        status.set_platform(Platform::YouTube, PlatformStatus::live(&Broadcast::new("v1"), now));
        status.set_platform(Platform::Twitch, PlatformStatus::offline(now));
        assert!(status.is_live());
        assert_eq!(
            status.live_platforms().iter().copied().collect::<Vec<_>>(),
            vec![Platform::YouTube]
        );

        status.set_platform(Platform::YouTube, PlatformStatus::offline(now));
        assert!(!status.is_live());
        assert!(status.live_platforms().is_empty());
    }

    #[test]
    fn test_live_without_start_time_uses_observation_time() {
        let now = Utc::now();
        let status = PlatformStatus::live(&Broadcast::new("v1"), now);
        assert_eq!(status.started_at, Some(now));
    }

    #[test]
    fn test_derived_fields_recomputed_on_load() {
        // A stale top-level flag in the file is ignored.
        let json = r#"{
            "is_live": false,
            "live_platforms": [],
            "platforms": {
                "twitch": {
                    "is_live": true,
                    "broadcast_id": "s1",
                    "title": null,
                    "started_at": "2024-05-01T10:00:00Z",
                    "checked_at": "2024-05-01T10:01:00Z"
                }
            }
        }"#;
        let status: LiveStatus = serde_json::from_str(json).unwrap();
        assert!(status.is_live());
        assert!(status.live_platforms().contains(&Platform::Twitch));

        let round: LiveStatus =
            serde_json::from_str(&serde_json::to_string(&status).unwrap()).unwrap();
        assert_eq!(round, status);
    }
}

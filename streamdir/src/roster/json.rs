//! JSON-file implementation of [`RosterRepository`].

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::domain::{
    ChannelKey, Lease, Platform, PlatformStatus, Streamer, YouTubeAttachment,
};
use crate::utils::fs;
use crate::{Error, Result};

use super::repository::RosterRepository;

/// Roster stored as one JSON array on disk.
///
/// Writes go through a temporary file and a rename, so a crash mid-write
/// leaves the last complete roster in place.
pub struct JsonRosterRepository {
    path: PathBuf,
    /// Serializes read-modify-write cycles.
    write_lock: Mutex<()>,
}

impl JsonRosterRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the roster, creating an empty file when none exists.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let repo = Self::new(path);
        if !tokio::fs::try_exists(&repo.path).await? {
            info!(path = %repo.path.display(), "Creating empty roster");
            repo.write_all(&[]).await?;
        }
        let count = repo.read_all().await?.len();
        info!(path = %repo.path.display(), count, "Roster loaded");
        Ok(repo)
    }

    async fn read_all(&self) -> Result<Vec<Streamer>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn write_all(&self, streamers: &[Streamer]) -> Result<()> {
        let contents = serde_json::to_vec_pretty(streamers)?;
        fs::ensure_parent_dir(&self.path).await?;

        let path = self.path.clone();
        tokio::task::spawn_blocking(move || fs::write_atomic_sync(&path, &contents))
            .await
            .map_err(|e| Error::Other(format!("roster write task failed: {e}")))?
    }

    /// Run `f` over the full roster inside the critical section and persist
    /// the result. Nothing is written when `f` fails.
    async fn mutate<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Vec<Streamer>) -> Result<T> + Send,
        T: Send,
    {
        let _guard = self.write_lock.lock().await;
        let mut streamers = self.read_all().await?;
        let output = f(&mut streamers)?;
        self.write_all(&streamers).await?;
        Ok(output)
    }
}

fn owner_mut<'a>(streamers: &'a mut [Streamer], key: &ChannelKey) -> Result<&'a mut Streamer> {
    streamers
        .iter_mut()
        .find(|s| s.owns(key))
        .ok_or_else(|| Error::not_found("Channel", key.to_string()))
}

fn youtube_owner_mut<'a>(
    streamers: &'a mut [Streamer],
    key: &ChannelKey,
) -> Result<&'a mut YouTubeAttachment> {
    if key.platform != Platform::YouTube {
        return Err(Error::validation(format!(
            "{} attachments do not hold subscriptions",
            key.platform
        )));
    }
    let owner = owner_mut(streamers, key)?;
    owner
        .platforms
        .youtube
        .as_mut()
        .ok_or_else(|| Error::not_found("Channel", key.to_string()))
}

#[async_trait]
impl RosterRepository for JsonRosterRepository {
    async fn list(&self) -> Result<Vec<Streamer>> {
        self.read_all().await
    }

    async fn get(&self, id: &str) -> Result<Streamer> {
        self.read_all()
            .await?
            .into_iter()
            .find(|s| s.id == id)
            .ok_or_else(|| Error::not_found("Streamer", id))
    }

    async fn find_by_channel(&self, key: &ChannelKey) -> Result<Streamer> {
        self.read_all()
            .await?
            .into_iter()
            .find(|s| s.owns(key))
            .ok_or_else(|| Error::not_found("Channel", key.to_string()))
    }

    async fn insert(&self, streamer: Streamer) -> Result<()> {
        self.mutate(move |streamers| {
            if streamers.iter().any(|s| s.id == streamer.id) {
                return Err(Error::validation(format!(
                    "streamer {} already exists",
                    streamer.id
                )));
            }
            debug!(id = %streamer.id, alias = %streamer.alias, "Inserting streamer");
            streamers.push(streamer);
            Ok(())
        })
        .await
    }

    async fn remove(&self, id: &str) -> Result<Streamer> {
        self.mutate(|streamers| {
            let index = streamers
                .iter()
                .position(|s| s.id == id)
                .ok_or_else(|| Error::not_found("Streamer", id))?;
            Ok(streamers.remove(index))
        })
        .await
    }

    async fn update_live_status(&self, key: &ChannelKey, status: PlatformStatus) -> Result<()> {
        if key.platform == Platform::Page {
            return Err(Error::validation("page attachments have no live status"));
        }
        self.mutate(|streamers| {
            let owner = owner_mut(streamers, key)?;
            debug!(
                streamer_id = %owner.id,
                channel = %key,
                is_live = status.is_live,
                "Writing live status"
            );
            owner.live_status.set_platform(key.platform, status);
            Ok(())
        })
        .await
    }

    async fn update_subscription(&self, key: &ChannelKey, lease: Lease) -> Result<()> {
        self.mutate(|streamers| {
            let attachment = youtube_owner_mut(streamers, key)?;
            attachment.subscription = Some(lease);
            attachment.unsubscribed_at = None;
            Ok(())
        })
        .await
    }

    async fn confirm_lease(
        &self,
        key: &ChannelKey,
        lease_seconds: u64,
        now: DateTime<Utc>,
    ) -> Result<Option<Lease>> {
        self.mutate(|streamers| {
            let attachment = youtube_owner_mut(streamers, key)?;
            Ok(attachment.subscription.as_mut().map(|lease| {
                lease.confirm(lease_seconds, now);
                lease.clone()
            }))
        })
        .await
    }

    async fn restore_subscription(&self, key: &ChannelKey, lease: Lease) -> Result<bool> {
        self.mutate(|streamers| {
            let attachment = youtube_owner_mut(streamers, key)?;
            if attachment.subscription.is_some() {
                return Ok(false);
            }
            attachment.subscription = Some(lease);
            attachment.unsubscribed_at = None;
            Ok(true)
        })
        .await
    }

    async fn clear_subscription(
        &self,
        key: &ChannelKey,
        unsubscribed_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        self.mutate(|streamers| {
            let attachment = youtube_owner_mut(streamers, key)?;
            attachment.subscription = None;
            attachment.unsubscribed_at = unsubscribed_at;
            Ok(())
        })
        .await
    }

    async fn attach_youtube(
        &self,
        streamer_id: &str,
        attachment: YouTubeAttachment,
    ) -> Result<Streamer> {
        self.mutate(|streamers| {
            let streamer = streamers
                .iter_mut()
                .find(|s| s.id == streamer_id)
                .ok_or_else(|| Error::not_found("Streamer", streamer_id))?;

            let mut attachment = attachment;
            if let Some(existing) = streamer.platforms.youtube.take()
                && existing.resolved_channel_id() == attachment.resolved_channel_id()
                && attachment.subscription.is_none()
            {
                attachment.subscription = existing.subscription;
            }
            streamer.platforms.youtube = Some(attachment);
            Ok(streamer.clone())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;
    use platforms_api::Broadcast;
    use tempfile::TempDir;

    use super::*;
    use crate::domain::TwitchAttachment;

    const YT: &str = "UCabcdefghijklmnopqrstuv";

    fn sample() -> Streamer {
        Streamer::new("Sample")
            .with_languages(["en", "ja"])
            .with_youtube(YouTubeAttachment::with_channel_id(YT))
            .with_twitch(TwitchAttachment::new("sample"))
    }

    async fn repo(temp: &TempDir) -> JsonRosterRepository {
        JsonRosterRepository::open(temp.path().join("data/streamers.json"))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_open_creates_empty_roster() {
        let temp = TempDir::new().unwrap();
        let repo = repo(&temp).await;
        assert!(repo.path().exists());
        assert!(repo.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_insert_get_remove() {
        let temp = TempDir::new().unwrap();
        let repo = repo(&temp).await;
        let streamer = sample();

        repo.insert(streamer.clone()).await.unwrap();
        assert_eq!(repo.get(&streamer.id).await.unwrap(), streamer);

        let dup = repo.insert(streamer.clone()).await;
        assert!(matches!(dup, Err(Error::Validation(_))));

        let removed = repo.remove(&streamer.id).await.unwrap();
        assert_eq!(removed.id, streamer.id);
        assert!(matches!(
            repo.get(&streamer.id).await,
            Err(Error::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_update_live_status_replaces_one_platform() {
        let temp = TempDir::new().unwrap();
        let repo = repo(&temp).await;
        let streamer = sample();
        repo.insert(streamer.clone()).await.unwrap();

        let now = Utc::now();
        repo.update_live_status(
            &ChannelKey::twitch("sample"),
            PlatformStatus::offline(now),
        )
        .await
        .unwrap();
        repo.update_live_status(
            &ChannelKey::youtube(YT),
            PlatformStatus::live(&Broadcast::new("v1"), now),
        )
        .await
        .unwrap();

        let stored = repo.get(&streamer.id).await.unwrap();
        assert!(stored.live_status.is_live());
        assert_eq!(
            stored
                .live_status
                .platform(Platform::YouTube)
                .and_then(|s| s.broadcast_id.as_deref()),
            Some("v1")
        );
        assert!(!stored.live_status.platform(Platform::Twitch).unwrap().is_live);
    }

    #[tokio::test]
    async fn test_unknown_channel_is_not_found() {
        let temp = TempDir::new().unwrap();
        let repo = repo(&temp).await;
        repo.insert(sample()).await.unwrap();

        let result = repo
            .update_live_status(
                &ChannelKey::twitch("nobody"),
                PlatformStatus::offline(Utc::now()),
            )
            .await;
        assert!(matches!(result, Err(Error::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_subscription_update_and_clear() {
        let temp = TempDir::new().unwrap();
        let repo = repo(&temp).await;
        let streamer = sample();
        repo.insert(streamer.clone()).await.unwrap();

        let lease = Lease::new("hub", "topic", "cb", "secret", 100, Utc::now());
        repo.update_subscription(&ChannelKey::youtube(YT), lease.clone())
            .await
            .unwrap();
        let stored = repo.get(&streamer.id).await.unwrap();
        assert_eq!(
            stored.platforms.youtube.unwrap().subscription,
            Some(lease.clone())
        );

        let wrong_platform = repo
            .update_subscription(&ChannelKey::twitch("sample"), lease)
            .await;
        assert!(matches!(wrong_platform, Err(Error::Validation(_))));

        repo.clear_subscription(&ChannelKey::youtube(YT), Some(Utc::now()))
            .await
            .unwrap();
        let yt = repo.get(&streamer.id).await.unwrap().platforms.youtube.unwrap();
        assert!(!yt.is_subscribed());
        assert!(!yt.wants_subscription());

        // A new lease lifts the unsubscribe marker.
        repo.update_subscription(
            &ChannelKey::youtube(YT),
            Lease::new("hub", "topic", "cb", "again", 100, Utc::now()),
        )
        .await
        .unwrap();
        let yt = repo.get(&streamer.id).await.unwrap().platforms.youtube.unwrap();
        assert_eq!(yt.unsubscribed_at, None);
    }

    #[tokio::test]
    async fn test_confirm_lease_applies_to_stored_lease() {
        let temp = TempDir::new().unwrap();
        let repo = repo(&temp).await;
        let streamer = sample();
        repo.insert(streamer.clone()).await.unwrap();
        let key = ChannelKey::youtube(YT);
        let now = Utc::now();

        assert_eq!(repo.confirm_lease(&key, 50, now).await.unwrap(), None);

        let current = Lease::new("hub", "topic", "cb", "current", 100, now);
        repo.update_subscription(&key, current).await.unwrap();
        let confirmed = repo.confirm_lease(&key, 50, now).await.unwrap().unwrap();
        assert_eq!(confirmed.secret, "current");
        assert_eq!(confirmed.lease_seconds, 50);
        assert_eq!(confirmed.expires_at, now + chrono::Duration::seconds(50));

        let stored = repo.get(&streamer.id).await.unwrap();
        assert_eq!(stored.platforms.youtube.unwrap().subscription, Some(confirmed));
    }

    #[tokio::test]
    async fn test_restore_subscription_only_into_empty_slot() {
        let temp = TempDir::new().unwrap();
        let repo = repo(&temp).await;
        let streamer = sample();
        repo.insert(streamer.clone()).await.unwrap();
        let key = ChannelKey::youtube(YT);

        let old = Lease::new("hub", "topic", "cb", "old", 100, Utc::now());
        assert!(repo.restore_subscription(&key, old.clone()).await.unwrap());

        let fresh = Lease::new("hub", "topic", "cb", "fresh", 100, Utc::now());
        repo.update_subscription(&key, fresh.clone()).await.unwrap();
        assert!(!repo.restore_subscription(&key, old).await.unwrap());

        let stored = repo.get(&streamer.id).await.unwrap();
        assert_eq!(stored.platforms.youtube.unwrap().subscription, Some(fresh));
    }

    #[tokio::test]
    async fn test_attach_youtube_keeps_lease_for_same_channel() {
        let temp = TempDir::new().unwrap();
        let repo = repo(&temp).await;
        let streamer = sample();
        repo.insert(streamer.clone()).await.unwrap();

        let lease = Lease::new("hub", "topic", "cb", "secret", 100, Utc::now());
        repo.update_subscription(&ChannelKey::youtube(YT), lease.clone())
            .await
            .unwrap();

        let updated = repo
            .attach_youtube(
                &streamer.id,
                YouTubeAttachment {
                    handle: Some("@sample".into()),
                    ..YouTubeAttachment::with_channel_id(YT)
                },
            )
            .await
            .unwrap();
        let yt = updated.platforms.youtube.unwrap();
        assert_eq!(yt.handle.as_deref(), Some("@sample"));
        assert_eq!(yt.subscription, Some(lease));
    }

    #[tokio::test]
    async fn test_state_survives_reopen() {
        let temp = TempDir::new().unwrap();
        let streamer = sample()
            .with_description("Speedruns and retro games")
            .with_languages(["en", "de"])
            .with_page("https://example.com/sample");
        {
            let repo = repo(&temp).await;
            repo.insert(streamer.clone()).await.unwrap();
        }
        let reopened = repo(&temp).await;
        assert_eq!(reopened.list().await.unwrap(), vec![streamer]);
    }

    #[tokio::test]
    async fn test_malformed_file_is_serialization_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("streamers.json");
        std::fs::write(&path, "{ not json").unwrap();

        let repo = JsonRosterRepository::new(&path);
        assert!(matches!(repo.list().await, Err(Error::Serialization(_))));
    }

    #[tokio::test]
    async fn test_concurrent_updates_are_not_lost() {
        let temp = TempDir::new().unwrap();
        let repo = Arc::new(repo(&temp).await);

        let mut ids = Vec::new();
        for i in 0..8 {
            let streamer =
                Streamer::new(format!("s{i}")).with_twitch(TwitchAttachment::new(format!("login{i}")));
            ids.push(streamer.id.clone());
            repo.insert(streamer).await.unwrap();
        }

        let now = Utc::now();
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let repo = repo.clone();
                tokio::spawn(async move {
                    repo.update_live_status(
                        &ChannelKey::twitch(format!("login{i}")),
                        PlatformStatus::live(&Broadcast::new(format!("b{i}")), now),
                    )
                    .await
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let all = repo.list().await.unwrap();
        assert_eq!(all.len(), 8);
        assert!(all.iter().all(|s| s.live_status.is_live()));
    }
}

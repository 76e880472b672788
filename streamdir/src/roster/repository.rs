//! Roster repository trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::Result;
use crate::domain::{ChannelKey, Lease, PlatformStatus, Streamer, YouTubeAttachment};

/// Roster repository trait.
///
/// Lookups by [`ChannelKey`] locate the record that owns the attachment; a key
/// no record owns is [`Error::NotFound`](crate::Error::NotFound).
#[async_trait]
pub trait RosterRepository: Send + Sync {
    /// A copy of every record, in roster order.
    async fn list(&self) -> Result<Vec<Streamer>>;
    async fn get(&self, id: &str) -> Result<Streamer>;
    async fn find_by_channel(&self, key: &ChannelKey) -> Result<Streamer>;
    /// Append a record. Duplicate ids are a validation error.
    async fn insert(&self, streamer: Streamer) -> Result<()>;
    async fn remove(&self, id: &str) -> Result<Streamer>;

    /// Replace the status of the platform named by `key` on its owner.
    async fn update_live_status(&self, key: &ChannelKey, status: PlatformStatus) -> Result<()>;
    /// Replace the lease of the YouTube attachment named by `key`. Clears an
    /// earlier unsubscribe marker.
    async fn update_subscription(&self, key: &ChannelKey, lease: Lease) -> Result<()>;
    /// Apply a hub-confirmed lease duration to whatever lease is stored now.
    /// Returns the updated lease, or `None` when no lease is held.
    async fn confirm_lease(
        &self,
        key: &ChannelKey,
        lease_seconds: u64,
        now: DateTime<Utc>,
    ) -> Result<Option<Lease>>;
    /// Put `lease` back only if the slot is still empty. Returns whether it
    /// was written.
    async fn restore_subscription(&self, key: &ChannelKey, lease: Lease) -> Result<bool>;
    /// Drop the lease of the YouTube attachment named by `key`. With
    /// `unsubscribed_at` set the channel is also marked as deliberately
    /// unsubscribed, which keeps the renewal sweep away from it.
    async fn clear_subscription(
        &self,
        key: &ChannelKey,
        unsubscribed_at: Option<DateTime<Utc>>,
    ) -> Result<()>;
    /// Set the YouTube slot of a streamer, keeping an existing lease when the
    /// channel is unchanged. Returns the updated record.
    async fn attach_youtube(
        &self,
        streamer_id: &str,
        attachment: YouTubeAttachment,
    ) -> Result<Streamer>;
}

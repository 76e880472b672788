//! In-memory platform fakes for unit tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use platforms_api::api::{BroadcasterRef, LiveStream};
use platforms_api::{Broadcast, LiveQueryApi, PlatformError, StreamsBatchApi};
use tokio_util::sync::CancellationToken;

/// Scripted [`LiveQueryApi`]: channels and videos not registered are offline.
#[derive(Clone, Default)]
pub struct FakeLiveQuery {
    live: HashMap<String, Broadcast>,
    videos: HashMap<String, Broadcast>,
    failing: Vec<String>,
    delay: Duration,
    calls: Arc<AtomicUsize>,
}

impl FakeLiveQuery {
    pub fn with_live(mut self, channel_id: &str, broadcast: Broadcast) -> Self {
        self.live.insert(channel_id.to_string(), broadcast);
        self
    }

    pub fn with_live_video(mut self, broadcast: Broadcast) -> Self {
        self.videos.insert(broadcast.id.clone(), broadcast);
        self
    }

    pub fn with_failure(mut self, channel_id: &str) -> Self {
        self.failing.push(channel_id.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn pause(&self, cancel: &CancellationToken) -> Result<(), PlatformError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if cancel.is_cancelled() {
            return Err(PlatformError::Cancelled);
        }
        tokio::select! {
            _ = cancel.cancelled() => Err(PlatformError::Cancelled),
            _ = tokio::time::sleep(self.delay) => Ok(()),
        }
    }
}

#[async_trait]
impl LiveQueryApi for FakeLiveQuery {
    async fn live_broadcast(
        &self,
        channel_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<Broadcast>, PlatformError> {
        self.pause(cancel).await?;
        if self.failing.iter().any(|c| c == channel_id) {
            return Err(PlatformError::Decode("scripted failure".into()));
        }
        Ok(self.live.get(channel_id).cloned())
    }

    async fn video_broadcast(
        &self,
        video_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<Broadcast>, PlatformError> {
        self.pause(cancel).await?;
        Ok(self.videos.get(video_id).cloned())
    }
}

/// Scripted [`StreamsBatchApi`].
#[derive(Clone, Default)]
pub struct FakeStreams {
    streams: Vec<LiveStream>,
    fail: bool,
    calls: Arc<AtomicUsize>,
}

impl FakeStreams {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn with_live(mut self, user_id: &str, login: &str, stream_id: &str) -> Self {
        self.streams.push(LiveStream {
            user_id: user_id.to_string(),
            user_login: login.to_string(),
            broadcast: Broadcast::new(stream_id),
        });
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StreamsBatchApi for FakeStreams {
    async fn live_streams(
        &self,
        broadcasters: &[BroadcasterRef],
        _cancel: &CancellationToken,
    ) -> Result<Vec<LiveStream>, PlatformError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(PlatformError::Status {
                status: 503,
                body: "unavailable".into(),
            });
        }
        Ok(self
            .streams
            .iter()
            .filter(|s| broadcasters.iter().any(|b| b.matches(s)))
            .cloned()
            .collect())
    }
}

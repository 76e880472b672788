//! Request spacing for quota-limited platform APIs.
//!
//! A single [`RateLimiter`] admits at most one caller per `interval`. It is
//! shared through `Arc` by every client that draws from the same upstream
//! quota, so spacing holds across concurrent tasks.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::error::PlatformError;

/// Capacity-1 admission gate spacing callers at least `interval` apart.
#[derive(Debug)]
pub struct RateLimiter {
    interval: Duration,
    /// Time of the most recent admission.
    last_admitted: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_admitted: Mutex::new(None),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Wait for the next slot.
    ///
    /// Returns the duration waited, or [`PlatformError::Cancelled`] if `cancel`
    /// fires first.
    ///
    /// # Cancel Safety
    ///
    /// The mutex is only held while checking and recording an admission, never
    /// across a sleep. A waiter that is cancelled or dropped leaves no
    /// reservation behind.
    pub async fn wait(&self, cancel: &CancellationToken) -> Result<Duration, PlatformError> {
        self.wait_inner(cancel, None).await
    }

    /// Like [`wait`](Self::wait), but gives up with [`PlatformError::Timeout`]
    /// once `deadline` passes. A timed-out wait never consumes a slot.
    pub async fn wait_until(
        &self,
        cancel: &CancellationToken,
        deadline: Instant,
    ) -> Result<Duration, PlatformError> {
        self.wait_inner(cancel, Some(deadline)).await
    }

    async fn wait_inner(
        &self,
        cancel: &CancellationToken,
        deadline: Option<Instant>,
    ) -> Result<Duration, PlatformError> {
        let mut total_wait = Duration::ZERO;

        loop {
            if cancel.is_cancelled() {
                return Err(PlatformError::Cancelled);
            }

            // Phase 1: try to take the slot under the lock
            let wait_duration = {
                let mut last = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(PlatformError::Cancelled),
                    guard = self.last_admitted.lock() => guard,
                };

                let now = Instant::now();
                match *last {
                    Some(prev) if now < prev + self.interval => prev + self.interval - now,
                    _ => {
                        *last = Some(now);
                        return Ok(total_wait);
                    }
                }
            };

            if let Some(deadline) = deadline
                && Instant::now() + wait_duration > deadline
            {
                let remaining = deadline.saturating_duration_since(Instant::now());
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(PlatformError::Cancelled),
                    _ = tokio::time::sleep(remaining) => return Err(PlatformError::Timeout),
                }
            }

            // Phase 2: sleep without the lock, then retry
            trace!(wait = ?wait_duration, "rate limited");
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(PlatformError::Cancelled),
                _ = tokio::time::sleep(wait_duration) => {}
            }
            total_wait += wait_duration;
        }
    }
}

/// An HTTP client whose every request first passes the shared [`RateLimiter`].
#[derive(Debug, Clone)]
pub struct RateLimitedClient {
    inner: reqwest::Client,
    limiter: Arc<RateLimiter>,
}

impl RateLimitedClient {
    pub fn new(inner: reqwest::Client, limiter: Arc<RateLimiter>) -> Self {
        Self { inner, limiter }
    }

    pub fn get(&self, url: impl reqwest::IntoUrl) -> reqwest::RequestBuilder {
        self.inner.get(url)
    }

    /// Wait for a slot, then send. Cancellation during the wait performs no
    /// request; cancellation during the request drops it.
    pub async fn send(
        &self,
        request: reqwest::RequestBuilder,
        cancel: &CancellationToken,
    ) -> Result<reqwest::Response, PlatformError> {
        let waited = self.limiter.wait(cancel).await?;
        if !waited.is_zero() {
            debug!("Rate limited for {:?}", waited);
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(PlatformError::Cancelled),
            result = request.send() => result.map_err(PlatformError::from_reqwest),
        }
    }
}

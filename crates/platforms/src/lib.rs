//! Live-status clients for the platforms tracked by streamdir.
//!
//! - [`youtube`]: per-channel "live now?" queries against the quota-limited
//!   Data API, plus channel-id inference from free-form URLs.
//! - [`twitch`]: batched Helix stream lookups with an app access token.
//! - [`rate_limit`]: the shared request gate and the HTTP client decorated with it.

pub mod api;
pub mod error;
pub mod http;
pub mod rate_limit;
pub mod twitch;
pub mod youtube;

pub use api::{Broadcast, LiveQueryApi, StreamsBatchApi};
pub use error::PlatformError;
pub use rate_limit::{RateLimitedClient, RateLimiter};

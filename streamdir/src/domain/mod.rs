//! Roster domain model.
//!
//! A [`Streamer`] carries one optional attachment slot per [`Platform`] and a
//! [`LiveStatus`] snapshot. Only the status reconciler and the hub
//! notification path mutate live status; only the subscription manager
//! mutates lease metadata.

mod lease;
mod live_status;
mod platform;
mod streamer;

pub use lease::{Lease, LeaseState, lease_state};
pub use live_status::{LiveStatus, PlatformStatus};
pub use platform::{ChannelKey, Platform};
pub use streamer::{
    PageAttachment, PlatformAttachments, Streamer, TwitchAttachment, YouTubeAttachment,
};

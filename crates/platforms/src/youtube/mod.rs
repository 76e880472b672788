//! YouTube Data API client and channel identification helpers.

mod channel;
mod client;
mod models;

pub use channel::{channel_id_from_topic, handle_from_url, infer_channel_id, topic_url};
pub use client::YouTubeClient;

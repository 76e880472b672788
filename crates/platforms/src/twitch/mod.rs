//! Twitch Helix client for batched live-stream lookups.

mod client;
mod models;

pub use client::{TwitchClient, TwitchCredentials};

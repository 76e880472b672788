//! WebSub (PubSubHubbub) subscriptions for YouTube channel feeds.

pub mod feed;
pub mod hub;
mod manager;
pub mod signature;

pub use hub::HubClient;
pub use manager::{
    NotificationOutcome, RenewalFailure, RenewalSummary, SubscribeOutcome, SubscriptionManager,
    Verification, VerificationRequest, WebSubConfig,
};

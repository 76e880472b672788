//! Live-status reconciliation.
//!
//! A pass reads the roster once, queries YouTube per channel through the
//! shared rate limiter and Twitch in one batch, and writes only the
//! attachments whose status changed.

mod reconciler;
mod status;
mod summary;

pub use reconciler::StatusReconciler;
pub use status::{StatusChange, apply_observation, decide};
pub use summary::{CheckFailure, CheckSummary};

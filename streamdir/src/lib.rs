//! streamdir library crate.
//!
//! Keeps a public roster of streamers in sync with the platforms they
//! broadcast on: a polling reconciliation pass over every attachment and
//! WebSub push notifications for YouTube channels.

pub mod api;
pub mod config;
pub mod domain;
pub mod error;
pub mod logging;
pub mod monitor;
pub mod roster;
pub mod scheduler;
pub mod utils;
pub mod websub;

#[cfg(test)]
mod test_support;

pub use error::{Error, Result};

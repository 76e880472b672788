//! Roster store.
//!
//! The roster is a single flat collection of [`Streamer`](crate::domain::Streamer)
//! records. Every mutation is a read-full → mutate-one → write-full cycle inside
//! one critical section.

mod json;
mod repository;

pub use json::JsonRosterRepository;
pub use repository::RosterRepository;

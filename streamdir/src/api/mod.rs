//! REST API server module.
//!
//! Serves the public roster, the admin reconciliation and subscription
//! endpoints, and the WebSub hub callbacks.

pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod server;

pub use error::ApiError;
pub use server::{ApiServer, ApiServerConfig, AppState};

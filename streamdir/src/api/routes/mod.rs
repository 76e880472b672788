//! API route modules.

pub mod health;
pub mod status;
pub mod streamers;
pub mod subscriptions;
pub mod websub;

use axum::Router;
use axum::middleware::from_fn_with_state;

use crate::api::middleware::require_admin;
use crate::api::server::AppState;

/// Create the main router with all routes.
pub fn create_router(state: AppState) -> Router {
    let admin = Router::new()
        .nest("/api/status", status::router())
        .nest("/api/subscriptions", subscriptions::router())
        .route_layer(from_fn_with_state(state.clone(), require_admin));

    Router::new()
        .merge(admin)
        .nest("/api/streamers", streamers::router())
        .nest("/websub", websub::router())
        .nest("/health", health::router())
        .with_state(state)
}

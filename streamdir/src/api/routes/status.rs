//! Admin-triggered reconciliation pass.

use axum::{Json, Router, extract::State, routing::post};

use crate::api::error::ApiResult;
use crate::api::server::AppState;
use crate::monitor::CheckSummary;

pub fn router() -> Router<AppState> {
    Router::new().route("/check", post(check_all))
}

/// Run a full pass and return its summary. Per-channel failures are part of
/// the summary; only a pass-level failure (e.g. an unreadable roster) is an
/// error response.
async fn check_all(State(state): State<AppState>) -> ApiResult<Json<CheckSummary>> {
    let summary = state.reconciler.check_all(&state.shutdown).await?;
    Ok(Json(summary))
}

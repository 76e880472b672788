//! Public roster listing.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::get,
};
use serde::Deserialize;

use crate::api::error::ApiResult;
use crate::api::models::StreamerResponse;
use crate::api::server::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_streamers))
        .route("/{id}", get(get_streamer))
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    /// Only streamers currently live somewhere.
    #[serde(default)]
    pub live: bool,
}

async fn list_streamers(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<StreamerResponse>>> {
    let streamers = state
        .roster
        .list()
        .await?
        .into_iter()
        .filter(|s| !query.live || s.live_status.is_live())
        .map(StreamerResponse::from)
        .collect();
    Ok(Json(streamers))
}

async fn get_streamer(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<StreamerResponse>> {
    Ok(Json(state.roster.get(&id).await?.into()))
}

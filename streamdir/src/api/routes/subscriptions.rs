//! Subscription management routes.

use axum::{Json, Router, extract::State, routing::post};
use chrono::Utc;
use serde::Deserialize;

use crate::api::error::ApiResult;
use crate::api::server::AppState;
use crate::websub::{RenewalSummary, SubscribeOutcome};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(establish))
        .route("/renew", post(renew_due))
}

/// Approval hook payload.
#[derive(Debug, Deserialize)]
pub struct EstablishRequest {
    pub streamer_id: String,
    /// Channel id or channel URL.
    pub channel: String,
}

/// Attach and subscribe a channel. A hub failure comes back as a `deferred`
/// outcome with 200, not as an error.
async fn establish(
    State(state): State<AppState>,
    Json(request): Json<EstablishRequest>,
) -> ApiResult<Json<SubscribeOutcome>> {
    let outcome = state
        .subscriptions
        .establish(&request.streamer_id, &request.channel, &state.shutdown)
        .await?;
    Ok(Json(outcome))
}

async fn renew_due(State(state): State<AppState>) -> ApiResult<Json<RenewalSummary>> {
    let summary = state
        .subscriptions
        .renew_due(Utc::now(), &state.shutdown)
        .await?;
    Ok(Json(summary))
}

#[cfg(test)]
mod tests {
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use serde_json::json;
    use tower::ServiceExt;

    use crate::api::routes::create_router;
    use crate::api::routes::test_util::test_app;
    use crate::domain::Streamer;
    use crate::roster::RosterRepository;
    use crate::test_support::FakeLiveQuery;

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_establish_with_unreachable_hub_is_deferred() {
        let streamer = Streamer::new("sample");
        let app = test_app(vec![streamer.clone()], FakeLiveQuery::default()).await;
        let router = create_router(app.state.clone());

        let response = router
            .oneshot(post_json(
                "/api/subscriptions",
                json!({
                    "streamer_id": streamer.id,
                    "channel": "https://www.youtube.com/channel/UCabcdefghijklmnopqrstuv"
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let outcome: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(outcome["status"], "deferred");
        assert_eq!(outcome["channel_id"], "UCabcdefghijklmnopqrstuv");

        let stored = app.roster.get(&streamer.id).await.unwrap();
        assert!(stored.platforms.youtube.is_some());
    }

    #[tokio::test]
    async fn test_establish_errors() {
        let app = test_app(vec![Streamer::new("sample")], FakeLiveQuery::default()).await;
        let router = create_router(app.state.clone());

        let unknown = router
            .clone()
            .oneshot(post_json(
                "/api/subscriptions",
                json!({ "streamer_id": "missing", "channel": "UCabcdefghijklmnopqrstuv" }),
            ))
            .await
            .unwrap();
        assert_eq!(unknown.status(), StatusCode::NOT_FOUND);

        let bad_channel = router
            .oneshot(post_json(
                "/api/subscriptions",
                json!({ "streamer_id": "missing", "channel": "not a channel" }),
            ))
            .await
            .unwrap();
        assert_eq!(bad_channel.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_renew_with_nothing_subscribed() {
        let app = test_app(vec![Streamer::new("sample")], FakeLiveQuery::default()).await;
        let router = create_router(app.state.clone());

        let response = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/subscriptions/renew")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let summary: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(summary["inspected"], 0);
    }
}

//! Hub callback routes: verification (GET) and notifications (POST).

use axum::{
    Router,
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
};

use crate::api::error::{ApiError, ApiResult};
use crate::api::server::AppState;
use crate::websub::signature::SIGNATURE_HEADER;
use crate::websub::{Verification, VerificationRequest};

pub fn router() -> Router<AppState> {
    Router::new().route(
        "/youtube/{channel_id}",
        get(verify_subscription).post(receive_notification),
    )
}

/// Echo the challenge for an expected verification; 404 otherwise, which
/// tells the hub the intent is not confirmed.
async fn verify_subscription(
    State(state): State<AppState>,
    Path(channel_id): Path<String>,
    Query(request): Query<VerificationRequest>,
) -> ApiResult<Response> {
    let verification = state
        .subscriptions
        .verify_callback(&channel_id, &request)
        .await?;

    Ok(match verification {
        Verification::Accepted { challenge } => (StatusCode::OK, challenge).into_response(),
        Verification::Denied => StatusCode::OK.into_response(),
        Verification::Rejected { reason } => {
            ApiError::not_found(format!("verification rejected: {reason}")).into_response()
        }
    })
}

async fn receive_notification(
    State(state): State<AppState>,
    Path(channel_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<StatusCode> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());

    state
        .subscriptions
        .handle_notification(&channel_id, &body, signature, &state.shutdown)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use chrono::Utc;
    use platforms_api::Broadcast;
    use platforms_api::youtube::topic_url;
    use tower::ServiceExt;

    use super::*;
    use crate::api::routes::create_router;
    use crate::api::routes::test_util::test_app;
    use crate::domain::{ChannelKey, Lease, Streamer, YouTubeAttachment};
    use crate::roster::RosterRepository;
    use crate::test_support::FakeLiveQuery;
    use crate::websub::signature::{SignatureAlgorithm, sign};

    const CH: &str = "UCabcdefghijklmnopqrstuv";

    fn streamer() -> Streamer {
        Streamer::new("sample").with_youtube(YouTubeAttachment::with_channel_id(CH))
    }

    fn verify_uri(mode: &str, topic: &str) -> String {
        let query = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("hub.mode", mode)
            .append_pair("hub.topic", topic)
            .append_pair("hub.challenge", "challenge-123")
            .append_pair("hub.lease_seconds", "432000")
            .finish();
        format!("/websub/youtube/{CH}?{query}")
    }

    #[tokio::test]
    async fn test_verification_echoes_challenge() {
        let app = test_app(vec![streamer()], FakeLiveQuery::default()).await;
        let router = create_router(app.state.clone());

        let response = router
            .oneshot(
                Request::builder()
                    .uri(verify_uri("subscribe", &topic_url(CH)))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"challenge-123");
    }

    #[tokio::test]
    async fn test_verification_rejections_are_404() {
        let app = test_app(vec![streamer()], FakeLiveQuery::default()).await;
        let router = create_router(app.state.clone());

        for uri in [
            verify_uri("subscribe", "https://other.example/feed"),
            verify_uri("bogus", &topic_url(CH)),
            "/websub/youtube/UCzzzzzzzzzzzzzzzzzzzzzz?hub.mode=subscribe&hub.topic=x&hub.challenge=c"
                .to_string(),
        ] {
            let response = router
                .clone()
                .oneshot(Request::builder().uri(&uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::NOT_FOUND, "{uri}");
        }
    }

    #[tokio::test]
    async fn test_notification_signature_enforced() {
        let youtube = FakeLiveQuery::default()
            .with_live_video(Broadcast::new("live123").with_started_at(Utc::now()));
        let app = test_app(vec![streamer()], youtube).await;
        let lease = Lease::new("hub", topic_url(CH), "cb", "secret", 1000, Utc::now());
        app.roster
            .update_subscription(&ChannelKey::youtube(CH), lease)
            .await
            .unwrap();
        let router = create_router(app.state.clone());

        let body = format!(
            r#"<feed><entry><yt:videoId>live123</yt:videoId><yt:channelId>{CH}</yt:channelId></entry></feed>"#
        );
        let post = |signature: String| {
            Request::builder()
                .method("POST")
                .uri(format!("/websub/youtube/{CH}"))
                .header("content-type", "application/atom+xml")
                .header("X-Hub-Signature", signature)
                .body(Body::from(body.clone()))
                .unwrap()
        };

        let forged = sign(SignatureAlgorithm::Sha1, b"wrong", body.as_bytes()).unwrap();
        let response = router.clone().oneshot(post(forged)).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let stored = app.roster.find_by_channel(&ChannelKey::youtube(CH)).await.unwrap();
        assert!(!stored.live_status.is_live());

        let valid = sign(SignatureAlgorithm::Sha1, b"secret", body.as_bytes()).unwrap();
        let response = router.oneshot(post(valid)).await.unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        let stored = app.roster.find_by_channel(&ChannelKey::youtube(CH)).await.unwrap();
        assert!(stored.live_status.is_live());
    }
}

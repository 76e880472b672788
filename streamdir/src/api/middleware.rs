//! Bearer-token guard for admin routes.

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::api::error::ApiError;
use crate::api::server::AppState;

/// Reject the request unless it carries `Authorization: Bearer <ADMIN_TOKEN>`.
/// Passes everything through when no admin token is configured.
pub async fn require_admin(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(expected) = state.admin_token.as_deref() else {
        return Ok(next.run(request).await);
    };

    let provided = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    match provided {
        Some(token) if token_matches(token, expected) => Ok(next.run(request).await),
        Some(_) => {
            tracing::warn!("Invalid admin token provided");
            Err(ApiError::unauthorized("Invalid admin token"))
        }
        None => Err(ApiError::unauthorized("Missing admin token")),
    }
}

/// Compare tokens in constant time: both are keyed into an HMAC over the same
/// message and the tags are checked with `verify_slice`.
fn token_matches(provided: &str, expected: &str) -> bool {
    const MESSAGE: &[u8] = b"streamdir-admin";
    let (Ok(mut expected_mac), Ok(mut provided_mac)) = (
        Hmac::<Sha256>::new_from_slice(expected.as_bytes()),
        Hmac::<Sha256>::new_from_slice(provided.as_bytes()),
    ) else {
        return false;
    };
    expected_mac.update(MESSAGE);
    provided_mac.update(MESSAGE);
    provided_mac
        .verify_slice(&expected_mac.finalize().into_bytes())
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_matches() {
        assert!(token_matches("s3cret", "s3cret"));
        assert!(!token_matches("s3cres", "s3cret"));
        assert!(!token_matches("s3cret-longer", "s3cret"));
        assert!(!token_matches("", "s3cret"));
    }
}

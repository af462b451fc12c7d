// ── Bearer token middleware ──

use axum::extract::{Request, State};
use axum::http::{HeaderMap, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use secrecy::{ExposeSecret, SecretString};
use tracing::warn;

use super::AppState;
use super::handlers::ApiError;

/// Reject requests without `Authorization: Bearer <token>` matching the
/// configured inbound token.
pub async fn require_bearer(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if let Err(reason) = check_bearer(request.headers(), &state.token) {
        warn!(
            method = %request.method(),
            path = %request.uri().path(),
            reason,
            "rejected unauthenticated request"
        );
        return ApiError::unauthorized(reason).into_response();
    }
    next.run(request).await
}

fn check_bearer(headers: &HeaderMap, expected: &SecretString) -> Result<(), &'static str> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or("Missing Authorization header")?;
    let token = value
        .to_str()
        .ok()
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or("Invalid Authorization header format")?;
    if constant_time_eq(token.as_bytes(), expected.expose_secret().as_bytes()) {
        Ok(())
    } else {
        Err("Invalid token")
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: Option<&str>) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some(v) = value {
            headers.insert(header::AUTHORIZATION, HeaderValue::from_str(v).unwrap());
        }
        headers
    }

    #[test]
    fn bearer_check_messages() {
        let expected = SecretString::from("s3cret");

        assert_eq!(check_bearer(&headers(None), &expected), Err("Missing Authorization header"));
        assert_eq!(
            check_bearer(&headers(Some("Basic s3cret")), &expected),
            Err("Invalid Authorization header format")
        );
        assert_eq!(
            check_bearer(&headers(Some("bearer s3cret")), &expected),
            Err("Invalid Authorization header format")
        );
        assert_eq!(check_bearer(&headers(Some("Bearer nope")), &expected), Err("Invalid token"));
        assert_eq!(check_bearer(&headers(Some("Bearer s3cret2")), &expected), Err("Invalid token"));
        assert_eq!(check_bearer(&headers(Some("Bearer s3cret")), &expected), Ok(()));
    }
}

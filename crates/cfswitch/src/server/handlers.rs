// ── HTTP handlers and error responses ──

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use cfswitch_core::{CoreError, Rule};

use super::AppState;

// ── Request / response bodies ───────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ToggleRequest {
    pub enabled: bool,
}

#[derive(Debug, Deserialize)]
pub struct UpdateHostsRequest {
    pub hostnames: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ReadyResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    pub consecutive_failures: u32,
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    message: &'a str,
}

// ── ApiError ────────────────────────────────────────────────────────

/// Error response rendered as `{"error": <status text>, "message": ...}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.status.canonical_reason().unwrap_or("Error"),
            message: &self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        let status = match &err {
            CoreError::Validation { .. } => StatusCode::BAD_REQUEST,
            CoreError::NotInitialized | CoreError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
            e if e.is_rate_limited() => StatusCode::TOO_MANY_REQUESTS,
            CoreError::Remote { .. } => StatusCode::BAD_GATEWAY,
            CoreError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            CoreError::Credentials { .. } | CoreError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            warn!(error = %err, status = status.as_u16(), "request failed");
        }
        Self::new(status, err.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        warn!(error = %rejection.body_text(), "rejected request body");
        Self::bad_request("Invalid request body")
    }
}

// ── Handlers ────────────────────────────────────────────────────────

#[allow(clippy::unused_async)]
pub async fn healthz() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

/// 503 until the first reconciliation pass has succeeded.
#[allow(clippy::unused_async)]
pub async fn readyz(State(state): State<AppState>) -> (StatusCode, Json<ReadyResponse>) {
    let status = state.service.status();
    if status.is_ready() {
        (
            StatusCode::OK,
            Json(ReadyResponse {
                status: "ready",
                last_error: status.last_error,
                consecutive_failures: status.consecutive_failures,
            }),
        )
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ReadyResponse {
                status: "not ready",
                last_error: status.last_error,
                consecutive_failures: status.consecutive_failures,
            }),
        )
    }
}

pub async fn get_rule(State(state): State<AppState>) -> Result<Json<Rule>, ApiError> {
    let rule = state.service.current_rule().await?;
    Ok(Json(rule))
}

pub async fn enable_rule(
    State(state): State<AppState>,
    payload: Result<Json<ToggleRequest>, JsonRejection>,
) -> Result<Json<Rule>, ApiError> {
    let Json(req) = payload?;
    let rule = state.service.toggle_rule(req.enabled).await?;
    info!(enabled = rule.enabled, rule_id = %rule.id, "rule toggled");
    Ok(Json(rule))
}

pub async fn update_hosts(
    State(state): State<AppState>,
    payload: Result<Json<UpdateHostsRequest>, JsonRejection>,
) -> Result<Json<Rule>, ApiError> {
    let Json(req) = payload?;
    if req.hostnames.is_empty() {
        return Err(ApiError::bad_request("Hostnames list cannot be empty"));
    }
    let rule = state.service.update_hosts(req.hostnames).await?;
    info!(hostnames = ?rule.hostnames, rule_id = %rule.id, "rule hosts updated");
    Ok(Json(rule))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cfswitch_api::Error as ApiClientError;

    #[test]
    fn core_errors_map_to_status_codes() {
        let cases = [
            (
                CoreError::Validation {
                    message: "empty".into(),
                },
                StatusCode::BAD_REQUEST,
            ),
            (CoreError::NotInitialized, StatusCode::SERVICE_UNAVAILABLE),
            (
                CoreError::Remote {
                    operation: "update_rule",
                    source: ApiClientError::RateLimited {
                        retry_after_secs: Some(30),
                        attempts: 3,
                    },
                },
                StatusCode::TOO_MANY_REQUESTS,
            ),
            (
                CoreError::Remote {
                    operation: "add rule",
                    source: ApiClientError::MissingResult { what: "rule" },
                },
                StatusCode::BAD_GATEWAY,
            ),
            (
                CoreError::Timeout {
                    operation: "reconcile",
                    timeout_secs: 60,
                },
                StatusCode::GATEWAY_TIMEOUT,
            ),
            (
                CoreError::Internal("boom".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(ApiError::from(err).status, expected);
        }
    }
}

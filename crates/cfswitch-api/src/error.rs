use thiserror::Error;

use crate::rulesets::types::ApiErrorDetail;

/// Top-level error type for the `cfswitch-api` crate.
///
/// Covers every failure mode of the rulesets client: transport, the
/// `{success, errors, result}` envelope, rate limiting, and decoding.
/// `cfswitch-core` wraps these with operation context.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, timeout, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The API token cannot be used as a header value.
    #[error("Invalid API token: {message}")]
    InvalidToken { message: String },

    // ── Rate limiting ───────────────────────────────────────────────
    /// Rate limited and the wait hint was missing, above the ceiling,
    /// or every attempt was already spent.
    #[error("Rate limited after {attempts} attempt(s){}", retry_hint(.retry_after_secs.as_ref()))]
    RateLimited {
        retry_after_secs: Option<u64>,
        attempts: u32,
    },

    // ── API ─────────────────────────────────────────────────────────
    /// `success=false` envelope, or a non-2xx response without one.
    #[error("Cloudflare API error (HTTP {status}): {}", describe(.errors, .message.as_deref()))]
    Api {
        status: u16,
        errors: Vec<ApiErrorDetail>,
        message: Option<String>,
    },

    /// A successful envelope arrived without the expected `result`.
    #[error("Response for {what} carried no result")]
    MissingResult { what: &'static str },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if this error means the remote side asked us to back off.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    /// The remote `{code, message}` list, if the failure came from an envelope.
    pub fn api_errors(&self) -> &[ApiErrorDetail] {
        match self {
            Self::Api { errors, .. } => errors,
            _ => &[],
        }
    }

    /// HTTP status of the failed response, if one was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::RateLimited { .. } => Some(429),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

fn retry_hint(retry_after_secs: Option<&u64>) -> String {
    match retry_after_secs {
        Some(secs) => format!(" (server asked for {secs}s)"),
        None => String::new(),
    }
}

fn describe(errors: &[ApiErrorDetail], message: Option<&str>) -> String {
    if errors.is_empty() {
        return message.unwrap_or("no error details").to_owned();
    }
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

// ── Core error types ──
//
// Errors surfaced by the reconciler. Remote failures keep the original
// `cfswitch_api::Error` as their source, tagged with the operation that
// produced them, so callers can still tell "rate limited" from "rejected".

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Local state ──────────────────────────────────────────────────
    /// No successful reconciliation has populated the cache yet.
    #[error("Rule not initialized: no successful reconciliation yet")]
    NotInitialized,

    #[error("Validation failed: {message}")]
    Validation { message: String },

    // ── Remote ───────────────────────────────────────────────────────
    #[error("{operation} failed: {source}")]
    Remote {
        operation: &'static str,
        source: cfswitch_api::Error,
    },

    #[error("{operation} timed out after {timeout_secs}s")]
    Timeout {
        operation: &'static str,
        timeout_secs: u64,
    },

    #[error("Reconciler is shutting down")]
    Cancelled,

    // ── Collaborators ────────────────────────────────────────────────
    #[error("Credential provider error: {message}")]
    Credentials { message: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Wrap a remote error with the name of the failed operation.
    pub fn remote(operation: &'static str) -> impl FnOnce(cfswitch_api::Error) -> Self {
        move |source| Self::Remote { operation, source }
    }

    /// Returns `true` if the remote side gave up on us with a rate limit.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::Remote { source, .. } if source.is_rate_limited())
    }

    /// The underlying remote error, if any.
    pub fn remote_source(&self) -> Option<&cfswitch_api::Error> {
        match self {
            Self::Remote { source, .. } => Some(source),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_survives_wrapping() {
        let err = CoreError::remote("update rule")(cfswitch_api::Error::RateLimited {
            retry_after_secs: Some(120),
            attempts: 1,
        });
        assert!(err.is_rate_limited());
        assert!(err.to_string().starts_with("update rule failed: Rate limited"));
    }

    #[test]
    fn api_rejection_is_not_rate_limit() {
        let err = CoreError::remote("add rule")(cfswitch_api::Error::Api {
            status: 400,
            errors: vec![cfswitch_api::ApiErrorDetail {
                code: 20021,
                message: "bad expression".into(),
            }],
            message: None,
        });
        assert!(!err.is_rate_limited());
        assert_eq!(err.remote_source().and_then(cfswitch_api::Error::status), Some(400));
        assert!(!CoreError::NotInitialized.is_rate_limited());
    }
}

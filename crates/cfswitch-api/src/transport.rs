// Shared transport configuration for the rulesets client.
//
// Holds the request timeout, the bearer token header, and the retry policy
// applied to rate-limited or unreachable requests.

use std::time::Duration;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use secrecy::{ExposeSecret, SecretString};

use crate::error::Error;

/// Default Cloudflare v4 API root.
pub const DEFAULT_BASE_URL: &str = "https://api.cloudflare.com/client/v4";

/// Bounds on how long a single logical request may keep retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per request, including the first.
    pub max_attempts: u32,
    /// Longest `Retry-After` hint we are willing to sleep for.
    pub max_rate_limit_wait: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            max_rate_limit_wait: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// Linear backoff after a transport failure: `attempt` seconds.
    pub fn transport_backoff(attempt: u32) -> Duration {
        Duration::from_secs(u64::from(attempt))
    }

    /// How long to sleep before retrying a rate-limited `attempt`, or `None`
    /// to give up: no hint, a hint above the ceiling, or no attempts left.
    pub fn rate_limit_wait(&self, hint: Option<Duration>, attempt: u32) -> Option<Duration> {
        hint.filter(|wait| *wait <= self.max_rate_limit_wait && attempt < self.max_attempts)
    }
}

/// Shared transport configuration for building HTTP clients.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
        }
    }
}

impl TransportConfig {
    /// Longest one logical request can take: every attempt hitting the
    /// request timeout, with the longest permitted wait between attempts.
    pub fn request_budget(&self) -> Duration {
        let attempts = self.retry.max_attempts.max(1);
        let gap = self
            .retry
            .max_rate_limit_wait
            .max(RetryPolicy::transport_backoff(attempts - 1));
        self.timeout
            .saturating_mul(attempts)
            .saturating_add(gap.saturating_mul(attempts - 1))
    }

    /// Build a `reqwest::Client` that sends `Authorization: Bearer <token>`
    /// and a JSON content type on every request.
    pub fn build_client(&self, api_token: &SecretString) -> Result<reqwest::Client, Error> {
        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", api_token.expose_secret()))
            .map_err(|e| Error::InvalidToken {
                message: format!("invalid API token header value: {e}"),
            })?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        self.build_client_with_headers(headers)
    }

    /// Build a `reqwest::Client` with caller-supplied default headers.
    pub fn build_client_with_headers(&self, headers: HeaderMap) -> Result<reqwest::Client, Error> {
        reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(concat!("cf-switch/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .build()
            .map_err(Error::Transport)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn transport_backoff_is_linear() {
        assert_eq!(RetryPolicy::transport_backoff(1), Duration::from_secs(1));
        assert_eq!(RetryPolicy::transport_backoff(2), Duration::from_secs(2));
    }

    #[test]
    fn rate_limit_hint_under_ceiling_is_honored() {
        let policy = RetryPolicy::default();
        assert_eq!(
            policy.rate_limit_wait(Some(Duration::from_secs(30)), 1),
            Some(Duration::from_secs(30))
        );
        assert_eq!(
            policy.rate_limit_wait(Some(Duration::from_secs(60)), 2),
            Some(Duration::from_secs(60))
        );
    }

    #[test]
    fn rate_limit_gives_up_without_usable_hint() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.rate_limit_wait(Some(Duration::from_secs(120)), 1), None);
        assert_eq!(policy.rate_limit_wait(None, 1), None);
        // Last attempt: never sleep just to fail afterwards.
        assert_eq!(policy.rate_limit_wait(Some(Duration::from_secs(1)), 3), None);
    }

    #[test]
    fn request_budget_covers_every_retry() {
        let cfg = TransportConfig::default();
        // 3 attempts of 30s plus two 60s rate-limit waits.
        assert_eq!(cfg.request_budget(), Duration::from_secs(210));

        let single = TransportConfig {
            timeout: Duration::from_secs(5),
            retry: RetryPolicy {
                max_attempts: 1,
                max_rate_limit_wait: Duration::from_secs(60),
            },
        };
        assert_eq!(single.request_budget(), Duration::from_secs(5));
    }

    #[test]
    fn token_with_newline_is_rejected() {
        let cfg = TransportConfig::default();
        let err = cfg
            .build_client(&SecretString::from("bad\ntoken".to_owned()))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidToken { .. }));
    }
}

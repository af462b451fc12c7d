// Hand-crafted async HTTP client for the Cloudflare rulesets API.
//
// Base path: /client/v4/
// Auth: Authorization: Bearer <token>

use std::time::{Duration, Instant};

use reqwest::header::HeaderMap;
use reqwest::{Method, StatusCode};
use secrecy::SecretString;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use url::Url;
use uuid::Uuid;

use super::types::{CreateRuleset, Envelope, NewRule, RemoteRule, RulePatch, Ruleset};
use crate::error::Error;
use crate::transport::{RetryPolicy, TransportConfig};

const REQUEST_ID_HEADER: &str = "X-Request-ID";

/// Which rule to pull out of a mutation response that returned the
/// whole parent ruleset.
enum RuleSelector<'a> {
    Id(&'a str),
    Description(&'a str),
}

// ── Client ───────────────────────────────────────────────────────────

/// Async client for the rulesets endpoints of the Cloudflare v4 API.
///
/// Stateless apart from the HTTP connection pool: every call is an
/// independent request with its own correlation id. Rate-limit and
/// transport failures are retried according to the [`RetryPolicy`];
/// nothing else is.
pub struct RulesetClient {
    http: reqwest::Client,
    base_url: Url,
    retry: RetryPolicy,
}

impl RulesetClient {
    // ── Constructors ─────────────────────────────────────────────────

    /// Build from an API token and transport config.
    ///
    /// Injects `Authorization: Bearer <token>` as a default header.
    pub fn new(
        base_url: &str,
        api_token: &SecretString,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let http = transport.build_client(api_token)?;
        Self::from_reqwest(base_url, http, transport.retry)
    }

    /// Wrap an existing `reqwest::Client` (caller manages auth headers).
    pub fn from_reqwest(
        base_url: &str,
        http: reqwest::Client,
        retry: RetryPolicy,
    ) -> Result<Self, Error> {
        let base_url = Self::normalize_base_url(base_url)?;
        Ok(Self {
            http,
            base_url,
            retry,
        })
    }

    /// Ensure the base URL ends with `/` so relative joins keep its path.
    fn normalize_base_url(raw: &str) -> Result<Url, Error> {
        let mut url = Url::parse(raw)?;
        let path = url.path().trim_end_matches('/').to_owned();
        url.set_path(&format!("{path}/"));
        Ok(url)
    }

    fn url(&self, path: &str) -> Result<Url, Error> {
        Ok(self.base_url.join(path)?)
    }

    // ━━ Public API ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Fetch the zone entrypoint ruleset for `phase`.
    ///
    /// Returns `Ok(None)` when the zone has no entrypoint for this phase yet.
    pub async fn get_entrypoint(&self, zone_id: &str, phase: &str) -> Result<Option<Ruleset>, Error> {
        let url = self.url(&format!("zones/{zone_id}/rulesets/phases/{phase}/entrypoint"))?;
        let (status, body) = self.send::<()>(Method::GET, url, None).await?;

        if status == StatusCode::NOT_FOUND {
            debug!(zone_id, phase, "entrypoint ruleset not found");
            return Ok(None);
        }

        decode(status, &body, "entrypoint ruleset").map(Some)
    }

    /// Create an empty zone entrypoint ruleset for `phase`.
    pub async fn create_entrypoint(&self, zone_id: &str, phase: &str) -> Result<Ruleset, Error> {
        let url = self.url(&format!("zones/{zone_id}/rulesets"))?;
        let payload = CreateRuleset::zone_entrypoint(phase);
        let (status, body) = self.send(Method::POST, url, Some(&payload)).await?;
        decode(status, &body, "created ruleset")
    }

    /// Append a rule to a ruleset and return the stored rule.
    pub async fn add_rule(
        &self,
        zone_id: &str,
        ruleset_id: &str,
        rule: &NewRule,
    ) -> Result<RemoteRule, Error> {
        let url = self.url(&format!("zones/{zone_id}/rulesets/{ruleset_id}/rules"))?;
        let (status, body) = self.send(Method::POST, url, Some(rule)).await?;
        let result: serde_json::Value = decode(status, &body, "added rule")?;
        extract_rule(result, &RuleSelector::Description(&rule.description), &body)
    }

    /// Patch the fields set in `patch` on an existing rule.
    pub async fn update_rule(
        &self,
        zone_id: &str,
        ruleset_id: &str,
        rule_id: &str,
        patch: &RulePatch,
    ) -> Result<RemoteRule, Error> {
        let url = self.url(&format!(
            "zones/{zone_id}/rulesets/{ruleset_id}/rules/{rule_id}"
        ))?;
        let (status, body) = self.send(Method::PATCH, url, Some(patch)).await?;
        let result: serde_json::Value = decode(status, &body, "updated rule")?;
        extract_rule(result, &RuleSelector::Id(rule_id), &body)
    }

    // ── Request loop ─────────────────────────────────────────────────

    /// Send one logical request, retrying rate limits and transport failures.
    ///
    /// Returns the final status and raw body. Sleeps are plain
    /// `tokio::time::sleep` calls, so dropping the future cancels them.
    async fn send<B: Serialize + ?Sized>(
        &self,
        method: Method,
        url: Url,
        body: Option<&B>,
    ) -> Result<(StatusCode, String), Error> {
        let request_id = format!("cf-{}", Uuid::new_v4());
        let started = Instant::now();
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;

            let mut req = self
                .http
                .request(method.clone(), url.clone())
                .header(REQUEST_ID_HEADER, &request_id);
            if let Some(body) = body {
                req = req.json(body);
            }

            let resp = match req.send().await {
                Ok(resp) => resp,
                Err(e) if attempt < self.retry.max_attempts => {
                    let backoff = RetryPolicy::transport_backoff(attempt);
                    warn!(
                        %method, %url, attempt, %request_id,
                        backoff_secs = backoff.as_secs(),
                        error = %e,
                        "request failed, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                    continue;
                }
                Err(e) => {
                    warn!(%method, %url, attempt, %request_id, error = %e, "request failed, giving up");
                    return Err(Error::Transport(e));
                }
            };

            let status = resp.status();

            if status == StatusCode::TOO_MANY_REQUESTS {
                let hint = retry_after(resp.headers());
                if let Some(wait) = self.retry.rate_limit_wait(hint, attempt) {
                    warn!(
                        %method, %url, attempt, %request_id,
                        retry_after = wait.as_secs(),
                        "rate limited, retrying"
                    );
                    tokio::time::sleep(wait).await;
                    continue;
                }
                warn!(
                    %method, %url, attempt, %request_id,
                    retry_after = ?hint.map(|d| d.as_secs()),
                    "rate limited, giving up"
                );
                return Err(Error::RateLimited {
                    retry_after_secs: hint.map(|d| d.as_secs()),
                    attempts: attempt,
                });
            }

            let text = resp.text().await?;

            debug!(
                %method, %url, %request_id,
                status = status.as_u16(),
                duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
                "Cloudflare API request completed"
            );

            return Ok((status, text));
        }
    }
}

// ── Response handling ────────────────────────────────────────────────

/// Parse an integer-seconds `Retry-After` header. HTTP-date values and
/// garbage count as "no hint".
fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// Unwrap the `{success, errors, result}` envelope into `T`.
///
/// `success=false` is an API error whatever the status; a non-2xx response
/// without a parseable envelope is an API error carrying the raw body.
fn decode<T: DeserializeOwned>(status: StatusCode, body: &str, what: &'static str) -> Result<T, Error> {
    let envelope: Envelope<serde_json::Value> = match serde_json::from_str(body) {
        Ok(envelope) => envelope,
        Err(e) if status.is_success() => {
            return Err(Error::Deserialization {
                message: format!("{e} (body preview: {:?})", preview(body)),
                body: body.to_owned(),
            });
        }
        Err(_) => {
            return Err(Error::Api {
                status: status.as_u16(),
                errors: Vec::new(),
                message: Some(if body.is_empty() {
                    status.to_string()
                } else {
                    preview(body).to_owned()
                }),
            });
        }
    };

    if !envelope.success || !status.is_success() {
        return Err(Error::Api {
            status: status.as_u16(),
            errors: envelope.errors,
            message: None,
        });
    }

    let result = envelope
        .result
        .filter(|v| !v.is_null())
        .ok_or(Error::MissingResult { what })?;

    serde_json::from_value(result).map_err(|e| Error::Deserialization {
        message: format!("{what}: {e}"),
        body: body.to_owned(),
    })
}

/// Rule mutation endpoints answer with either the rule or the whole
/// ruleset containing it. Accept both.
fn extract_rule(
    result: serde_json::Value,
    selector: &RuleSelector<'_>,
    body: &str,
) -> Result<RemoteRule, Error> {
    let to_error = |e: serde_json::Error| Error::Deserialization {
        message: e.to_string(),
        body: body.to_owned(),
    };

    if result.get("rules").is_some_and(serde_json::Value::is_array) {
        let ruleset: Ruleset = serde_json::from_value(result).map_err(to_error)?;
        let found = match selector {
            RuleSelector::Id(id) => ruleset.find_rule_by_id(id),
            RuleSelector::Description(desc) => ruleset.find_rule_by_description(desc),
        };
        return found.cloned().ok_or_else(|| Error::Deserialization {
            message: "mutated rule missing from returned ruleset".into(),
            body: body.to_owned(),
        });
    }

    serde_json::from_value(result).map_err(to_error)
}

fn preview(body: &str) -> &str {
    let mut end = body.len().min(200);
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    &body[..end]
}

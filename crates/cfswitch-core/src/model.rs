// ── Domain model ──
//
// The cached view of the managed rule and the loop's health report.

use chrono::{DateTime, Utc};
use serde::Serialize;

use cfswitch_api::RemoteRule;

/// The managed rule as last confirmed by the remote API.
///
/// `expression` is always `build_expression(&hostnames)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rule {
    #[serde(rename = "rule_id")]
    pub id: String,
    pub enabled: bool,
    pub expression: String,
    pub hostnames: Vec<String>,
    pub description: String,
    pub version: u64,
}

impl Rule {
    /// Cache entry for a remote rule known to carry the expression for
    /// `hostnames`.
    pub(crate) fn from_remote(remote: &RemoteRule, hostnames: Vec<String>, expression: String) -> Self {
        Self {
            id: remote.id.clone(),
            enabled: remote.enabled,
            expression,
            hostnames,
            description: remote.description.clone(),
            version: remote.version.get(),
        }
    }
}

/// Outcome history of reconciliation passes, published on a watch channel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileStatus {
    pub last_success: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub consecutive_failures: u32,
}

impl ReconcileStatus {
    /// At least one pass has succeeded.
    pub fn is_ready(&self) -> bool {
        self.last_success.is_some()
    }

    pub(crate) fn record_success(&mut self) {
        self.last_success = Some(Utc::now());
        self.last_error = None;
        self.consecutive_failures = 0;
    }

    pub(crate) fn record_failure(&mut self, error: String) {
        self.last_error = Some(error);
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
    }
}

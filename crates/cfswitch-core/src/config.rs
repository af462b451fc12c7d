// ── Reconciler configuration ──
//
// The desired state for one process lifetime. The binary builds this from
// the loaded service configuration and hands it to `Reconciler::new`.

use std::time::Duration;

use cfswitch_api::TransportConfig;

use crate::expression::normalize_hostnames;

/// Description marker identifying the managed rule inside the ruleset.
pub const RULE_DESCRIPTION: &str = "cf-switch:global";

/// Most remote requests one pass issues: get, create ruleset, add rule.
pub const MAX_REQUESTS_PER_PASS: u32 = 3;

/// Desired state plus loop timing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcilerConfig {
    pub zone_id: String,
    /// Normalized: lowercase, trimmed, deduplicated, sorted.
    pub hostnames: Vec<String>,
    /// `enabled` flag for a rule this process has to create.
    pub default_enabled: bool,
    pub reconcile_interval: Duration,
    /// Deadline for one pass, the first one included. Must not be shorter
    /// than [`ReconcilerConfig::pass_budget`] for the client in use, or a
    /// permitted retry wait is reported as a timeout.
    pub pass_timeout: Duration,
}

impl ReconcilerConfig {
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(60);

    /// Worst case for a pass made through `transport`: every request
    /// exhausting its retries.
    pub fn pass_budget(transport: &TransportConfig) -> Duration {
        transport.request_budget().saturating_mul(MAX_REQUESTS_PER_PASS)
    }

    /// Build a config with default timing, sized for the default transport. `hostnames` are normalized here.
    pub fn new<I, S>(zone_id: impl Into<String>, hostnames: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            zone_id: zone_id.into(),
            hostnames: normalize_hostnames(hostnames),
            default_enabled: false,
            reconcile_interval: Self::DEFAULT_INTERVAL,
            pass_timeout: Self::pass_budget(&TransportConfig::default()),
        }
    }

    pub fn with_default_enabled(mut self, enabled: bool) -> Self {
        self.default_enabled = enabled;
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.reconcile_interval = interval;
        self
    }

    pub fn with_pass_timeout(mut self, timeout: Duration) -> Self {
        self.pass_timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_normalizes_hostnames() {
        let cfg = ReconcilerConfig::new("z", ["B.com", " a.com", "b.com,c.com"]);
        assert_eq!(cfg.hostnames, vec!["a.com", "b.com", "c.com"]);
        assert!(!cfg.default_enabled);
        assert_eq!(cfg.reconcile_interval, Duration::from_secs(60));
    }

    #[test]
    fn default_pass_timeout_outlasts_client_retries() {
        let cfg = ReconcilerConfig::new("z", ["a.com"]);
        let transport = TransportConfig::default();
        assert_eq!(cfg.pass_timeout, Duration::from_secs(630));
        assert!(cfg.pass_timeout > transport.retry.max_rate_limit_wait + transport.timeout);
    }
}

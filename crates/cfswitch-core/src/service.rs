// ── Rule service seam ──
//
// What the HTTP layer needs from the reconciler. Handlers hold an
// `Arc<dyn RuleService>` so router tests can use a stub.

use async_trait::async_trait;

use crate::error::CoreError;
use crate::model::{ReconcileStatus, Rule};

#[async_trait]
pub trait RuleService: Send + Sync {
    /// Copy of the cached rule, or `NotInitialized`.
    async fn current_rule(&self) -> Result<Rule, CoreError>;

    /// Set `enabled` on the remote rule.
    async fn toggle_rule(&self, enabled: bool) -> Result<Rule, CoreError>;

    /// Replace the hostname set. Input is normalized first.
    async fn update_hosts(&self, hostnames: Vec<String>) -> Result<Rule, CoreError>;

    /// Latest reconciliation status.
    fn status(&self) -> ReconcileStatus;
}

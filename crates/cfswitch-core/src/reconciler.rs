// ── Reconciler ──
//
// Converges the managed rule toward the configured hostname set and serves
// the cached copy to the HTTP layer. One `RwLock` guards the cached rule and
// ruleset id; every write holds it across its remote call.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use cfswitch_api::{BLOCK_ACTION, HTTP_REQUEST_FIREWALL_CUSTOM, NewRule, RulePatch, Ruleset};

use crate::config::{RULE_DESCRIPTION, ReconcilerConfig};
use crate::error::CoreError;
use crate::expression::{build_expression, normalize_hostnames};
use crate::model::{ReconcileStatus, Rule};
use crate::remote::RuleApi;
use crate::service::RuleService;

// ── Cached state ─────────────────────────────────────────────────

/// What the last successful remote read or write confirmed.
#[derive(Debug, Default)]
struct SyncedState {
    rule: Option<Rule>,
    ruleset_id: Option<String>,
}

// ── Reconciler ───────────────────────────────────────────────────

/// Owner of the managed rule.
///
/// Cheaply cloneable via `Arc<ReconcilerInner>`. Create with
/// [`new()`](Self::new), then call [`start()`](Self::start) to run the
/// first pass and spawn the periodic loop.
#[derive(Clone)]
pub struct Reconciler {
    inner: Arc<ReconcilerInner>,
}

struct ReconcilerInner {
    config: ReconcilerConfig,
    api: Arc<dyn RuleApi>,
    state: RwLock<SyncedState>,
    status: watch::Sender<ReconcileStatus>,
    cancel: CancellationToken,
    loop_handle: Mutex<Option<JoinHandle<()>>>,
}

impl Reconciler {
    /// Create an uninitialized reconciler. No remote call is made.
    pub fn new(config: ReconcilerConfig, api: Arc<dyn RuleApi>) -> Self {
        let (status, _) = watch::channel(ReconcileStatus::default());
        Self {
            inner: Arc::new(ReconcilerInner {
                config,
                api,
                state: RwLock::new(SyncedState::default()),
                status,
                cancel: CancellationToken::new(),
                loop_handle: Mutex::new(None),
            }),
        }
    }

    /// Latest pass outcome.
    pub fn status(&self) -> ReconcileStatus {
        self.inner.status.borrow().clone()
    }

    /// Subscribe to pass outcomes.
    pub fn subscribe_status(&self) -> watch::Receiver<ReconcileStatus> {
        self.inner.status.subscribe()
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Run one pass and, if it succeeds, spawn the periodic loop.
    ///
    /// The first pass is bounded by `pass_timeout` like every later one.
    /// Calling `start` again while the loop runs only repeats the pass.
    pub async fn start(&self) -> Result<(), CoreError> {
        if self.inner.cancel.is_cancelled() {
            return Err(CoreError::Cancelled);
        }

        let rule = self.run_pass().await?;

        let mut handle = self.inner.loop_handle.lock().await;
        if handle.is_none() {
            let reconciler = self.clone();
            let cancel = self.inner.cancel.clone();
            *handle = Some(tokio::spawn(reconcile_loop(reconciler, cancel)));
        }

        info!(
            rule_id = %rule.id,
            enabled = rule.enabled,
            interval_secs = self.inner.config.reconcile_interval.as_secs(),
            "reconciler started"
        );
        Ok(())
    }

    /// Cancel the periodic loop and wait until it has exited.
    ///
    /// An in-flight pass is dropped, which releases the lock with the
    /// cache untouched. Safe to call more than once.
    pub async fn stop(&self) {
        self.inner.cancel.cancel();

        let handle = self.inner.loop_handle.lock().await.take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(error = %e, "reconciliation loop did not exit cleanly");
            }
        }
        debug!("reconciler stopped");
    }

    // ── Operations ───────────────────────────────────────────────

    /// Converge the remote rule once and refresh the cache.
    ///
    /// Creates the entrypoint ruleset and the rule when missing. When the
    /// rule exists only `expression` is ever patched; an `enabled` value
    /// changed out of band is adopted, not reverted. On any remote error
    /// the cache keeps its previous contents.
    pub async fn reconcile_once(&self) -> Result<Rule, CoreError> {
        let mut state = self.inner.state.write().await;

        match self.converge().await {
            Ok((ruleset_id, rule)) => {
                state.ruleset_id = Some(ruleset_id);
                state.rule = Some(rule.clone());
                self.publish(Ok(()));
                Ok(rule)
            }
            Err(e) => {
                self.publish(Err(&e));
                Err(e)
            }
        }
    }

    /// Copy of the cached rule.
    pub async fn current_rule(&self) -> Result<Rule, CoreError> {
        self.inner
            .state
            .read()
            .await
            .rule
            .clone()
            .ok_or(CoreError::NotInitialized)
    }

    /// Patch only `enabled` on the remote rule.
    pub async fn toggle_rule(&self, enabled: bool) -> Result<Rule, CoreError> {
        let mut state = self.inner.state.write().await;
        let SyncedState {
            rule: Some(rule),
            ruleset_id: Some(ruleset_id),
        } = &mut *state
        else {
            return Err(CoreError::NotInitialized);
        };

        let updated = self
            .inner
            .api
            .update_rule(
                &self.inner.config.zone_id,
                ruleset_id,
                &rule.id,
                &RulePatch::enabled(enabled),
            )
            .await
            .map_err(CoreError::remote("toggle rule"))?;

        rule.enabled = updated.enabled;
        rule.version = updated.version.get();

        info!(
            rule_id = %rule.id,
            enabled = rule.enabled,
            version = rule.version,
            "rule toggled"
        );
        Ok(rule.clone())
    }

    /// Replace the hostname set and patch only `expression`.
    ///
    /// Input entries are normalized; an empty result is rejected before
    /// any remote call. The periodic loop still converges on the
    /// configured hostnames, so this change lasts until the next pass.
    pub async fn update_hosts<I, S>(&self, hostnames: I) -> Result<Rule, CoreError>
    where
        I: IntoIterator<Item = S> + Send,
        S: AsRef<str>,
    {
        let hostnames = normalize_hostnames(hostnames);
        if hostnames.is_empty() {
            return Err(CoreError::Validation {
                message: "no valid hostnames provided".into(),
            });
        }
        let expression = build_expression(&hostnames);

        let mut state = self.inner.state.write().await;
        let SyncedState {
            rule: Some(rule),
            ruleset_id: Some(ruleset_id),
        } = &mut *state
        else {
            return Err(CoreError::NotInitialized);
        };

        let updated = self
            .inner
            .api
            .update_rule(
                &self.inner.config.zone_id,
                ruleset_id,
                &rule.id,
                &RulePatch::expression(expression.clone()),
            )
            .await
            .map_err(CoreError::remote("update rule hosts"))?;

        rule.hostnames = hostnames;
        rule.expression = expression;
        rule.version = updated.version.get();

        info!(
            rule_id = %rule.id,
            hostnames = ?rule.hostnames,
            version = rule.version,
            "rule hosts updated"
        );
        Ok(rule.clone())
    }

    // ── Internals ────────────────────────────────────────────────

    /// `reconcile_once` bounded by the configured pass deadline.
    async fn run_pass(&self) -> Result<Rule, CoreError> {
        let timeout = self.inner.config.pass_timeout;
        if let Ok(result) = tokio::time::timeout(timeout, self.reconcile_once()).await {
            result
        } else {
            let err = CoreError::Timeout {
                operation: "reconciliation pass",
                timeout_secs: timeout.as_secs(),
            };
            self.publish(Err(&err));
            Err(err)
        }
    }

    /// Read the remote side and apply at most one write. Touches no cache.
    async fn converge(&self) -> Result<(String, Rule), CoreError> {
        let config = &self.inner.config;
        let ruleset = self.ensure_entrypoint().await?;
        let desired = build_expression(&config.hostnames);

        let rule = match ruleset.find_rule_by_description(RULE_DESCRIPTION) {
            None => {
                let new_rule = NewRule {
                    action: BLOCK_ACTION.into(),
                    expression: desired.clone(),
                    description: RULE_DESCRIPTION.into(),
                    enabled: config.default_enabled,
                };
                let created = self
                    .inner
                    .api
                    .add_rule(&config.zone_id, &ruleset.id, &new_rule)
                    .await
                    .map_err(CoreError::remote("add rule"))?;
                info!(
                    rule_id = %created.id,
                    ruleset_id = %ruleset.id,
                    enabled = created.enabled,
                    expression = %desired,
                    "created rule"
                );
                Rule::from_remote(&created, config.hostnames.clone(), desired)
            }
            Some(existing) if existing.expression != desired => {
                info!(
                    rule_id = %existing.id,
                    current = %existing.expression,
                    expected = %desired,
                    "rule expression drifted, patching"
                );
                let updated = self
                    .inner
                    .api
                    .update_rule(
                        &config.zone_id,
                        &ruleset.id,
                        &existing.id,
                        &RulePatch::expression(desired.clone()),
                    )
                    .await
                    .map_err(CoreError::remote("update rule expression"))?;
                info!(rule_id = %updated.id, version = updated.version.get(), "updated rule");
                Rule::from_remote(&updated, config.hostnames.clone(), desired)
            }
            Some(existing) => {
                debug!(rule_id = %existing.id, enabled = existing.enabled, "rule is up to date");
                Rule::from_remote(existing, config.hostnames.clone(), desired)
            }
        };

        Ok((ruleset.id, rule))
    }

    async fn ensure_entrypoint(&self) -> Result<Ruleset, CoreError> {
        let zone_id = &self.inner.config.zone_id;
        let phase = HTTP_REQUEST_FIREWALL_CUSTOM;

        let existing = self
            .inner
            .api
            .get_entrypoint(zone_id, phase)
            .await
            .map_err(CoreError::remote("get entrypoint ruleset"))?;

        if let Some(ruleset) = existing {
            debug!(ruleset_id = %ruleset.id, "found entrypoint ruleset");
            return Ok(ruleset);
        }

        info!(phase, "creating entrypoint ruleset");
        let ruleset = self
            .inner
            .api
            .create_entrypoint(zone_id, phase)
            .await
            .map_err(CoreError::remote("create entrypoint ruleset"))?;
        info!(ruleset_id = %ruleset.id, "created entrypoint ruleset");
        Ok(ruleset)
    }

    fn publish(&self, outcome: Result<(), &CoreError>) {
        self.inner.status.send_modify(|status| match outcome {
            Ok(()) => status.record_success(),
            Err(e) => status.record_failure(e.to_string()),
        });
    }
}

// ── RuleService ──────────────────────────────────────────────────

#[async_trait]
impl RuleService for Reconciler {
    async fn current_rule(&self) -> Result<Rule, CoreError> {
        Reconciler::current_rule(self).await
    }

    async fn toggle_rule(&self, enabled: bool) -> Result<Rule, CoreError> {
        Reconciler::toggle_rule(self, enabled).await
    }

    async fn update_hosts(&self, hostnames: Vec<String>) -> Result<Rule, CoreError> {
        Reconciler::update_hosts(self, hostnames).await
    }

    fn status(&self) -> ReconcileStatus {
        Reconciler::status(self)
    }
}

// ── Background task ──────────────────────────────────────────────

/// Run a bounded pass every `reconcile_interval` until cancelled.
///
/// A failed pass is logged and published; the loop keeps going.
async fn reconcile_loop(reconciler: Reconciler, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(reconciler.inner.config.reconcile_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval.tick().await; // consume the immediate first tick

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    result = reconciler.run_pass() => match result {
                        Ok(rule) => debug!(rule_id = %rule.id, "periodic reconciliation complete"),
                        Err(e) => warn!(error = %e, "periodic reconciliation failed"),
                    },
                }
            }
        }
    }

    info!("reconciliation loop stopped");
}

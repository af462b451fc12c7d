// ── Remote rule API seam ──
//
// The reconciler talks to Cloudflare only through `RuleApi`, so tests can
// substitute an in-memory ruleset.

use async_trait::async_trait;

use cfswitch_api::{Error, NewRule, RemoteRule, RulePatch, Ruleset, RulesetClient};

/// Remote operations the reconciler needs.
#[async_trait]
pub trait RuleApi: Send + Sync {
    /// `Ok(None)` when the zone has no entrypoint for `phase`.
    async fn get_entrypoint(&self, zone_id: &str, phase: &str) -> Result<Option<Ruleset>, Error>;

    async fn create_entrypoint(&self, zone_id: &str, phase: &str) -> Result<Ruleset, Error>;

    async fn add_rule(&self, zone_id: &str, ruleset_id: &str, rule: &NewRule) -> Result<RemoteRule, Error>;

    async fn update_rule(
        &self,
        zone_id: &str,
        ruleset_id: &str,
        rule_id: &str,
        patch: &RulePatch,
    ) -> Result<RemoteRule, Error>;
}

#[async_trait]
impl RuleApi for RulesetClient {
    async fn get_entrypoint(&self, zone_id: &str, phase: &str) -> Result<Option<Ruleset>, Error> {
        RulesetClient::get_entrypoint(self, zone_id, phase).await
    }

    async fn create_entrypoint(&self, zone_id: &str, phase: &str) -> Result<Ruleset, Error> {
        RulesetClient::create_entrypoint(self, zone_id, phase).await
    }

    async fn add_rule(&self, zone_id: &str, ruleset_id: &str, rule: &NewRule) -> Result<RemoteRule, Error> {
        RulesetClient::add_rule(self, zone_id, ruleset_id, rule).await
    }

    async fn update_rule(
        &self,
        zone_id: &str,
        ruleset_id: &str,
        rule_id: &str,
        patch: &RulePatch,
    ) -> Result<RemoteRule, Error> {
        RulesetClient::update_rule(self, zone_id, ruleset_id, rule_id, patch).await
    }
}

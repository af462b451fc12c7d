// Rulesets API client for zone-level WAF custom rules.
//
// Covers the four calls the reconciler needs: read and create the phase
// entrypoint ruleset, add a rule to it, and patch a rule in place.

pub mod client;
pub mod types;

pub use client::RulesetClient;

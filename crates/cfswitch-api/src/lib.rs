// cfswitch-api: Async Rust client for the Cloudflare rulesets API

pub mod error;
pub mod rulesets;
pub mod transport;

pub use error::Error;
pub use rulesets::RulesetClient;
pub use rulesets::types::{
    ApiErrorDetail, BLOCK_ACTION, HTTP_REQUEST_FIREWALL_CUSTOM, NewRule, RemoteRule, RulePatch,
    Ruleset, Version,
};
pub use transport::{DEFAULT_BASE_URL, RetryPolicy, TransportConfig};

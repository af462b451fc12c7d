//! Reconciliation core for cf-switch.
//!
//! Keeps a single Cloudflare WAF custom rule, located by its description
//! marker, converged on the configured hostname set:
//!
//! - **[`Reconciler`]**: owns the cached [`Rule`] and ruleset id behind one
//!   `RwLock`. Every mutation (periodic pass, toggle, host update) takes the
//!   write lock across its remote call, so at most one write is in flight.
//!   [`start()`](Reconciler::start) runs a first pass and spawns the periodic
//!   loop; [`stop()`](Reconciler::stop) cancels it and waits for it to exit.
//!
//! - **[`expression`]**: pure helpers that normalize hostnames and build the
//!   `http.host in {...}` filter expression.
//!
//! - **Seams**: [`RuleApi`] (remote calls, implemented for
//!   [`cfswitch_api::RulesetClient`]), [`RuleService`] (what the HTTP layer
//!   consumes) and [`TokenProvider`] (inbound bearer token source).

pub mod config;
pub mod credentials;
pub mod error;
pub mod expression;
pub mod model;
pub mod reconciler;
pub mod remote;
pub mod service;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{RULE_DESCRIPTION, ReconcilerConfig};
pub use credentials::TokenProvider;
pub use error::CoreError;
pub use expression::{build_expression, normalize_hostnames, parse_hostnames};
pub use model::{ReconcileStatus, Rule};
pub use reconciler::Reconciler;
pub use remote::RuleApi;
pub use service::RuleService;

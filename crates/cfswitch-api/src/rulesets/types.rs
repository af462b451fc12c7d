// Rulesets API request and response types
//
// Every response is wrapped in the `{ success, errors, result }` envelope.
// Rule versions arrive as JSON integers on some endpoints and as strings on
// others, so `Version` decodes both into one numeric type.

use std::fmt;

use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize};

/// Phase of the zone-level WAF custom rules entrypoint.
pub const HTTP_REQUEST_FIREWALL_CUSTOM: &str = "http_request_firewall_custom";

/// Action applied by a matching custom rule.
pub const BLOCK_ACTION: &str = "block";

// ── Envelope ────────────────────────────────────────────────────────

/// Standard Cloudflare v4 response envelope.
///
/// ```json
/// { "success": true, "errors": [], "messages": [], "result": { ... } }
/// ```
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(default)]
    pub errors: Vec<ApiErrorDetail>,
    #[serde(default)]
    pub result: Option<T>,
}

/// One entry of the envelope's `errors` list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: String,
}

impl fmt::Display for ApiErrorDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

// ── Version ─────────────────────────────────────────────────────────

/// Monotonic rule version reported by the API.
///
/// Accepts `7`, `"7"` and `null` (→ 0). Floats, booleans, negative numbers
/// and non-numeric strings are rejected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Version(pub u64);

impl Version {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(VersionVisitor)
    }
}

struct VersionVisitor;

impl<'de> Visitor<'de> for VersionVisitor {
    type Value = Version;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a non-negative integer or a string containing one")
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Version, E> {
        Ok(Version(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Version, E> {
        u64::try_from(v)
            .map(Version)
            .map_err(|_| E::invalid_value(de::Unexpected::Signed(v), &self))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Version, E> {
        v.parse::<u64>()
            .map(Version)
            .map_err(|_| E::invalid_value(de::Unexpected::Str(v), &self))
    }

    fn visit_unit<E: de::Error>(self) -> Result<Version, E> {
        Ok(Version(0))
    }

    fn visit_none<E: de::Error>(self) -> Result<Version, E> {
        Ok(Version(0))
    }
}

// ── Rulesets & rules ────────────────────────────────────────────────

/// A ruleset as returned by the entrypoint and create endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ruleset {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub phase: String,
    #[serde(default)]
    pub rules: Vec<RemoteRule>,
}

impl Ruleset {
    /// The first rule whose description matches `description` exactly.
    pub fn find_rule_by_description(&self, description: &str) -> Option<&RemoteRule> {
        self.rules.iter().find(|r| r.description == description)
    }

    /// The rule with the given id.
    pub fn find_rule_by_id(&self, id: &str) -> Option<&RemoteRule> {
        self.rules.iter().find(|r| r.id == id)
    }
}

/// A single rule inside a ruleset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteRule {
    pub id: String,
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub expression: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub version: Version,
}

// ── Request bodies ──────────────────────────────────────────────────

/// Body of `POST /zones/{zone}/rulesets`.
#[derive(Debug, Clone, Serialize)]
pub struct CreateRuleset {
    pub kind: String,
    pub name: String,
    pub description: String,
    pub phase: String,
    pub rules: Vec<NewRule>,
}

impl CreateRuleset {
    /// Zone-level entrypoint for `phase`, with no rules.
    pub fn zone_entrypoint(phase: &str) -> Self {
        Self {
            kind: "zone".into(),
            name: format!("{phase} entrypoint"),
            description: format!("Managed by cf-switch for {phase} phase"),
            phase: phase.into(),
            rules: Vec::new(),
        }
    }
}

/// Body of `POST /zones/{zone}/rulesets/{ruleset}/rules`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewRule {
    pub action: String,
    pub expression: String,
    pub description: String,
    pub enabled: bool,
}

/// Sparse body of `PATCH .../rules/{rule}`.
///
/// The endpoint patches only the fields present, so unset fields are
/// left out of the JSON entirely.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RulePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}

impl RulePatch {
    pub fn expression(expression: impl Into<String>) -> Self {
        Self {
            expression: Some(expression.into()),
            ..Self::default()
        }
    }

    pub fn enabled(enabled: bool) -> Self {
        Self {
            enabled: Some(enabled),
            ..Self::default()
        }
    }
}

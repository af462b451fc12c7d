//! Configuration for the cf-switch service.
//!
//! Layered loading (defaults, optional TOML file, environment), validation
//! into a [`ServiceConfig`], translation to the core and transport configs,
//! and the inbound API token providers.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use cfswitch_api::{DEFAULT_BASE_URL, RetryPolicy, TransportConfig};
use cfswitch_core::{ReconcilerConfig, normalize_hostnames};

pub mod token;

pub use token::{KeyringTokenProvider, LocalTokenProvider, generate_token};

/// Environment variables read on top of the file layer.
pub const ENV_KEYS: &[&str] = &[
    "CLOUDFLARE_ZONE_ID",
    "CLOUDFLARE_API_TOKEN",
    "CLOUDFLARE_API_URL",
    "DEST_HOSTNAMES",
    "CF_RULE_DEFAULT_ENABLED",
    "HTTP_ADDR",
    "RECONCILE_INTERVAL",
    "REQUEST_TIMEOUT",
    "RUNNING_LOCALLY",
];

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required setting {field}")]
    Missing { field: String },

    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("keyring error: {0}")]
    Keyring(#[from] keyring::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

impl ConfigError {
    fn invalid(field: &str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

// ── Raw settings ────────────────────────────────────────────────────

/// A duration given either as humantime text (`"90s"`, `"2m"`) or as a
/// bare number of seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DurationSetting {
    Seconds(u64),
    Text(String),
}

impl DurationSetting {
    fn parse(&self, field: &str) -> Result<Duration, ConfigError> {
        let duration = match self {
            Self::Seconds(secs) => Duration::from_secs(*secs),
            Self::Text(text) => humantime::parse_duration(text.trim())
                .map_err(|e| ConfigError::invalid(field, format!("{text:?}: {e}")))?,
        };
        if duration.is_zero() {
            return Err(ConfigError::invalid(field, "must be greater than zero"));
        }
        Ok(duration)
    }
}

/// Hostnames as a comma-separated string (environment) or a list (TOML).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HostnameSetting {
    List(Vec<String>),
    Csv(String),
}

impl HostnameSetting {
    fn normalized(&self) -> Vec<String> {
        match self {
            Self::List(items) => normalize_hostnames(items),
            Self::Csv(raw) => normalize_hostnames([raw]),
        }
    }
}

/// Settings exactly as extracted from the figment layers.
///
/// Field names are the lowercased environment variable names, so the
/// TOML file and the environment share one key space. No `Debug`: the
/// API token is still plain text here.
#[derive(Clone, Serialize, Deserialize)]
pub struct Settings {
    pub cloudflare_zone_id: Option<String>,
    pub cloudflare_api_token: Option<String>,
    pub cloudflare_api_url: String,
    pub dest_hostnames: Option<HostnameSetting>,
    pub cf_rule_default_enabled: bool,
    pub http_addr: String,
    pub reconcile_interval: DurationSetting,
    pub request_timeout: DurationSetting,
    pub running_locally: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            cloudflare_zone_id: None,
            cloudflare_api_token: None,
            cloudflare_api_url: DEFAULT_BASE_URL.into(),
            dest_hostnames: None,
            cf_rule_default_enabled: false,
            http_addr: "0.0.0.0:8080".into(),
            reconcile_interval: DurationSetting::Text("60s".into()),
            request_timeout: DurationSetting::Text("30s".into()),
            running_locally: false,
        }
    }
}

// ── Validated config ────────────────────────────────────────────────

/// Everything the service needs, validated.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub zone_id: String,
    pub api_token: SecretString,
    pub api_url: Url,
    /// Normalized, never empty.
    pub hostnames: Vec<String>,
    pub default_enabled: bool,
    pub http_addr: SocketAddr,
    pub reconcile_interval: Duration,
    pub request_timeout: Duration,
    pub running_locally: bool,
}

impl Settings {
    pub fn validate(self) -> Result<ServiceConfig, ConfigError> {
        let zone_id = required("CLOUDFLARE_ZONE_ID", self.cloudflare_zone_id)?;
        let api_token = required("CLOUDFLARE_API_TOKEN", self.cloudflare_api_token)?;

        let hostnames = self
            .dest_hostnames
            .as_ref()
            .map(HostnameSetting::normalized)
            .unwrap_or_default();
        if hostnames.is_empty() {
            return Err(ConfigError::Missing {
                field: "DEST_HOSTNAMES".into(),
            });
        }

        let api_url = Url::parse(self.cloudflare_api_url.trim())
            .map_err(|e| ConfigError::invalid("CLOUDFLARE_API_URL", e.to_string()))?;
        let http_addr = self
            .http_addr
            .trim()
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::invalid("HTTP_ADDR", format!("{:?}: {e}", self.http_addr)))?;

        Ok(ServiceConfig {
            zone_id,
            api_token: SecretString::from(api_token),
            api_url,
            hostnames,
            default_enabled: self.cf_rule_default_enabled,
            http_addr,
            reconcile_interval: self.reconcile_interval.parse("RECONCILE_INTERVAL")?,
            request_timeout: self.request_timeout.parse("REQUEST_TIMEOUT")?,
            running_locally: self.running_locally,
        })
    }
}

fn required(field: &str, value: Option<String>) -> Result<String, ConfigError> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ConfigError::Missing {
            field: field.into(),
        })
}

impl ServiceConfig {
    /// Desired state for the reconciler. The pass deadline is sized so a
    /// pass never times out while the client is still inside its retries.
    pub fn reconciler_config(&self) -> ReconcilerConfig {
        ReconcilerConfig::new(self.zone_id.clone(), &self.hostnames)
            .with_default_enabled(self.default_enabled)
            .with_interval(self.reconcile_interval)
            .with_pass_timeout(ReconcilerConfig::pass_budget(&self.transport_config()))
    }

    /// HTTP settings for the rulesets client.
    pub fn transport_config(&self) -> TransportConfig {
        TransportConfig {
            timeout: self.request_timeout,
            retry: RetryPolicy::default(),
        }
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Default config file location via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("io", "cf-switch", "cf-switch").map_or_else(
        || PathBuf::from("cf-switch.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

// ── Config loading ──────────────────────────────────────────────────

/// Defaults merged with the TOML file at `path` (missing file is fine).
pub fn file_figment(path: &Path) -> Figment {
    Figment::new()
        .merge(Serialized::defaults(Settings::default()))
        .merge(Toml::file(path))
}

/// Full layering: defaults, TOML file, then the environment.
pub fn figment(path: &Path) -> Figment {
    file_figment(path).merge(Env::raw().only(ENV_KEYS))
}

/// Extract and validate settings from any figment.
pub fn from_figment(figment: &Figment) -> Result<ServiceConfig, ConfigError> {
    let settings: Settings = figment.extract()?;
    settings.validate()
}

/// Load from `path` (or the default location) plus the environment.
pub fn load(path: Option<&Path>) -> Result<ServiceConfig, ConfigError> {
    let path = path.map_or_else(config_path, Path::to_path_buf);
    from_figment(&figment(&path))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use secrecy::ExposeSecret;
    use std::io::Write;

    fn with_toml(toml: &str) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::string(toml))
    }

    const MINIMAL: &str = r#"
        cloudflare_zone_id = "zone-abc"
        cloudflare_api_token = "tok"
        dest_hostnames = "B.com, a.com"
    "#;

    #[test]
    fn minimal_config_uses_defaults() {
        let cfg = from_figment(&with_toml(MINIMAL)).unwrap();

        assert_eq!(cfg.zone_id, "zone-abc");
        assert_eq!(cfg.api_token.expose_secret(), "tok");
        assert_eq!(cfg.hostnames, vec!["a.com", "b.com"]);
        assert!(!cfg.default_enabled);
        assert!(!cfg.running_locally);
        assert_eq!(cfg.http_addr, "0.0.0.0:8080".parse::<SocketAddr>().unwrap());
        assert_eq!(cfg.reconcile_interval, Duration::from_secs(60));
        assert_eq!(cfg.request_timeout, Duration::from_secs(30));
        assert_eq!(cfg.api_url.as_str(), "https://api.cloudflare.com/client/v4");
    }

    #[test]
    fn hostnames_accept_a_list() {
        let cfg = from_figment(&with_toml(
            r#"
            cloudflare_zone_id = "z"
            cloudflare_api_token = "t"
            dest_hostnames = ["x.com", "X.com ", "w.com,v.com"]
            "#,
        ))
        .unwrap();
        assert_eq!(cfg.hostnames, vec!["v.com", "w.com", "x.com"]);
    }

    #[test]
    fn durations_accept_text_and_seconds() {
        let cfg = from_figment(&with_toml(&format!(
            "{MINIMAL}\nreconcile_interval = \"2m 30s\"\nrequest_timeout = 5\n"
        )))
        .unwrap();
        assert_eq!(cfg.reconcile_interval, Duration::from_secs(150));
        assert_eq!(cfg.request_timeout, Duration::from_secs(5));
    }

    #[test]
    fn missing_fields_are_reported_by_env_name() {
        let err = from_figment(&with_toml("")).unwrap_err();
        assert!(matches!(err, ConfigError::Missing { ref field } if field == "CLOUDFLARE_ZONE_ID"));

        let err = from_figment(&with_toml(
            "cloudflare_zone_id = \"z\"\ncloudflare_api_token = \"  \"",
        ))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Missing { ref field } if field == "CLOUDFLARE_API_TOKEN"));
    }

    #[test]
    fn hostnames_that_normalize_to_nothing_are_missing() {
        let err = from_figment(&with_toml(
            "cloudflare_zone_id = \"z\"\ncloudflare_api_token = \"t\"\ndest_hostnames = \" , ,\"",
        ))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Missing { ref field } if field == "DEST_HOSTNAMES"));
    }

    #[test]
    fn zero_or_garbage_interval_is_rejected() {
        for bad in ["reconcile_interval = \"0s\"", "reconcile_interval = \"soon\"", "reconcile_interval = 0"] {
            let err = from_figment(&with_toml(&format!("{MINIMAL}\n{bad}"))).unwrap_err();
            assert!(
                matches!(err, ConfigError::Validation { ref field, .. } if field == "RECONCILE_INTERVAL"),
                "{bad}: {err}"
            );
        }
    }

    #[test]
    fn bad_listen_address_is_rejected() {
        let err = from_figment(&with_toml(&format!("{MINIMAL}\nhttp_addr = \":8080\""))).unwrap_err();
        assert!(matches!(err, ConfigError::Validation { ref field, .. } if field == "HTTP_ADDR"));
    }

    #[test]
    fn reconciler_and_transport_configs() {
        let cfg = from_figment(&with_toml(&format!(
            "{MINIMAL}\ncf_rule_default_enabled = true\nreconcile_interval = \"15s\"\nrequest_timeout = \"10s\""
        )))
        .unwrap();

        let rc = cfg.reconciler_config();
        assert_eq!(rc.zone_id, "zone-abc");
        assert_eq!(rc.hostnames, vec!["a.com", "b.com"]);
        assert!(rc.default_enabled);
        assert_eq!(rc.reconcile_interval, Duration::from_secs(15));

        let transport = cfg.transport_config();
        assert_eq!(transport.timeout, Duration::from_secs(10));
        assert_eq!(transport.retry, RetryPolicy::default());

        // Three requests, each up to 3 x 10s attempts plus two 60s waits.
        assert_eq!(rc.pass_timeout, Duration::from_secs(450));
        assert_eq!(rc.pass_timeout, ReconcilerConfig::pass_budget(&transport));
    }

    #[test]
    fn file_layer_is_read_and_missing_file_is_fine() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{MINIMAL}\nhttp_addr = \"127.0.0.1:9000\"").unwrap();

        let cfg = from_figment(&file_figment(file.path())).unwrap();
        assert_eq!(cfg.http_addr.port(), 9000);

        let dir = tempfile::tempdir().unwrap();
        let err = from_figment(&file_figment(&dir.path().join("absent.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Missing { .. }));
    }
}

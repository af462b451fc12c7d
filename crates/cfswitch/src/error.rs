//! Process-level error types with miette diagnostics.

use std::net::SocketAddr;

use miette::Diagnostic;
use thiserror::Error;

use cfswitch_config::ConfigError;
use cfswitch_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    /// EX_CONFIG from sysexits.h.
    pub const CONFIG: i32 = 78;
}

#[derive(Debug, Error, Diagnostic)]
pub enum AppError {
    // ── Configuration ────────────────────────────────────────────────
    #[error("Invalid configuration")]
    #[diagnostic(
        code(cf_switch::config),
        help(
            "Set CLOUDFLARE_ZONE_ID, CLOUDFLARE_API_TOKEN and DEST_HOSTNAMES,\n\
             or pass --config <file> with the same keys in lowercase."
        )
    )]
    Config(#[source] ConfigError),

    #[error("Could not build the Cloudflare API client")]
    #[diagnostic(code(cf_switch::client))]
    Client(#[source] cfswitch_api::Error),

    // ── Startup ──────────────────────────────────────────────────────
    #[error("Could not obtain the inbound API token")]
    #[diagnostic(
        code(cf_switch::credentials),
        help("Set RUNNING_LOCALLY=true to use a generated in-memory token instead of the OS keyring.")
    )]
    Credentials(#[source] CoreError),

    #[error("Initial reconciliation failed")]
    #[diagnostic(
        code(cf_switch::startup),
        help("Check the zone id and that the API token can edit zone WAF custom rules.")
    )]
    Startup(#[source] CoreError),

    // ── HTTP server ──────────────────────────────────────────────────
    #[error("Could not listen on {addr}")]
    #[diagnostic(code(cf_switch::bind), help("Pick a free address with HTTP_ADDR."))]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("HTTP server failed")]
    #[diagnostic(code(cf_switch::server))]
    Server(#[source] std::io::Error),
}

impl From<ConfigError> for AppError {
    fn from(err: ConfigError) -> Self {
        Self::Config(err)
    }
}

impl AppError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => exit_code::CONFIG,
            _ => exit_code::GENERAL,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_errors_exit_with_ex_config() {
        let err = AppError::from(ConfigError::Missing {
            field: "CLOUDFLARE_ZONE_ID".into(),
        });
        assert_eq!(err.exit_code(), 78);

        let err = AppError::Startup(CoreError::NotInitialized);
        assert_eq!(err.exit_code(), 1);
    }
}

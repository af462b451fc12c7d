//! Clap derive structures for the `cf-switch` binary.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// cf-switch -- keep one Cloudflare WAF block rule in sync
#[derive(Debug, Parser)]
#[command(
    name = "cf-switch",
    version,
    about = "Keep a Cloudflare WAF custom rule in sync and toggle it over HTTP",
    long_about = "Reconciles a single Cloudflare WAF custom rule (blocking the configured\n\
        hostnames) and serves an authenticated HTTP API to enable, disable, or\n\
        retarget it.\n\n\
        Settings come from an optional TOML file, overridden by environment\n\
        variables: CLOUDFLARE_ZONE_ID, CLOUDFLARE_API_TOKEN, DEST_HOSTNAMES,\n\
        CF_RULE_DEFAULT_ENABLED, HTTP_ADDR, RECONCILE_INTERVAL, REQUEST_TIMEOUT,\n\
        CLOUDFLARE_API_URL, RUNNING_LOCALLY."
)]
pub struct Cli {
    /// Path to the TOML config file
    #[arg(long, short = 'c', env = "CF_SWITCH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Validate the configuration and exit
    #[arg(long)]
    pub check: bool,

    /// Log output format
    #[arg(long, value_enum, default_value = "text", env = "CF_SWITCH_LOG_FORMAT")]
    pub log_format: LogFormat,

    /// Increase verbosity (-v, -vv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

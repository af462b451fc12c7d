//! Integration tests for the `cf-switch` binary.
//!
//! Only argument parsing and configuration handling are exercised here;
//! nothing talks to Cloudflare.
#![allow(clippy::unwrap_used)]

use std::io::Write;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

// ── Helpers ─────────────────────────────────────────────────────────

const ENV_KEYS: &[&str] = &[
    "CLOUDFLARE_ZONE_ID",
    "CLOUDFLARE_API_TOKEN",
    "CLOUDFLARE_API_URL",
    "DEST_HOSTNAMES",
    "CF_RULE_DEFAULT_ENABLED",
    "HTTP_ADDR",
    "RECONCILE_INTERVAL",
    "REQUEST_TIMEOUT",
    "RUNNING_LOCALLY",
    "CF_SWITCH_CONFIG",
    "CF_SWITCH_LOG_FORMAT",
    "RUST_LOG",
];

/// Build a command for the `cf-switch` binary with env isolation.
///
/// Clears every setting the service reads and points config directories
/// at a nonexistent path so tests never pick up a real configuration.
fn cf_switch_cmd() -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("cf-switch");
    cmd.env("HOME", "/tmp/cf-switch-cli-test-nonexistent")
        .env("XDG_CONFIG_HOME", "/tmp/cf-switch-cli-test-nonexistent");
    for key in ENV_KEYS {
        cmd.env_remove(key);
    }
    cmd
}

/// A command with the three required settings present.
fn configured_cmd() -> assert_cmd::Command {
    let mut cmd = cf_switch_cmd();
    cmd.env("CLOUDFLARE_ZONE_ID", "zone-123")
        .env("CLOUDFLARE_API_TOKEN", "cf-token")
        .env("DEST_HOSTNAMES", "B.example.com, a.example.com");
    cmd
}

fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_help_flag() {
    cf_switch_cmd().arg("--help").assert().success().stdout(
        predicate::str::contains("Cloudflare WAF")
            .and(predicate::str::contains("--config"))
            .and(predicate::str::contains("--check")),
    );
}

#[test]
fn test_version_flag() {
    cf_switch_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("cf-switch"));
}

#[test]
fn test_unknown_log_format_is_usage_error() {
    let output = cf_switch_cmd()
        .args(["--log-format", "xml"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
}

// ── Configuration ───────────────────────────────────────────────────

#[test]
fn test_missing_zone_exits_with_config_code() {
    let output = cf_switch_cmd().arg("--check").output().unwrap();
    assert_eq!(output.status.code(), Some(78));
    let text = combined_output(&output);
    assert!(
        text.contains("CLOUDFLARE_ZONE_ID"),
        "Expected the missing setting to be named:\n{text}"
    );
}

#[test]
fn test_zero_interval_is_rejected() {
    let output = configured_cmd()
        .env("RECONCILE_INTERVAL", "0s")
        .arg("--check")
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(78));
    assert!(combined_output(&output).contains("RECONCILE_INTERVAL"));
}

#[test]
fn test_check_with_env_config() {
    configured_cmd()
        .env("RECONCILE_INTERVAL", "2m")
        .arg("--check")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("configuration OK")
                .and(predicate::str::contains("zone-123"))
                .and(predicate::str::contains("a.example.com, b.example.com"))
                .and(predicate::str::contains("2m"))
                .and(predicate::str::contains("cf-token").not()),
        );
}

#[test]
fn test_check_with_config_file_and_env_override() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
cloudflare_zone_id = "zone-from-file"
cloudflare_api_token = "file-token"
dest_hostnames = ["one.example.com", "two.example.com"]
http_addr = "127.0.0.1:9090"
"#
    )
    .unwrap();

    cf_switch_cmd()
        .arg("--config")
        .arg(file.path())
        .env("CLOUDFLARE_ZONE_ID", "zone-from-env")
        .arg("--check")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("zone-from-env")
                .and(predicate::str::contains("one.example.com, two.example.com"))
                .and(predicate::str::contains("127.0.0.1:9090")),
        );
}

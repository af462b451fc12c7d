//! cf-switch: keeps one Cloudflare WAF block rule in sync and serves an
//! authenticated HTTP API to toggle it.

mod cli;
mod error;
mod server;

use std::sync::Arc;

use clap::Parser;
use secrecy::{ExposeSecret, SecretString};
use tracing::{info, warn};

use cfswitch_api::RulesetClient;
use cfswitch_config::{KeyringTokenProvider, LocalTokenProvider, ServiceConfig};
use cfswitch_core::{Reconciler, TokenProvider};

use crate::cli::{Cli, LogFormat};
use crate::error::AppError;
use crate::server::AppState;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.log_format);

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(verbosity: u8, format: LogFormat) {
    use tracing_subscriber::EnvFilter;

    let filter = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match format {
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init(),
    }
}

async fn run(cli: Cli) -> Result<(), AppError> {
    let config = cfswitch_config::load(cli.config.as_deref())?;

    if cli.check {
        print_summary(&config);
        return Ok(());
    }

    let token = inbound_token(&config).await?;

    let client = RulesetClient::new(
        config.api_url.as_str(),
        &config.api_token,
        &config.transport_config(),
    )
    .map_err(AppError::Client)?;
    let reconciler = Reconciler::new(config.reconciler_config(), Arc::new(client));

    info!(
        zone_id = %config.zone_id,
        hostnames = ?config.hostnames,
        interval_secs = config.reconcile_interval.as_secs(),
        "starting reconciler"
    );
    reconciler.start().await.map_err(AppError::Startup)?;

    let listener = match tokio::net::TcpListener::bind(config.http_addr).await {
        Ok(listener) => listener,
        Err(source) => {
            reconciler.stop().await;
            return Err(AppError::Bind {
                addr: config.http_addr,
                source,
            });
        }
    };
    info!(addr = %config.http_addr, "HTTP API listening");

    let state = AppState {
        service: Arc::new(reconciler.clone()),
        token,
    };
    let served = server::serve(listener, state, server::shutdown_signal()).await;

    reconciler.stop().await;
    info!("shutdown complete");

    served.map_err(AppError::Server)
}

/// Resolve the bearer token callers must present to the HTTP API.
async fn inbound_token(config: &ServiceConfig) -> Result<SecretString, AppError> {
    if config.running_locally {
        let token = LocalTokenProvider::generate()
            .ensure_token()
            .await
            .map_err(AppError::Credentials)?;
        warn!(
            token = %token.expose_secret(),
            "RUNNING_LOCALLY is set; using a generated in-memory API token"
        );
        return Ok(token);
    }

    let provider = KeyringTokenProvider::new().map_err(|e| {
        AppError::Credentials(cfswitch_core::CoreError::Credentials {
            message: e.to_string(),
        })
    })?;
    provider.ensure_token().await.map_err(AppError::Credentials)
}

fn print_summary(config: &ServiceConfig) {
    println!("configuration OK");
    println!("  zone:       {}", config.zone_id);
    println!("  hostnames:  {}", config.hostnames.join(", "));
    println!("  enabled:    {}", config.default_enabled);
    println!("  api url:    {}", config.api_url);
    println!("  listen:     {}", config.http_addr);
    println!(
        "  interval:   {}",
        humantime::format_duration(config.reconcile_interval)
    );
    println!(
        "  timeout:    {}",
        humantime::format_duration(config.request_timeout)
    );
}

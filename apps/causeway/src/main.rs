mod cli;
mod config;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use negotiate_http::{Credentials, Gateway};
use negotiator::Negotiator;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::cli::{Cli, Commands};
use crate::config::Config;

#[tokio::main]
async fn main() {
    // Default to INFO level if RUST_LOG is not set
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info");
    }
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    if let Some(Commands::Check { url }) = cli.command {
        if let Err(e) = cli::run_check(url).await {
            error!("Health check failed: {e:#}");
            std::process::exit(1);
        }
        return;
    }

    let config = Config::from_env();
    info!("Starting causeway broker on port {}", config.port);
    info!(
        "Max group ID: {}, answer TTL: {} seconds",
        config.max_group_id, config.answer_ttl_seconds
    );

    let credentials = match load_credentials(&config) {
        Ok(credentials) => credentials,
        Err(e) => {
            error!("Failed to load credentials: {e:#}");
            std::process::exit(1);
        }
    };

    let negotiator = match Negotiator::new(
        config.max_group_id,
        Duration::from_secs(config.answer_ttl_seconds),
    ) {
        Ok(negotiator) => Arc::new(negotiator),
        Err(e) => {
            error!("Invalid broker configuration: {e}");
            std::process::exit(1);
        }
    };

    let mut gateway = Gateway::new(credentials);
    negotiator.hook_to_api(&mut gateway);
    let app = gateway.into_router().layer(TraceLayer::new_for_http());

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    info!("Causeway listening on {}", addr);

    axum::serve(listener, app)
        .await
        .expect("Failed to start server");
}

/// Credential maps are JSON objects of decimal ID to secret, e.g.
/// `{"66": "hunter2"}`. A missing path means an empty map, which
/// rejects everyone.
fn load_credentials(config: &Config) -> Result<Credentials> {
    Ok(Credentials::new(
        load_id_map(config.user_passwords_path.as_deref()).context("user passwords")?,
        load_id_map(config.group_secrets_path.as_deref()).context("group secrets")?,
    ))
}

fn load_id_map(path: Option<&str>) -> Result<HashMap<u64, String>> {
    let Some(path) = path else {
        return Ok(HashMap::new());
    };
    let raw = std::fs::read_to_string(path).with_context(|| format!("read {path}"))?;
    serde_json::from_str(&raw).with_context(|| format!("parse {path}"))
}

use anyhow::{ensure, Context, Result};
use clap::{Parser, Subcommand};
use tracing::debug;

#[derive(Parser, Debug)]
#[command(name = "causeway")]
#[command(about = "Causeway rendezvous broker for WebRTC signaling")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check that a running broker answers on its health endpoint
    Check {
        /// Broker base URL (e.g., http://localhost:8080)
        #[arg(short, long, default_value = "http://localhost:8080")]
        url: String,
    },
}

pub async fn run_check(url: String) -> Result<()> {
    let endpoint = format!("{url}/health");
    debug!("Probing {endpoint}");
    let response = reqwest::get(&endpoint)
        .await
        .with_context(|| format!("GET {endpoint}"))?;
    ensure!(
        response.status().is_success(),
        "broker returned {}",
        response.status()
    );
    let body: serde_json::Value = response.json().await.context("non-JSON health body")?;
    println!("{body}");
    Ok(())
}

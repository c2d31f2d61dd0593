use anyhow::Context;
use clap::Parser;
use colored::*;
use gemini_core::UnifiedConfig;
use gemini_orchestrator::McpChatClient;
use std::net::SocketAddr;
use tracing::{info, warn};

mod app;
mod cli;
mod http_server;
mod logging;

use crate::cli::{Args, Command};

#[tokio::main]
async fn main() {
    let code = match run().await {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("{}", format!("Error: {:#}", e).red());
            1
        }
    };
    // A pending stdin read would otherwise keep the runtime alive.
    std::process::exit(code);
}

async fn run() -> anyhow::Result<()> {
    // Pick up GEMINI_API_KEY from a local .env if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => {
            anyhow::ensure!(path.exists(), "Config file {} does not exist", path.display());
            UnifiedConfig::load_from_file(path)?
        }
        None => UnifiedConfig::load_from_default()?,
    };
    config.apply_env(|key| std::env::var(key).ok());
    args.apply_to(&mut config);

    logging::init_logging(&config.log_level)?;

    let serve_addr: Option<SocketAddr> = match &args.command {
        Command::Serve { .. } => Some(
            config
                .http
                .addr
                .parse()
                .with_context(|| format!("Invalid HTTP address '{}'", config.http.addr))?,
        ),
        _ => None,
    };

    let endpoint = args.endpoint();
    let mut client =
        McpChatClient::from_config(&config).context("Failed to initialize the chat client")?;

    // Ctrl-C during startup abandons the connect; disconnect cleans up what it left.
    let connected = tokio::select! {
        result = client.connect(&endpoint) => Some(result),
        _ = tokio::signal::ctrl_c() => None,
    };
    match connected {
        Some(result) => {
            result.with_context(|| format!("Failed to connect to MCP server {}", endpoint))?
        }
        None => {
            warn!("Interrupted while connecting");
            client.disconnect().await;
            return Ok(());
        }
    }
    info!(server = %endpoint, "Connected to MCP server");

    if let Some(addr) = serve_addr {
        // The server disconnects the client itself on shutdown.
        return http_server::run_server(client, addr).await;
    }

    let command = async {
        match &args.command {
            Command::Ask { prompt, .. } => app::run_single_query(&mut client, prompt).await,
            _ => app::run_interactive_chat(&mut client).await,
        }
    };
    let finished = tokio::select! {
        result = command => Some(result),
        _ = tokio::signal::ctrl_c() => None,
    };

    client.disconnect().await;
    finished.unwrap_or_else(|| {
        warn!("Interrupted");
        Ok(())
    })
}

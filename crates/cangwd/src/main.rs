//! cangwd - CAN Gateway Daemon
//!
//! REST API over a CAN device driver: channel discovery, message send,
//! and background monitoring sessions.
//!
//! Usage:
//!   cangwd [OPTIONS] [config.toml]
//!
//! If no config file is provided, uses the mock driver with two virtual
//! channels for demo purposes.

use std::net::SocketAddr;
use std::sync::Arc;

use cangw_api::{create_router, AppState};
use cangw_gateway::{CanGateway, GatewayConfig};
use serde::Deserialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Parsed command-line arguments
struct Args {
    /// Server config file (TOML)
    config_path: Option<String>,
}

fn parse_args() -> Args {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let mut result = Args { config_path: None };

    for arg in &args {
        match arg.as_str() {
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            a if !a.starts_with('-') => {
                // Positional argument = config file
                result.config_path = Some(a.to_string());
            }
            _ => {
                tracing::warn!("Unknown argument: {}", arg);
            }
        }
    }

    result
}

fn print_help() {
    eprintln!(
        r#"cangwd - CAN Gateway Daemon

Usage: cangwd [OPTIONS] [config.toml]

Options:
  -h, --help    Print this help message

Examples:
  # Run with the mock driver on the default port
  cangwd

  # Run with a config file
  cangwd config.toml
"#
    );
}

/// Daemon configuration file layout
#[derive(Debug, Default, Deserialize)]
struct DaemonConfig {
    #[serde(default)]
    server: ServerConfig,
    #[serde(default)]
    gateway: GatewayConfig,
}

#[derive(Debug, Deserialize)]
struct ServerConfig {
    #[serde(default = "default_port")]
    port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
        }
    }
}

fn default_port() -> u16 {
    8000
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cangwd=info,cangw_api=info,cangw_gateway=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting cangwd (CAN Gateway Daemon)");

    let args = parse_args();

    let config = match &args.config_path {
        Some(path) => {
            tracing::info!("Loading config from: {}", path);
            let content = std::fs::read_to_string(path)?;
            toml::from_str(&content)?
        }
        None => {
            tracing::info!("No config file provided, using mock driver");
            DaemonConfig::default()
        }
    };

    let gateway = Arc::new(CanGateway::new(config.gateway));
    let state = AppState::new(gateway.clone());
    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Cancel running sessions and close all channels before exit
    gateway.shutdown().await;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown signal received");
}

//! Strictly Referee - server entry point.

#![warn(missing_docs)]

mod cli;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Command};
use std::path::Path;
use strictly_referee::{ServerConfig, SessionListener};
use tracing::{info, instrument};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve {
            config,
            port,
            host,
            concurrent_matches,
        } => run_server(&config, host, port, concurrent_matches).await,
    }
}

/// Run the referee until interrupted.
async fn run_server(
    config_path: &Path,
    host: Option<String>,
    port: Option<u16>,
    concurrent_matches: bool,
) -> Result<()> {
    initialize_tracing();

    let config = load_config(config_path, host, port, concurrent_matches)?;
    let listener = SessionListener::bind(config).await?;
    info!(addr = %listener.local_addr()?, "Referee ready");

    tokio::select! {
        _ = listener.run() => {}
        signal = tokio::signal::ctrl_c() => {
            signal?;
            info!("Shutting down referee");
        }
    }

    Ok(())
}

#[instrument(skip(config_path), fields(config_path = %config_path.display()))]
fn load_config(
    config_path: &Path,
    host: Option<String>,
    port: Option<u16>,
    concurrent_matches: bool,
) -> Result<ServerConfig> {
    let mut config = if config_path.exists() {
        ServerConfig::from_file(config_path)?
    } else {
        info!("Config file not found, using defaults");
        ServerConfig::default()
    };

    if let Some(host) = host {
        info!(%host, "Overriding host");
        config = config.with_host(host);
    }
    if let Some(port) = port {
        info!(port, "Overriding port");
        config = config.with_port(port);
    }
    if concurrent_matches {
        config = config.with_concurrent_matches(true);
    }

    Ok(config)
}

fn initialize_tracing() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,strictly_referee=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

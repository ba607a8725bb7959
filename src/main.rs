//! Babushka server binary.
//!
//! # Environment Variables
//!
//! - `ANTHROPIC_API_KEY` - required; startup fails without it
//! - `CLERK_JWKS_URL` - JWKS discovery URL; unset disables authentication
//! - `BABUSHKA_CONFIG_PATH` - TOML config file (default: `./babushka.toml`)
//! - `HOST` / `PORT` - bind address (default: `0.0.0.0:8000`)
//! - `RUST_LOG` - tracing filter (default: `info`)

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use babushka::config::Config;
use babushka::credentials::{self, ANTHROPIC_API_KEY_VAR};
use babushka::logging;
use babushka::server::{self, AppState};

/// Relationship advice API server.
#[derive(Debug, Parser)]
#[command(name = "babushka", version, about)]
struct Cli {
    /// Address to bind (overrides config and `HOST`).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind (overrides config and `PORT`).
    #[arg(long)]
    port: Option<u16>,

    /// `.env` file to load before reading configuration (default: `./.env` if present).
    #[arg(long)]
    env_file: Option<PathBuf>,

    /// Also write daily-rotated JSON logs to this directory.
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Before logging, so RUST_LOG from `.env` takes effect.
    match &cli.env_file {
        Some(path) => credentials::load_env_file(path)?,
        None => credentials::load_default_env_file()?,
    }

    let _log_guard = match &cli.log_dir {
        Some(dir) => Some(logging::init_production(dir)?),
        None => {
            logging::init_console();
            None
        }
    };

    info!(
        api_key = if std::env::var_os(ANTHROPIC_API_KEY_VAR).is_some() { "found" } else { "not found" },
        "credentials checked"
    );

    let mut config = Config::load().context("failed to load configuration")?;
    if let Some(host) = cli.host {
        config.host = host;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }

    info!(
        model = %config.model,
        max_tokens = config.max_tokens,
        jwks_url = if config.jwks_url.is_some() { "found" } else { "not found" },
        "configuration loaded"
    );
    if config.jwks_url.is_none() {
        info!("no JWKS URL configured, all requests are anonymous");
    }

    let state = AppState::from_config(&config)?;
    server::run(&config.host, config.port, state).await
}

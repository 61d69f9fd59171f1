//! Commons daemon
//!
//! Hosts the community store over TCP and runs the scheduled sweep that
//! removes activities whose date has passed.

mod cli;

use std::sync::Arc;

use chrono::Utc;
use clap::Parser;
use commons_core::{CommonsConfig, ExpirySweeper, Result, SqliteStore};
use commons_net::StoreServer;
use rand::distributions::Alphanumeric;
use rand::Rng;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::cli::{Args, Command};

const TOKEN_LEN: usize = 32;

fn main() {
    let args = Args::parse();

    let config = match args.resolve_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("commons: {}", e);
            std::process::exit(1);
        }
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "Starting commons");

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            error!(error = %e, "Failed to create tokio runtime");
            std::process::exit(1);
        }
    };

    let result = rt.block_on(async {
        match args.command() {
            Command::Serve => serve(config).await,
            Command::Sweep => sweep(config).await,
        }
    });

    if let Err(e) = result {
        error!(error = %e, "Fatal error");
        std::process::exit(1);
    }
}

fn open_store(config: &CommonsConfig) -> Result<Arc<SqliteStore>> {
    let path = config.database_path()?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    info!(path = %path.display(), "Opening database");
    Ok(Arc::new(SqliteStore::open(&path)?))
}

fn generate_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LEN)
        .map(char::from)
        .collect()
}

/// The configured token, or a fresh one shown once on stderr and kept out of the logs
fn access_token(config: &CommonsConfig) -> String {
    if !config.access_token.is_empty() {
        return config.access_token.clone();
    }
    let token = generate_token();
    warn!("No access token configured, generated one for this run (printed to stderr)");
    eprintln!("commons: access token for this run: {}", token);
    token
}

async fn serve(config: CommonsConfig) -> Result<()> {
    let store = open_store(&config)?;
    let offset = config.schedule_offset()?;

    let token = access_token(&config);

    let server = StoreServer::start(&config.listen, store.clone(), token).await?;
    let sweeper = ExpirySweeper::new(store, offset)
        .spawn(config.sweep_interval(), server.subscribe_shutdown());

    info!(addr = %server.addr(), "Commons ready");

    tokio::signal::ctrl_c().await?;
    info!("Interrupt received");

    server.shutdown();
    if let Err(e) = sweeper.await {
        warn!(error = %e, "Sweeper task ended abnormally");
    }

    info!("Commons stopped");
    Ok(())
}

async fn sweep(config: CommonsConfig) -> Result<()> {
    let store = open_store(&config)?;
    let sweeper = ExpirySweeper::new(store, config.schedule_offset()?);
    let report = sweeper.run_once(Utc::now()).await?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configured_token_is_kept() {
        let config = CommonsConfig {
            access_token: "campus-secret".into(),
            ..CommonsConfig::default()
        };
        assert_eq!(access_token(&config), "campus-secret");
    }

    #[test]
    fn test_generated_token_is_fresh() {
        let config = CommonsConfig::default();
        let first = access_token(&config);
        assert_eq!(first.len(), TOKEN_LEN);
        assert!(first.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(first, access_token(&config));
    }
}

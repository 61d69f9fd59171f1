//! Command-line arguments for the commons daemon
//!
//! Flags override the matching keys from the config file.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use commons_core::{CommonsConfig, Result};

#[derive(Parser, Debug, Clone)]
#[command(name = "commons")]
#[command(about = "Campus community store server and expiry sweeper")]
pub struct Args {
    /// Path to the TOML config file (defaults to the platform config dir)
    #[arg(long, env = "COMMONS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Address the store server listens on
    #[arg(long, env = "COMMONS_LISTEN")]
    pub listen: Option<String>,

    /// SQLite database file
    #[arg(long, env = "COMMONS_DATABASE")]
    pub database: Option<PathBuf>,

    /// Shared access token clients must present
    #[arg(long, env = "COMMONS_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Serve the store and sweep expired activities (default)
    Serve,
    /// Run a single expiry sweep and exit
    Sweep,
}

impl Args {
    pub fn command(&self) -> Command {
        self.command.unwrap_or(Command::Serve)
    }

    /// Load the config file and apply flag overrides
    pub fn resolve_config(&self) -> Result<CommonsConfig> {
        let mut config = match &self.config {
            Some(path) => CommonsConfig::load(path)?,
            None => CommonsConfig::load_default()?,
        };

        if let Some(listen) = &self.listen {
            config.listen = listen.clone();
        }
        if let Some(database) = &self.database {
            config.database_path = Some(database.clone());
        }
        if let Some(token) = &self.token {
            config.access_token = token.clone();
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_to_serve() {
        let args = Args::parse_from(["commons"]);
        assert_eq!(args.command(), Command::Serve);

        let args = Args::parse_from(["commons", "sweep"]);
        assert_eq!(args.command(), Command::Sweep);
    }

    #[test]
    fn test_flags_override_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("commons.toml");
        std::fs::write(&path, "listen = \"0.0.0.0:9000\"\naccess_token = \"from-file\"\n").unwrap();

        let args = Args::parse_from([
            "commons",
            "--config",
            path.to_str().unwrap(),
            "--listen",
            "127.0.0.1:7999",
        ]);
        let config = args.resolve_config().unwrap();

        assert_eq!(config.listen, "127.0.0.1:7999");
        assert_eq!(config.access_token, "from-file");
    }
}

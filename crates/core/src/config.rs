//! Configuration schema and loader
//!
//! Read from `commons.toml` in the platform config directory. Every field has
//! a default, so a missing file or a partial file is valid.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{FixedOffset, Offset, Utc};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

/// Config file name inside the config directory
pub const CONFIG_FILE: &str = "commons.toml";

/// Database file name inside the data directory
pub const DATABASE_FILE: &str = "commons.db";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommonsConfig {
    /// SQLite file. Defaults to the platform data directory.
    pub database_path: Option<PathBuf>,
    /// Address the store server listens on
    pub listen: String,
    /// Shared token clients present in their first frame.
    /// Empty means one is generated at startup.
    pub access_token: String,
    /// Seconds between expiry sweeps
    pub sweep_interval_secs: u64,
    /// Minimum gap between two votes on the same item
    pub vote_debounce_ms: u64,
    /// Display name shown for anonymous authors
    pub anonymous_label: String,
    /// Offset used to interpret activity schedules
    pub schedule_utc_offset_minutes: i32,
    /// Default log filter when `RUST_LOG` is unset
    pub log_level: String,
}

impl Default for CommonsConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            listen: "127.0.0.1:7420".to_string(),
            access_token: String::new(),
            sweep_interval_secs: 600,
            vote_debounce_ms: 300,
            anonymous_label: "Anonymous".to_string(),
            schedule_utc_offset_minutes: 0,
            log_level: "info".to_string(),
        }
    }
}

impl CommonsConfig {
    /// Load from a file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse from TOML content
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from the default location
    pub fn load_default() -> Result<Self> {
        Self::load(&Self::default_path()?)
    }

    /// `<config dir>/commons.toml`
    pub fn default_path() -> Result<PathBuf> {
        Ok(project_dirs()?.config_dir().join(CONFIG_FILE))
    }

    /// Configured database path, or `<data dir>/commons.db`
    pub fn database_path(&self) -> Result<PathBuf> {
        match &self.database_path {
            Some(path) => Ok(path.clone()),
            None => Ok(project_dirs()?.data_dir().join(DATABASE_FILE)),
        }
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn schedule_offset(&self) -> Result<FixedOffset> {
        FixedOffset::east_opt(self.schedule_utc_offset_minutes * 60).ok_or_else(|| {
            Error::Config(format!(
                "schedule_utc_offset_minutes out of range: {}",
                self.schedule_utc_offset_minutes
            ))
        })
    }

    /// Tunables consumed by the engine
    pub fn engine_settings(&self) -> Result<EngineSettings> {
        Ok(EngineSettings {
            vote_debounce: Duration::from_millis(self.vote_debounce_ms),
            anonymous_label: self.anonymous_label.clone(),
            schedule_offset: self.schedule_offset()?,
        })
    }

    fn validate(&self) -> Result<()> {
        if self.sweep_interval_secs == 0 {
            return Err(Error::Config("sweep_interval_secs must be positive".into()));
        }
        if self.anonymous_label.trim().is_empty() {
            return Err(Error::Config("anonymous_label must not be empty".into()));
        }
        self.schedule_offset()?;
        Ok(())
    }
}

/// Engine tunables
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    pub vote_debounce: Duration,
    pub anonymous_label: String,
    pub schedule_offset: FixedOffset,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            vote_debounce: Duration::from_millis(300),
            anonymous_label: "Anonymous".to_string(),
            schedule_offset: Utc.fix(),
        }
    }
}

fn project_dirs() -> Result<ProjectDirs> {
    ProjectDirs::from("edu", "commons", "commons").ok_or_else(|| {
        Error::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "Could not determine config directory",
        ))
    })
}

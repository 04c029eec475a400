//! Data directory, `config.toml` and environment overrides.

use std::path::{Path, PathBuf};
use std::{env, fs};

use anyhow::{Context, Result};
use serde::Deserialize;
use sliver_core::{Clock, FixedClock, SystemClock, parse_local};

pub const CONFIG_FILE: &str = "config.toml";
pub const STATS_DB_FILE: &str = "stats.db";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub tracking: TrackingConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrackingConfig {
    /// Full URL of the backend's track endpoint. Tracking is off when unset.
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

fn default_timeout_ms() -> u64 {
    3000
}

fn default_bind() -> String {
    "127.0.0.1:3001".to_string()
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

impl Config {
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("invalid config.toml")
    }

    /// Read `config.toml` from `data_dir` (defaults if absent), then apply env overrides.
    pub fn load(data_dir: &Path) -> Result<Self> {
        let path = data_dir.join(CONFIG_FILE);
        let mut config = if path.is_file() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            Self::parse(&content)?
        } else {
            Self::default()
        };
        config.apply_overrides(env::var("SLIVER_TRACK_URL").ok());
        Ok(config)
    }

    pub fn apply_overrides(&mut self, track_url: Option<String>) {
        if let Some(url) = track_url.filter(|u| !u.trim().is_empty()) {
            self.tracking.endpoint = Some(url);
        }
    }
}

/// `SLIVER_DATA_DIR`, or `~/.sliver`.
pub fn data_dir() -> PathBuf {
    env::var("SLIVER_DATA_DIR")
        .ok()
        .map(PathBuf::from)
        .unwrap_or_else(sliver_store::default_base_dir)
}

/// The system clock, or a pinned one when `SLIVER_NOW` is set.
pub fn clock_from_env() -> Result<Box<dyn Clock>> {
    match env::var("SLIVER_NOW") {
        Ok(raw) => {
            let now = parse_local(&raw).with_context(|| {
                format!("SLIVER_NOW must be YYYY-MM-DDTHH:MM:SS or YYYY-MM-DD, got '{raw}'")
            })?;
            tracing::debug!("clock pinned to {now}");
            Ok(Box::new(FixedClock::new(now)))
        }
        Err(_) => Ok(Box::new(SystemClock)),
    }
}

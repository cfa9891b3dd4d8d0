// src/config.rs
//! Runtime configuration: TOML file with env-var overrides on top.
//!
//! Resolution order mirrors the rest of the stack:
//! 1. `$THREATDECK_CONFIG_PATH` (explicit file)
//! 2. `config/threatdeck.toml` (conventional location)
//! 3. built-in defaults
//! Individual env vars override whatever the file provided.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

pub const ENV_CONFIG_PATH: &str = "THREATDECK_CONFIG_PATH";
pub const DEFAULT_CONFIG_PATH: &str = "config/threatdeck.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct DashboardConfig {
    /// Base URL of the aggregation backend.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    /// Per-request timeout for backend calls.
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Interval of the periodic saved-briefings refresh.
    #[serde(default = "default_saved_refresh_secs")]
    pub saved_refresh_interval_secs: u64,
    /// Interval of the results poll in the headless runner.
    #[serde(default = "default_results_poll_secs")]
    pub results_poll_interval_secs: u64,
    /// Durable local state file (identity token + saved cache).
    #[serde(default = "default_state_path")]
    pub state_path: String,
}

fn default_api_base_url() -> String {
    "http://127.0.0.1:8000".to_string()
}
fn default_timeout_secs() -> u64 {
    12
}
fn default_saved_refresh_secs() -> u64 {
    60
}
fn default_results_poll_secs() -> u64 {
    120
}
fn default_state_path() -> String {
    "state/threatdeck.json".to_string()
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            request_timeout_secs: default_timeout_secs(),
            saved_refresh_interval_secs: default_saved_refresh_secs(),
            results_poll_interval_secs: default_results_poll_secs(),
            state_path: default_state_path(),
        }
    }
}

impl DashboardConfig {
    /// Load config from the conventional locations, then apply env
    /// overrides. Missing files fall back to defaults; a present-but-broken
    /// file is an error.
    pub fn load() -> Result<Self> {
        let mut cfg = if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            Self::from_file(Path::new(&p))?
        } else {
            let conventional = PathBuf::from(DEFAULT_CONFIG_PATH);
            if conventional.exists() {
                Self::from_file(&conventional)?
            } else {
                Self::default()
            }
        };
        cfg.apply_env_overrides();
        Ok(cfg)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("THREATDECK_API_BASE_URL") {
            if !v.trim().is_empty() {
                self.api_base_url = v;
            }
        }
        if let Some(v) = env_u64("THREATDECK_TIMEOUT_SECS") {
            self.request_timeout_secs = v;
        }
        if let Some(v) = env_u64("THREATDECK_SAVED_REFRESH_SECS") {
            self.saved_refresh_interval_secs = v;
        }
        if let Some(v) = env_u64("THREATDECK_RESULTS_POLL_SECS") {
            self.results_poll_interval_secs = v;
        }
        if let Ok(v) = std::env::var("THREATDECK_STATE_PATH") {
            if !v.trim().is_empty() {
                self.state_path = v;
            }
        }
    }
}

fn env_u64(name: &str) -> Option<u64> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

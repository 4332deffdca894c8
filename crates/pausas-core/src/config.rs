//! Worker configuration.
//!
//! Each stateless UI worker reads the same small TOML file; it tells the
//! worker where the shared state directory lives, how often to sweep, and
//! where to deliver notifications. Scheduler policy (durations, caps,
//! group capacities) is *not* here — that lives in the shared state
//! documents so every worker sees admin edits immediately.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Per-worker settings, loaded from `~/.pausas/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Directory holding the shared state documents and lock files.
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,
    /// Sweep period in seconds. Keep this at or below a third of the
    /// configured confirmation timeout so offer expiry stays timely.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
    /// Janitor period in seconds.
    #[serde(default = "default_janitor_interval")]
    pub janitor_interval_secs: u64,
    /// Webhook URL that receives scheduler events as JSON. When unset,
    /// events are only logged.
    #[serde(default)]
    pub notify_webhook_url: Option<String>,
}

fn default_state_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".pausas")
        .join("state")
}

fn default_sweep_interval() -> u64 {
    20
}

fn default_janitor_interval() -> u64 {
    3600
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            state_dir: default_state_dir(),
            sweep_interval_secs: default_sweep_interval(),
            janitor_interval_secs: default_janitor_interval(),
            notify_webhook_url: None,
        }
    }
}

impl WorkerConfig {
    /// Load from the default path, falling back to defaults when absent.
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save to the given path, creating parent directories as needed.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Default config path (`~/.pausas/config.toml`).
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".pausas")
            .join("config.toml")
    }
}

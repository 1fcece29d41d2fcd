// File: ./src/config.rs
// Handles configuration loading, saving, and defaults.
use crate::context::AppContext;
use crate::storage::LocalStorage;
use anyhow::{Error, Result};
use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};
use std::fs;

fn default_daily_list_name() -> String {
    "Daily".to_string()
}

fn default_api_base_url() -> String {
    "https://tasks.googleapis.com/tasks/v1".to_string()
}

fn default_auth_base_url() -> String {
    "https://oauth2.googleapis.com".to_string()
}

fn default_parallel_requests() -> usize {
    4
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct Config {
    /// Directories whose `*.md` files each map to a task list named after
    /// the file stem.
    #[serde(default)]
    pub directory_paths: Vec<Utf8PathBuf>,

    /// Directory of daily notes; each file maps to a parent task in the
    /// daily list, its checkboxes to subtasks. None disables the daily pass.
    #[serde(default)]
    pub daily_path: Option<Utf8PathBuf>,

    #[serde(default = "default_daily_list_name")]
    pub daily_list_name: String,

    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    #[serde(default = "default_auth_base_url")]
    pub auth_base_url: String,

    /// Concurrent per-file syncs within one directory.
    #[serde(default = "default_parallel_requests")]
    pub parallel_requests: usize,

    #[serde(default)]
    pub log_file: Option<Utf8PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            directory_paths: Vec::new(),
            daily_path: None,
            // Match the serde defaults
            daily_list_name: "Daily".to_string(),
            api_base_url: default_api_base_url(),
            auth_base_url: default_auth_base_url(),
            parallel_requests: 4,
            log_file: None,
        }
    }
}

impl Config {
    /// Load the configuration from disk using an explicit context.
    /// Returns a contextualized error if reading or parsing fails.
    pub fn load(ctx: &dyn AppContext) -> Result<Self> {
        let path = ctx.get_config_file_path()?;

        // Explicitly detect missing file so callers can print setup guidance.
        if !path.exists() {
            return Err(anyhow::anyhow!("Config file not found"));
        }

        let contents = fs::read_to_string(&path).map_err(|e| {
            anyhow::anyhow!("Failed to read config file '{}': {}", path.display(), e)
        })?;

        let config: Config = serde_yaml::from_str(&contents).map_err(|e| {
            anyhow::anyhow!("Failed to parse config file '{}': {}", path.display(), e)
        })?;

        Ok(config)
    }

    /// Helper to detect whether an anyhow::Error indicates that the config
    /// file was missing (as opposed to unreadable or invalid).
    pub fn is_missing_config_error(err: &Error) -> bool {
        if err.to_string().contains("Config file not found") {
            return true;
        }

        // Walk the error chain and look for an underlying IO NotFound, so
        // detection stays robust even when errors are wrapped.
        for cause in err.chain() {
            if let Some(io_err) = cause.downcast_ref::<std::io::Error>()
                && io_err.kind() == std::io::ErrorKind::NotFound
            {
                return true;
            }
        }

        false
    }

    /// Save configuration using an explicit context.
    pub fn save(&self, ctx: &dyn AppContext) -> Result<()> {
        let path = ctx.get_config_file_path()?;
        LocalStorage::with_lock(&path, || {
            let yaml = serde_yaml::to_string(self)?;
            LocalStorage::atomic_write(&path, yaml)?;
            Ok(())
        })?;
        Ok(())
    }

    /// Get the path string using an explicit context.
    pub fn get_path_string(ctx: &dyn AppContext) -> Result<String> {
        let path = ctx.get_config_file_path()?;
        Ok(path.to_string_lossy().to_string())
    }
}

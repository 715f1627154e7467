//! Configuration file management.
//!
//! Settings resolve as: command-line flag, then environment variable (both
//! handled by clap), then the config file, then the built-in default.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use fieldlink_core::{ClientConfig, RetryConfig};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::cli::ConnectionArgs;

/// Configuration file structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// GraphQL HTTP endpoint
    pub api_url: Option<String>,

    /// GraphQL WebSocket endpoint
    pub ws_url: Option<String>,

    pub token_id: Option<String>,

    pub token_value: Option<String>,

    /// SQLite database path
    pub db: Option<PathBuf>,

    /// Per-attempt HTTP timeout in seconds
    pub request_timeout_secs: Option<u64>,

    /// Retries after the first failed attempt
    pub retries: Option<u32>,

    /// Delay before the first retry, doubled for each further one
    pub retry_backoff_ms: Option<u64>,

    /// How long to wait for the subscription handshake
    pub ack_timeout_secs: Option<u64>,
}

impl Config {
    /// Get the config file path
    pub fn path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("fieldlink")
            .join("config.toml")
    }

    /// Load config from the default path, or return default if missing or unreadable.
    pub fn load() -> Self {
        let path = Self::path();
        if !path.exists() {
            return Self::default();
        }
        match Self::load_from(&path) {
            Ok(config) => config,
            Err(e) => {
                warn!("Ignoring config file: {:#}", e);
                Self::default()
            }
        }
    }

    /// Load config from an explicit path. Missing or invalid files are errors.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config: {}", path.display()))
    }

    /// Resolve client settings from flags, this file and defaults.
    pub fn client_config(&self, args: &ConnectionArgs) -> ClientConfig {
        let mut client = ClientConfig::default();

        if let Some(url) = args.api_url.clone().or_else(|| self.api_url.clone()) {
            client.api_url = url;
        }
        if let Some(url) = args.ws_url.clone().or_else(|| self.ws_url.clone()) {
            client.ws_url = url;
        }
        client.token_id = args
            .token_id
            .clone()
            .or_else(|| self.token_id.clone())
            .unwrap_or_default();
        client.token_value = args
            .token_value
            .clone()
            .or_else(|| self.token_value.clone())
            .unwrap_or_default();

        if let Some(secs) = self.request_timeout_secs {
            client.request_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = self.ack_timeout_secs {
            client.ack_timeout = Duration::from_secs(secs);
        }

        let mut retry = RetryConfig::default();
        if let Some(retries) = self.retries {
            retry = retry.max_retries(retries);
        }
        if let Some(ms) = self.retry_backoff_ms {
            retry = retry.initial_delay(Duration::from_millis(ms));
        }
        client.retry = retry;

        client
    }

    /// Resolve the database path: flag, then config, then the platform default.
    pub fn db_path(&self, flag: Option<&Path>) -> PathBuf {
        flag.map(Path::to_path_buf)
            .or_else(|| self.db.clone())
            .unwrap_or_else(fieldlink_store::default_db_path)
    }
}

//! Configuration loader with file and environment variable support

use crate::{AppConfig, ConfigError};
use std::env;
use std::path::PathBuf;
use tracing::info;

/// Standard config file search paths
const CONFIG_PATHS: &[&str] = &[
    "config.toml",
    "application.toml",
    "publisher.toml",
    "./config/config.toml",
    "./config/application.toml",
    "/etc/publisher/config.toml",
];

/// Configuration loader
pub struct ConfigLoader {
    config_path: Option<PathBuf>,
}

impl ConfigLoader {
    /// Create a new configuration loader
    pub fn new() -> Self {
        Self { config_path: None }
    }

    /// Create a loader with a specific config file path
    pub fn with_path<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            config_path: Some(path.into()),
        }
    }

    /// Load configuration from file (if found) with environment variable overrides
    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        let mut config = AppConfig::default();

        if let Some(path) = self.find_config_file() {
            info!(?path, "Loading configuration from file");
            config = AppConfig::from_file(&path)?;
        }

        self.apply_env_overrides(&mut config);

        Ok(config)
    }

    /// Find the configuration file to use
    fn find_config_file(&self) -> Option<PathBuf> {
        if let Some(path) = &self.config_path {
            if path.exists() {
                return Some(path.clone());
            }
        }

        if let Ok(path) = env::var("PUBLISHER_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        for path in CONFIG_PATHS {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        None
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&self, config: &mut AppConfig) {
        // Store
        if let Ok(val) = env::var("PUBLISHER_STORE_URI") {
            config.store.uri = val;
        }
        if let Ok(val) = env::var("PUBLISHER_STORE_BUSY_TIMEOUT_SECONDS") {
            if let Ok(v) = val.parse() {
                config.store.busy_timeout_seconds = v;
            }
        }
        if let Ok(val) = env::var("PUBLISHER_STORE_MAX_CONNECTIONS") {
            if let Ok(v) = val.parse() {
                config.store.max_connections = v;
            }
        }

        // Worker
        if let Ok(val) = env::var("DISABLE_SCHEDULER") {
            config.worker.disabled = val == "1" || val.eq_ignore_ascii_case("true");
        }
        if let Ok(val) = env::var("WORKER_INTERVAL_SECONDS") {
            if let Ok(v) = val.parse() {
                config.worker.interval_seconds = v;
            }
        }
        if let Ok(val) = env::var("PUBLISHER_WORKER_BATCH_SIZE") {
            if let Ok(v) = val.parse() {
                config.worker.batch_size = v;
            }
        }
        if let Ok(val) = env::var("MAX_ATTEMPTS") {
            if let Ok(v) = val.parse() {
                config.worker.max_attempts = v;
            }
        }
        if let Ok(val) = env::var("DEFAULT_RETRY_MINUTES") {
            if let Ok(v) = val.parse() {
                config.worker.default_retry_minutes = v;
            }
        }
        if let Ok(val) = env::var("PROCESSING_TTL_SECONDS") {
            if let Ok(v) = val.parse() {
                config.worker.processing_ttl_seconds = v;
            }
        }

        // Messaging
        if let Ok(val) = env::var("PUBLISHER_MESSAGING_API_BASE") {
            config.messaging.api_base = val;
        }
        if let Ok(val) = env::var("PUBLISHER_MESSAGING_TIMEOUT_SECONDS") {
            if let Ok(v) = val.parse() {
                config.messaging.request_timeout_seconds = v;
            }
        }

        // Channel defaults
        if let Ok(val) = env::var("PUBLISHER_DEFAULT_TIMEZONE") {
            config.channel.default_timezone = val;
        }

        // General
        if let Ok(val) = env::var("PUBLISHER_DEV_MODE") {
            config.dev_mode = val.parse().unwrap_or(false);
        }
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

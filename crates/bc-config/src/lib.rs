//! Publisher Configuration System
//!
//! TOML-based configuration with environment variable override support.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

mod loader;

pub use loader::ConfigLoader;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Root application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub store: StoreConfig,
    pub worker: WorkerConfig,
    pub messaging: MessagingConfig,
    pub channel: ChannelDefaultsConfig,

    /// Enable development mode (more verbose logging, relaxed timeouts)
    pub dev_mode: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            worker: WorkerConfig::default(),
            messaging: MessagingConfig::default(),
            channel: ChannelDefaultsConfig::default(),
            dev_mode: false,
        }
    }
}

/// Durable store configuration (SQLite by convention; see §5.3/§5.4 discipline).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// `sqlx` connection URI, e.g. "sqlite://./data/publisher.db".
    pub uri: String,
    /// Busy-timeout applied to `SqliteConnectOptions`, seconds.
    pub busy_timeout_seconds: u64,
    /// Max connections in the pool.
    pub max_connections: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            uri: "sqlite://./data/publisher.db".to_string(),
            busy_timeout_seconds: 30,
            max_connections: 5,
        }
    }
}

/// Worker loop configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Disable the scheduler worker entirely (DISABLE_SCHEDULER).
    pub disabled: bool,
    /// Seconds between worker iterations.
    pub interval_seconds: u64,
    /// Rows claimed per iteration.
    pub batch_size: i64,
    /// Attempts before a publication is forced to `failed`.
    pub max_attempts: i32,
    /// Minutes added to `ready_at` on retry absent a server-provided delay.
    pub default_retry_minutes: i64,
    /// Age at which a `processing` lease is considered abandoned, seconds.
    pub processing_ttl_seconds: i64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            disabled: false,
            interval_seconds: bc_common::DEFAULT_WORKER_INTERVAL_SECONDS as u64,
            batch_size: bc_common::DEFAULT_BATCH_SIZE,
            max_attempts: bc_common::DEFAULT_MAX_ATTEMPTS,
            default_retry_minutes: bc_common::DEFAULT_RETRY_MINUTES,
            processing_ttl_seconds: bc_common::DEFAULT_PROCESSING_TTL_SECONDS,
        }
    }
}

/// Messaging client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MessagingConfig {
    /// Base URL template, `{token}` and `{method}` are substituted by the client.
    pub api_base: String,
    /// Request timeout, seconds.
    pub request_timeout_seconds: u64,
}

impl Default for MessagingConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.telegram.org".to_string(),
            request_timeout_seconds: 20,
        }
    }
}

/// Defaults applied when a channel doesn't specify its own.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelDefaultsConfig {
    pub default_timezone: String,
}

impl Default for ChannelDefaultsConfig {
    fn default() -> Self {
        Self {
            default_timezone: bc_common::clock::DEFAULT_TIMEZONE.to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration with environment variable override
    pub fn load() -> Result<Self, ConfigError> {
        let loader = ConfigLoader::new();
        loader.load()
    }

    /// Generate an example TOML configuration
    pub fn example_toml() -> String {
        r#"# Publisher configuration
# Environment variables override these settings

[store]
uri = "sqlite://./data/publisher.db"
busy_timeout_seconds = 30
max_connections = 5

[worker]
disabled = false
interval_seconds = 20
batch_size = 20
max_attempts = 5
default_retry_minutes = 30
processing_ttl_seconds = 900

[messaging]
api_base = "https://api.telegram.org"
request_timeout_seconds = 20

[channel]
default_timezone = "Europe/Moscow"

dev_mode = false
"#
        .to_string()
    }
}

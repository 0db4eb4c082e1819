//! Engine configuration
//!
//! `EngineConfig` is assembled through [`EngineConfigBuilder`], or loaded from
//! a TOML file and then overridden by `VOLUNTEER_SYNC_*` environment
//! variables.
//!
//! ```toml
//! api_base_url = "https://api.example.org/api"
//! app_origin = "https://app.example.org"
//! request_timeout_secs = 10
//! synced_retention_hours = 24
//! cache_retention_hours = 168
//! ```

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Default REST API base URL
pub const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:5000/api";

/// Default origin the foreground UI is served from
pub const DEFAULT_APP_ORIGIN: &str = "http://127.0.0.1:3000";

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
const DEFAULT_BACKGROUND_SYNC_INTERVAL: Duration = Duration::from_secs(300);
const DEFAULT_SYNCED_RETENTION: Duration = Duration::from_secs(24 * 60 * 60);
const DEFAULT_CACHE_RETENTION: Duration = Duration::from_secs(7 * 24 * 60 * 60);
const DEFAULT_REMINDER_LOOKAHEAD: Duration = Duration::from_secs(48 * 60 * 60);
const DEFAULT_BROADCAST_CAPACITY: usize = 256;
const DEFAULT_OFFLINE_PAGE: &str = "/offline.html";

/// Environment variable overriding [`EngineConfig::api_base_url`]
pub const ENV_API_URL: &str = "VOLUNTEER_SYNC_API_URL";
/// Environment variable overriding [`EngineConfig::app_origin`]
pub const ENV_APP_ORIGIN: &str = "VOLUNTEER_SYNC_APP_ORIGIN";
/// Environment variable providing the bearer token
pub const ENV_TOKEN: &str = "VOLUNTEER_SYNC_TOKEN";
/// Environment variable overriding [`EngineConfig::database_path`]
pub const ENV_DB_PATH: &str = "VOLUNTEER_SYNC_DB_PATH";

/// Runtime configuration for the sync and notification engine
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Base URL of the REST API (`POST {base}/events/{id}/register`, ...)
    pub api_base_url: String,
    /// Origin of the foreground UI; requests to other origins are never intercepted
    pub app_origin: String,
    /// Bearer token attached to queued operations
    pub auth_token: Option<String>,
    /// SQLite file backing the durable local store
    pub database_path: PathBuf,
    /// Per-request timeout; a timeout counts as a transient failure
    pub request_timeout: Duration,
    /// Period of the background-sync wake-up
    pub background_sync_interval: Duration,
    /// How long `synced` operations are retained before cleanup
    pub synced_retention: Duration,
    /// How long cached responses and entity snapshots are kept
    pub cache_retention: Duration,
    /// Window within which event reminders are scheduled
    pub reminder_lookahead: Duration,
    /// Buffer size of the foreground broadcast channel
    pub broadcast_capacity: usize,
    /// Path of the cached offline shell served for failed navigations
    pub offline_page: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            app_origin: DEFAULT_APP_ORIGIN.to_string(),
            auth_token: None,
            database_path: default_database_path(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            background_sync_interval: DEFAULT_BACKGROUND_SYNC_INTERVAL,
            synced_retention: DEFAULT_SYNCED_RETENTION,
            cache_retention: DEFAULT_CACHE_RETENTION,
            reminder_lookahead: DEFAULT_REMINDER_LOOKAHEAD,
            broadcast_capacity: DEFAULT_BROADCAST_CAPACITY,
            offline_page: DEFAULT_OFFLINE_PAGE.to_string(),
        }
    }
}

impl EngineConfig {
    /// Create a new EngineConfigBuilder
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }

    /// Defaults overridden by environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML file, then apply environment overrides
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let mut config = Self::from_toml_str(&raw)?;
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML document; absent keys keep their defaults
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml::from_str(raw).map_err(|e| ConfigError::Parse(e.to_string()))?;
        let mut builder = Self::builder();
        if let Some(url) = file.api_base_url {
            builder = builder.api_base_url(url);
        }
        if let Some(origin) = file.app_origin {
            builder = builder.app_origin(origin);
        }
        if let Some(token) = file.auth_token {
            builder = builder.auth_token(token);
        }
        if let Some(path) = file.database_path {
            builder = builder.database_path(path);
        }
        if let Some(secs) = file.request_timeout_secs {
            builder = builder.request_timeout(Duration::from_secs(secs));
        }
        if let Some(secs) = file.background_sync_interval_secs {
            builder = builder.background_sync_interval(Duration::from_secs(secs));
        }
        if let Some(hours) = file.synced_retention_hours {
            builder = builder.synced_retention(hours_to_duration(hours, "synced_retention")?);
        }
        if let Some(hours) = file.cache_retention_hours {
            builder = builder.cache_retention(hours_to_duration(hours, "cache_retention")?);
        }
        if let Some(hours) = file.reminder_lookahead_hours {
            builder = builder.reminder_lookahead(hours_to_duration(hours, "reminder_lookahead")?);
        }
        if let Some(capacity) = file.broadcast_capacity {
            builder = builder.broadcast_capacity(capacity);
        }
        if let Some(page) = file.offline_page {
            builder = builder.offline_page(page);
        }
        builder.build()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        for url in [&self.api_base_url, &self.app_origin] {
            let parsed = reqwest::Url::parse(url).map_err(|_| ConfigError::InvalidUrl(url.clone()))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(ConfigError::InvalidUrl(url.clone()));
            }
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::InvalidValue("request_timeout"));
        }
        if self.background_sync_interval.is_zero() {
            return Err(ConfigError::InvalidValue("background_sync_interval"));
        }
        if self.synced_retention.is_zero() {
            return Err(ConfigError::InvalidValue("synced_retention"));
        }
        if self.cache_retention.is_zero() {
            return Err(ConfigError::InvalidValue("cache_retention"));
        }
        if self.reminder_lookahead.is_zero() {
            return Err(ConfigError::InvalidValue("reminder_lookahead"));
        }
        if self.broadcast_capacity == 0 {
            return Err(ConfigError::InvalidValue("broadcast_capacity"));
        }
        Ok(())
    }

    fn apply_env(&mut self) {
        if let Ok(url) = std::env::var(ENV_API_URL) {
            self.api_base_url = url;
        }
        if let Ok(origin) = std::env::var(ENV_APP_ORIGIN) {
            self.app_origin = origin;
        }
        if let Ok(token) = std::env::var(ENV_TOKEN) {
            self.auth_token = Some(token);
        }
        if let Ok(path) = std::env::var(ENV_DB_PATH) {
            self.database_path = PathBuf::from(path);
        }
    }
}

/// Builder for EngineConfig
#[derive(Debug, Default)]
pub struct EngineConfigBuilder {
    config: Option<EngineConfig>,
}

impl EngineConfigBuilder {
    fn config(&mut self) -> &mut EngineConfig {
        self.config.get_or_insert_with(EngineConfig::default)
    }

    /// Set the REST API base URL
    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        self.config().api_base_url = url.into();
        self
    }

    /// Set the foreground UI origin
    pub fn app_origin(mut self, origin: impl Into<String>) -> Self {
        self.config().app_origin = origin.into();
        self
    }

    /// Set the bearer token
    pub fn auth_token(mut self, token: impl Into<String>) -> Self {
        self.config().auth_token = Some(token.into());
        self
    }

    /// Set the SQLite database path
    pub fn database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config().database_path = path.into();
        self
    }

    /// Set the per-request timeout
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config().request_timeout = timeout;
        self
    }

    /// Set the background-sync period
    pub fn background_sync_interval(mut self, interval: Duration) -> Self {
        self.config().background_sync_interval = interval;
        self
    }

    /// Set the retention of synced operations
    pub fn synced_retention(mut self, retention: Duration) -> Self {
        self.config().synced_retention = retention;
        self
    }

    /// Set the retention of cached responses and entities
    pub fn cache_retention(mut self, retention: Duration) -> Self {
        self.config().cache_retention = retention;
        self
    }

    /// Set the reminder lookahead window
    pub fn reminder_lookahead(mut self, lookahead: Duration) -> Self {
        self.config().reminder_lookahead = lookahead;
        self
    }

    /// Set the broadcast channel capacity
    pub fn broadcast_capacity(mut self, capacity: usize) -> Self {
        self.config().broadcast_capacity = capacity;
        self
    }

    /// Set the offline shell path
    pub fn offline_page(mut self, page: impl Into<String>) -> Self {
        self.config().offline_page = page.into();
        self
    }

    /// Build and validate the configuration
    pub fn build(mut self) -> Result<EngineConfig, ConfigError> {
        let config = self.config.take().unwrap_or_default();
        config.validate()?;
        Ok(config)
    }
}

/// On-disk representation; durations are plain integers
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    api_base_url: Option<String>,
    app_origin: Option<String>,
    auth_token: Option<String>,
    database_path: Option<PathBuf>,
    request_timeout_secs: Option<u64>,
    background_sync_interval_secs: Option<u64>,
    synced_retention_hours: Option<u64>,
    cache_retention_hours: Option<u64>,
    reminder_lookahead_hours: Option<u64>,
    broadcast_capacity: Option<usize>,
    offline_page: Option<String>,
}

fn hours_to_duration(hours: u64, field: &'static str) -> Result<Duration, ConfigError> {
    hours
        .checked_mul(3600)
        .map(Duration::from_secs)
        .ok_or(ConfigError::InvalidValue(field))
}

fn default_database_path() -> PathBuf {
    let mut path = dirs::data_dir().unwrap_or_else(std::env::temp_dir);
    path.push("volunteer-sync");
    path.push("local.db");
    path
}

/// Configuration errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    #[error("invalid value for {0}")]
    InvalidValue(&'static str),
    #[error("failed to parse config: {0}")]
    Parse(String),
    #[error("failed to read {path:?}: {message}")]
    Io { path: PathBuf, message: String },
}

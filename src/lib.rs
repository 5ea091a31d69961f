pub mod api;
pub mod error;
pub mod logging;
pub mod notify;
pub mod payload;
pub mod ui;

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use error::{Result, WebhookerError};
use logging::EventSink;
use notify::Notifier;

pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:9000";
pub const DEFAULT_MAX_BODY_BYTES: usize = 2 * 1024 * 1024;
pub const DEFAULT_BARK_BASE_URL: &str = "https://api.day.app";
pub const DEFAULT_BARK_GROUP: &str = "LSP-Warning";
pub const DEFAULT_NOTIFY_TIMEOUT_SECS: u64 = 5;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct WebhookerConfig {
    pub server: ServerConfig,
    pub notify: NotifyConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
    /// Largest request body accepted on `POST /webhook`
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct NotifyConfig {
    pub base_url: String,
    /// Bark device key. Forwarding is disabled while this is unset.
    pub token: Option<String>,
    pub group: String,
    pub timeout_secs: u64,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BARK_BASE_URL.to_string(),
            token: None,
            group: DEFAULT_BARK_GROUP.to_string(),
            timeout_secs: DEFAULT_NOTIFY_TIMEOUT_SECS,
        }
    }
}

impl NotifyConfig {
    /// Returns true if a non-empty token is set.
    pub fn is_enabled(&self) -> bool {
        self.token.as_ref().map(|t| !t.is_empty()).unwrap_or(false)
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// Also write daily rotated log files here when set
    pub directory: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: None,
        }
    }
}

impl WebhookerConfig {
    /// Parse a TOML document. Missing sections and fields take their defaults.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: WebhookerConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `BIND_ADDRESS`, `BARK_TOKEN` and `BARK_BASE_URL` through `lookup`.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(bind_address) = lookup("BIND_ADDRESS") {
            self.server.bind_address = bind_address;
        }
        if let Some(token) = lookup("BARK_TOKEN") {
            self.notify.token = Some(token);
        }
        if let Some(base_url) = lookup("BARK_BASE_URL") {
            self.notify.base_url = base_url;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.server.max_body_bytes == 0 {
            return Err(WebhookerError::ConfigError(
                "server.max_body_bytes must be greater than 0".to_string(),
            ));
        }
        if self.notify.timeout_secs == 0 {
            return Err(WebhookerError::ConfigError(
                "notify.timeout_secs must be greater than 0".to_string(),
            ));
        }
        if !(self.notify.base_url.starts_with("http://")
            || self.notify.base_url.starts_with("https://"))
        {
            return Err(WebhookerError::ConfigError(format!(
                "notify.base_url must be an http(s) URL, got '{}'",
                self.notify.base_url
            )));
        }
        Ok(())
    }
}

/// Load the configuration file at `path`, then apply environment overrides.
/// A missing file is only accepted when `required` is false.
pub fn load_config(path: &Path, required: bool) -> Result<WebhookerConfig> {
    let mut config = match std::fs::read_to_string(path) {
        Ok(content) => WebhookerConfig::from_toml(&content).map_err(|e| {
            WebhookerError::ConfigError(format!(
                "Failed to parse config file '{}': {}",
                path.display(),
                e
            ))
        })?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound && !required => {
            WebhookerConfig::default()
        }
        Err(e) => {
            return Err(WebhookerError::ConfigError(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            )));
        }
    };

    config.apply_env_overrides(|key| std::env::var(key).ok());
    config.validate()?;
    Ok(config)
}

pub struct AppState {
    pub config: WebhookerConfig,
    /// None when no Bark token is configured
    pub notifier: Option<Arc<dyn Notifier>>,
    pub sink: Arc<dyn EventSink>,
}

pub type SharedState = Arc<AppState>;

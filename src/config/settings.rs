//! Sync settings.
//!
//! `config.json` holds the non-secret settings; the API key lives in
//! `credentials.json`. Every value resolves with the same priority:
//! environment variable > file > default. The resolved values are gathered
//! into [`SyncSettings`] and handed to the engine and scheduler.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::credentials::Credentials;
use crate::error::{Error, Result};

/// Package name of the preferred sleep/HRV source (Oura ring).
pub const DEFAULT_PREFERRED_SOURCE: &str = "com.ouraring.oura";
pub const DEFAULT_LOOKBACK_DAYS: u32 = 30;
pub const DEFAULT_SYNC_INTERVAL_MINUTES: u32 = 15;

/// Device secret baked in at build time, if any.
const BUILD_DEVICE_SECRET: Option<&str> = option_env!("HSYNC_DEVICE_SECRET");

/// Keys accepted by `hsync config set`.
pub const CONFIG_KEYS: &[&str] = &[
    "server_url",
    "device_secret",
    "preferred_source",
    "lookback_days",
    "sync_interval_minutes",
    "provider_dir",
    "dispatch_hrv",
];

/// Contents of `config.json`. Every field is optional on disk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthSyncConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_secret: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lookback_days: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_interval_minutes: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_dir: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dispatch_hrv: Option<bool>,
}

impl HealthSyncConfig {
    /// Load from `path`, returning defaults if the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns `Config` if the file exists but cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config file: {e}")))?;

        serde_json::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse config file: {e}")))
    }

    /// Save to `path` atomically, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns `Config` if the file cannot be written.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {e}")))?;

        super::atomic_write(path, content.as_bytes())
            .map_err(|e| Error::Config(format!("Failed to write config file: {e}")))
    }

    /// Set one key from its string form.
    ///
    /// An empty value clears the key.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for unknown keys or unparseable values.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let value = value.trim();
        let text = (!value.is_empty()).then(|| value.to_string());

        match key {
            "server_url" => self.server_url = text.map(|v| v.trim_end_matches('/').to_string()),
            "device_secret" => self.device_secret = text,
            "preferred_source" => self.preferred_source = text,
            "provider_dir" => self.provider_dir = text.map(PathBuf::from),
            "lookback_days" => self.lookback_days = parse_positive(key, text.as_deref())?,
            "sync_interval_minutes" => {
                self.sync_interval_minutes = parse_positive(key, text.as_deref())?;
            }
            "dispatch_hrv" => {
                self.dispatch_hrv = text
                    .as_deref()
                    .map(|v| parse_bool(key, v))
                    .transpose()?;
            }
            _ => {
                return Err(Error::InvalidArgument(format!(
                    "Unknown config key '{key}'. Valid keys: {}",
                    CONFIG_KEYS.join(", ")
                )));
            }
        }
        Ok(())
    }
}

fn parse_positive(key: &str, value: Option<&str>) -> Result<Option<u32>> {
    let Some(value) = value else {
        return Ok(None);
    };
    match value.parse::<u32>() {
        Ok(n) if n > 0 => Ok(Some(n)),
        _ => Err(Error::InvalidArgument(format!(
            "{key} must be a positive integer, got '{value}'"
        ))),
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(Error::InvalidArgument(format!(
            "{key} must be true or false, got '{value}'"
        ))),
    }
}

/// Transport timeouts applied to every outgoing request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpTimeouts {
    pub connect: Duration,
    pub request: Duration,
}

impl Default for HttpTimeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(15),
            request: Duration::from_secs(30),
        }
    }
}

/// Fully resolved settings for one process.
///
/// Credentials stay optional here: read-only commands work without them,
/// and the dispatcher constructor rejects their absence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSettings {
    pub server_url: Option<String>,
    pub device_secret: Option<String>,
    pub api_key: Option<String>,
    pub preferred_source: String,
    pub lookback_days: u32,
    pub sync_interval: Duration,
    pub provider_dir: Option<PathBuf>,
    pub dispatch_hrv: bool,
    pub timeouts: HttpTimeouts,
}

impl SyncSettings {
    /// Resolve from the process environment and the files under the base dir.
    ///
    /// # Errors
    ///
    /// Returns `Config` if either file is unreadable or malformed.
    pub fn resolve() -> Result<Self> {
        let config = HealthSyncConfig::load_from(&super::config_path()?)?;
        let credentials = Credentials::load_from(&super::credentials_path()?)?;
        Ok(Self::resolve_with(
            |name| std::env::var(name).ok(),
            &config,
            &credentials,
        ))
    }

    /// Resolve with an explicit environment lookup.
    ///
    /// Empty environment values are ignored.
    pub fn resolve_with(
        env: impl Fn(&str) -> Option<String>,
        config: &HealthSyncConfig,
        credentials: &Credentials,
    ) -> Self {
        let env = |name: &str| env(name).filter(|v| !v.trim().is_empty());

        let server_url = env("HSYNC_SERVER_URL")
            .or_else(|| config.server_url.clone())
            .map(|url| url.trim_end_matches('/').to_string());

        let device_secret = env("HSYNC_DEVICE_SECRET")
            .or_else(|| config.device_secret.clone())
            .or_else(|| BUILD_DEVICE_SECRET.map(String::from));

        let api_key = env("HSYNC_API_KEY").or_else(|| credentials.api_key.clone());

        let preferred_source = env("HSYNC_PREFERRED_SOURCE")
            .or_else(|| config.preferred_source.clone())
            .unwrap_or_else(|| DEFAULT_PREFERRED_SOURCE.to_string());

        let provider_dir = env("HSYNC_PROVIDER_DIR")
            .map(PathBuf::from)
            .or_else(|| config.provider_dir.clone());

        let interval_minutes = config
            .sync_interval_minutes
            .unwrap_or(DEFAULT_SYNC_INTERVAL_MINUTES);

        Self {
            server_url,
            device_secret,
            api_key,
            preferred_source,
            lookback_days: config.lookback_days.unwrap_or(DEFAULT_LOOKBACK_DAYS),
            sync_interval: Duration::from_secs(u64::from(interval_minutes) * 60),
            provider_dir,
            dispatch_hrv: config.dispatch_hrv.unwrap_or(false),
            timeouts: HttpTimeouts::default(),
        }
    }

    /// # Errors
    ///
    /// Returns `Config` if no server URL is configured.
    pub fn require_server_url(&self) -> Result<&str> {
        self.server_url.as_deref().ok_or_else(|| {
            Error::Config(
                "No server URL configured. Set HSYNC_SERVER_URL or \
                 `hsync config set server_url <url>`"
                    .into(),
            )
        })
    }

    /// # Errors
    ///
    /// Returns `Config` if no API key is stored.
    pub fn require_api_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .ok_or_else(|| Error::Config("No API key configured".into()))
    }

    /// # Errors
    ///
    /// Returns `Config` if no device secret is available from any source.
    pub fn require_device_secret(&self) -> Result<&str> {
        self.device_secret
            .as_deref()
            .ok_or_else(|| Error::Config("No device secret configured".into()))
    }
}

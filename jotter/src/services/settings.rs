//! Settings service
//!
//! Manages application settings persistence using JSON file storage.

use crate::config::{
    DEFAULT_CACHE_FILE_NAME, MAX_REFRESH_INTERVAL_SECS, MAX_RETRY_ATTEMPTS, MAX_RETRY_DELAY_MS,
    MIN_REFRESH_INTERVAL_SECS, SETTINGS_FILE_NAME,
};
use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Hosted backend connection
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemoteSettings {
    /// Project URL, e.g. `https://xyzcompany.supabase.co`
    #[serde(default)]
    pub base_url: String,
    /// Public (anon) api key of the project
    #[serde(default)]
    pub api_key: String,
    /// Session token of the signed-in user
    #[serde(default)]
    pub access_token: Option<String>,
    /// Id of the signed-in user, stamped on optimistic records
    #[serde(default)]
    pub user_id: Option<String>,
}

/// What to do with an optimistic change whose remote call failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Leave it visible until the next successful reconciliation
    #[default]
    KeepLocal,
    /// Undo it in memory and in the cache
    Rollback,
}

/// Remote call retry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    /// Attempts per remote call, first try included
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Base delay between attempts; grows linearly with the attempt number
    #[serde(default = "default_retry_delay_ms")]
    pub delay_ms: u64,
}

fn default_max_attempts() -> u32 {
    1
}

fn default_retry_delay_ms() -> u64 {
    500
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            delay_ms: default_retry_delay_ms(),
        }
    }
}

/// Sync behaviour
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncSettings {
    #[serde(default)]
    pub retry: RetrySettings,
    #[serde(default)]
    pub on_failure: FailurePolicy,
    /// Background refresh period in seconds, 0 disables it
    #[serde(default)]
    pub refresh_interval_secs: u64,
}

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSettings {
    #[serde(default)]
    pub remote: RemoteSettings,
    #[serde(default)]
    pub sync: SyncSettings,
    /// Cache database file, relative to the data directory unless absolute
    #[serde(default = "default_cache_file")]
    pub cache_file: String,
}

fn default_cache_file() -> String {
    DEFAULT_CACHE_FILE_NAME.to_string()
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            remote: RemoteSettings::default(),
            sync: SyncSettings::default(),
            cache_file: default_cache_file(),
        }
    }
}

impl AppSettings {
    /// Check values against the limits in `config`
    pub fn validate(&self) -> Result<()> {
        let retry = &self.sync.retry;
        if retry.max_attempts == 0 || retry.max_attempts > MAX_RETRY_ATTEMPTS {
            return Err(AppError::Settings(format!(
                "retry.max_attempts must be between 1 and {}",
                MAX_RETRY_ATTEMPTS
            )));
        }
        if retry.delay_ms > MAX_RETRY_DELAY_MS {
            return Err(AppError::Settings(format!(
                "retry.delay_ms must be at most {}",
                MAX_RETRY_DELAY_MS
            )));
        }

        let interval = self.sync.refresh_interval_secs;
        if interval != 0
            && !(MIN_REFRESH_INTERVAL_SECS..=MAX_REFRESH_INTERVAL_SECS).contains(&interval)
        {
            return Err(AppError::Settings(format!(
                "refresh_interval_secs must be 0 or between {} and {}",
                MIN_REFRESH_INTERVAL_SECS, MAX_REFRESH_INTERVAL_SECS
            )));
        }

        if self.cache_file.trim().is_empty() {
            return Err(AppError::Settings("cache_file must not be empty".to_string()));
        }

        Ok(())
    }

    /// Overlay values from `JOTTER_*` environment variables
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Overlay values from an arbitrary variable lookup
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("JOTTER_REMOTE_URL") {
            self.remote.base_url = url;
        }
        if let Some(key) = lookup("JOTTER_API_KEY") {
            self.remote.api_key = key;
        }
        if let Some(token) = lookup("JOTTER_ACCESS_TOKEN") {
            self.remote.access_token = Some(token);
        }
        if let Some(user) = lookup("JOTTER_USER_ID") {
            self.remote.user_id = Some(user);
        }
        self
    }

    /// Absolute location of the cache database
    pub fn cache_path(&self, data_dir: &Path) -> PathBuf {
        let path = Path::new(&self.cache_file);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            data_dir.join(path)
        }
    }
}

/// Service for managing application settings
#[derive(Clone)]
pub struct SettingsService {
    settings_path: PathBuf,
}

impl SettingsService {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            settings_path: data_dir.join(SETTINGS_FILE_NAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.settings_path
    }

    /// Load settings from disk or create default if not exists
    pub async fn load(&self) -> Result<AppSettings> {
        if !self.settings_path.exists() {
            tracing::info!("Settings file not found, creating default settings");
            let default = AppSettings::default();
            self.save(&default).await?;
            return Ok(default);
        }

        let content = fs::read_to_string(&self.settings_path).await?;
        let settings: AppSettings = serde_json::from_str(&content)
            .map_err(|e| AppError::Settings(format!("Failed to parse settings: {}", e)))?;

        Ok(settings)
    }

    /// Save settings to disk
    pub async fn save(&self, settings: &AppSettings) -> Result<()> {
        let content = serde_json::to_string_pretty(settings)?;

        if let Some(parent) = self.settings_path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&self.settings_path, content).await?;
        tracing::info!("Settings saved to {:?}", self.settings_path);

        Ok(())
    }

    /// Update sync behaviour, rejecting out-of-range values
    pub async fn update_sync(&self, sync: SyncSettings) -> Result<()> {
        let mut settings = self.load().await?;
        settings.sync = sync;
        settings.validate()?;
        self.save(&settings).await
    }
}

//! Application state and initialization
//!
//! Wires settings, the cache database, the backend and the home data
//! service together. Everything a front end needs lives in [`AppState`].

use crate::config::LOCAL_USER_PLACEHOLDER;
use crate::database::{create_pool, Repository};
use crate::error::Result;
use crate::remote::{RemoteBackend, RestBackend};
use crate::services::{AppSettings, HomeData, RemoteService, SettingsService, SyncPolicy};
use crate::storage::CacheStore;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Central application state holding all services
#[derive(Clone)]
pub struct AppState {
    pub data_dir: PathBuf,
    pub settings: AppSettings,
    pub settings_service: SettingsService,
    pub cache: CacheStore,
    pub home: Arc<HomeData>,
}

/// Application setup against the configured hosted backend
pub async fn setup(data_dir: &Path) -> Result<AppState> {
    let settings = load_settings(data_dir).await?;

    if settings.remote.base_url.is_empty() {
        tracing::warn!("No remote URL configured, running from cache only");
    }

    let backend = Arc::new(RestBackend::new(&settings.remote)?);
    build(data_dir, settings, backend).await
}

/// Application setup against a caller-supplied backend
pub async fn setup_with_backend(
    data_dir: &Path,
    backend: Arc<dyn RemoteBackend>,
) -> Result<AppState> {
    let settings = load_settings(data_dir).await?;
    build(data_dir, settings, backend).await
}

async fn load_settings(data_dir: &Path) -> Result<AppSettings> {
    tracing::info!("Initializing application");
    tracing::info!("App data directory: {:?}", data_dir);

    // Create necessary directories
    tokio::fs::create_dir_all(data_dir).await?;

    let settings = SettingsService::new(data_dir)
        .load()
        .await?
        .with_env_overrides();
    settings.validate()?;

    Ok(settings)
}

async fn build(
    data_dir: &Path,
    settings: AppSettings,
    backend: Arc<dyn RemoteBackend>,
) -> Result<AppState> {
    let pool = create_pool(&settings.cache_path(data_dir)).await?;
    let cache = CacheStore::new(Repository::new(pool));

    let user_id = settings
        .remote
        .user_id
        .clone()
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| LOCAL_USER_PLACEHOLDER.to_string());

    let home = HomeData::new(
        cache.clone(),
        RemoteService::new(backend),
        SyncPolicy::from(&settings.sync),
        user_id,
    );

    tracing::info!("Application initialized successfully");

    Ok(AppState {
        data_dir: data_dir.to_path_buf(),
        settings_service: SettingsService::new(data_dir),
        settings,
        cache,
        home: Arc::new(home),
    })
}

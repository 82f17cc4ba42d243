use std::path::{Path, PathBuf};

use thiserror::Error;

mod schema;

pub use schema::{
    Config, DEFAULT_DATABASE_URL, DEFAULT_PORT, S3Config, StorageBackendKind, StorageConfig,
    WorkerConfig,
};

pub const CONFIG_PATH_ENV: &str = "TASKER_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "tasker.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Config file location: `TASKER_CONFIG` when set, else `./tasker.json`.
pub fn config_path() -> PathBuf {
    std::env::var(CONFIG_PATH_ENV)
        .ok()
        .filter(|path| !path.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
}

/// Will always return config, falling back to defaults on missing/invalid files.
pub async fn load_config_from_file(config_path: &Path) -> Config {
    match tokio::fs::read_to_string(config_path).await {
        Ok(raw_config) => Config::from_raw(&raw_config),
        Err(err) => {
            if err.kind() == std::io::ErrorKind::NotFound {
                tracing::info!(path = %config_path.display(), "No config file found, using defaults");
            } else {
                tracing::warn!("Failed to read config file: {}", err);
            }
            Config::default()
        }
    }
}

/// Loads the config file and applies process environment overrides.
pub async fn load_config() -> Config {
    load_config_from_file(&config_path())
        .await
        .with_env_overrides(|key| std::env::var(key).ok())
}

/// Saves the normalized config to the given path.
pub async fn save_config_to_file(config: &Config, config_path: &Path) -> Result<(), ConfigError> {
    let normalized = config.clone().normalized();
    let raw_config = serde_json::to_string_pretty(&normalized)?;
    tokio::fs::write(config_path, raw_config).await?;
    Ok(())
}

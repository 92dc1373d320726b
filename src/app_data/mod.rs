//! Persistent configuration of the bridge.
//!
//! The JSON file is loaded once at startup and again on every `reload`.
//! The supervisor reads the bindings through `BindingSource`, so a reload
//! takes effect on the next button press.

mod schemas;

use std::{
    path::{Path, PathBuf},
    sync::{Arc, Mutex, MutexGuard},
};

use anyhow::{anyhow, Context};
use directories::ProjectDirs;
use log::{info, warn};

pub use schemas::AppConfig;

use crate::actions::{ActionBindings, BindingSource};
use crate::error::Result;

pub const CONFIG_FILE_NAME: &str = "remote_config.json";

type SharedConfig = Arc<Mutex<AppConfig>>;

/// Default location of the config file in the user's config directory.
pub fn default_config_path() -> Result<PathBuf> {
    let proj_dirs = ProjectDirs::from("com", "remote-switch", "remote-switch-bridge")
        .ok_or_else(|| anyhow!("No home directory to keep the config in"))?;

    Ok(proj_dirs.config_dir().join(CONFIG_FILE_NAME))
}

async fn read_config(path: &Path) -> Result<AppConfig> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;

    serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

async fn write_config(path: &Path, config: &AppConfig) -> Result<()> {
    if let Some(dir) = path.parent() {
        tokio::fs::create_dir_all(dir).await?;
    }

    let raw = serde_json::to_string_pretty(config)?;
    tokio::fs::write(path, raw)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))
}

#[derive(Clone)]
pub struct ConfigStore {
    config: SharedConfig,
    config_file_path: PathBuf,
}

impl ConfigStore {
    /// Loads the file at `config_file_path`, creating it with the defaults
    /// when it does not exist. An unreadable file leaves the defaults in
    /// effect and is not overwritten.
    pub async fn open(config_file_path: impl Into<PathBuf>) -> Result<Self> {
        let config_file_path = config_file_path.into();

        let config = if config_file_path.exists() {
            match read_config(&config_file_path).await {
                Ok(config) => config,
                Err(e) => {
                    warn!("Using default config: {:?}", e);
                    AppConfig::default()
                }
            }
        } else {
            info!("Creating {}", config_file_path.display());
            let config = AppConfig::default();
            write_config(&config_file_path, &config).await?;
            config
        };

        Ok(Self { config: Arc::new(Mutex::new(config)), config_file_path })
    }

    pub fn path(&self) -> &Path {
        &self.config_file_path
    }

    fn shared(&self) -> MutexGuard<'_, AppConfig> {
        self.config.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn config(&self) -> AppConfig {
        self.shared().clone()
    }

    /// Re-reads the file. On failure the previous settings stay in effect.
    pub async fn reload(&self) -> Result<()> {
        let config = read_config(&self.config_file_path).await?;
        info!(
            "Config reloaded: button 1 = {:?}, button 2 = {:?}",
            config.btn1_action, config.btn2_action
        );
        *self.shared() = config;

        Ok(())
    }
}

impl BindingSource for ConfigStore {
    fn snapshot(&self) -> ActionBindings {
        self.shared().bindings()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::resolve;
    use std::time::Duration;

    fn init_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    #[tokio::test]
    async fn test_missing_file_is_created_with_defaults() {
        init_logger();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE_NAME);

        let store = ConfigStore::open(&path).await.unwrap();

        assert!(path.exists());
        assert_eq!(store.config(), AppConfig::default());
        let bindings = store.snapshot();
        assert_eq!(resolve(1, &bindings), Some("pagedown"));
        assert_eq!(resolve(2, &bindings), Some("pageup"));
    }

    #[tokio::test]
    async fn test_partial_file_falls_back_per_key() {
        init_logger();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, r#"{"btn2_action": "volume up", "scan_timeout_secs": 9}"#)
            .unwrap();

        let store = ConfigStore::open(&path).await.unwrap();
        let config = store.config();

        assert_eq!(config.btn1_action, "pagedown");
        assert_eq!(config.btn2_action, "volume up");
        assert_eq!(config.scan_timeout(), Some(Duration::from_secs(9)));
        assert_eq!(config.device_name, None);
    }

    #[tokio::test]
    async fn test_corrupt_file_is_kept_and_defaults_used() {
        init_logger();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "{not json").unwrap();

        let store = ConfigStore::open(&path).await.unwrap();

        assert_eq!(store.config(), AppConfig::default());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{not json");
    }

    #[tokio::test]
    async fn test_reload_changes_bindings() {
        init_logger();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        let store = ConfigStore::open(&path).await.unwrap();

        std::fs::write(&path, r#"{"btn1_action": "ctrl+c", "btn2_action": ""}"#).unwrap();
        store.reload().await.unwrap();

        let bindings = store.snapshot();
        assert_eq!(resolve(1, &bindings), Some("ctrl+c"));
        assert_eq!(resolve(2, &bindings), None);
    }

    #[tokio::test]
    async fn test_failed_reload_keeps_previous_config() {
        init_logger();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        let store = ConfigStore::open(&path).await.unwrap();

        std::fs::write(&path, "[]").unwrap();
        assert!(store.reload().await.is_err());
        assert_eq!(store.config(), AppConfig::default());
    }

    #[tokio::test]
    async fn test_unknown_keys_are_kept_and_file_untouched() {
        init_logger();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        let raw = r#"{"api_key": "secret", "btn1_action": "space", "btn2_action": "pageup"}"#;
        std::fs::write(&path, raw).unwrap();

        let store = ConfigStore::open(&path).await.unwrap();
        let config = store.config();

        assert_eq!(config.btn1_action, "space");
        assert_eq!(config.extra.get("api_key"), Some(&serde_json::json!("secret")));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), raw);

        let written = serde_json::to_value(&config).unwrap();
        assert_eq!(written["api_key"], "secret");
        assert!(written.get("device_name").is_none());
    }
}

use std::fs;
use std::path::PathBuf;

use tracing::{debug, info};

use crate::domain::{AppConfig, DomainError};
use crate::ports::ConfigStore;

/// TOML-based configuration store with OS-specific paths.
pub struct TomlConfigStore {
    data_dir: PathBuf,
    logs_dir: PathBuf,
}

impl TomlConfigStore {
    /// Create a new TomlConfigStore.
    /// Uses OS-specific application data directories.
    pub fn new() -> Result<Self, DomainError> {
        let data_dir = Self::get_data_dir()?;
        let logs_dir = Self::get_logs_dir(&data_dir);
        Self::at(data_dir, logs_dir)
    }

    /// Keep config, database and logs under one explicit directory.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Result<Self, DomainError> {
        let data_dir = data_dir.into();
        let logs_dir = data_dir.join("logs");
        Self::at(data_dir, logs_dir)
    }

    fn at(data_dir: PathBuf, logs_dir: PathBuf) -> Result<Self, DomainError> {
        fs::create_dir_all(&data_dir)?;

        info!(data_dir = ?data_dir, "ConfigStore initialized");

        Ok(Self { data_dir, logs_dir })
    }

    /// Get the OS-specific application data directory.
    /// - macOS: ~/Library/Application Support/Scribed/
    /// - Windows: %APPDATA%\Scribed\
    /// - Linux: ~/.config/Scribed/
    fn get_data_dir() -> Result<PathBuf, DomainError> {
        #[cfg(target_os = "macos")]
        let base = dirs::data_dir();

        #[cfg(not(target_os = "macos"))]
        let base = dirs::config_dir();

        base.map(|p| p.join("Scribed"))
            .ok_or_else(|| DomainError::Config("Could not find application data directory".to_string()))
    }

    /// Get the OS-specific log directory.
    /// - macOS: ~/Library/Application Support/Scribed/logs/
    /// - Windows: %LOCALAPPDATA%\Scribed\logs\
    /// - Linux: ~/.local/share/Scribed/logs/
    fn get_logs_dir(data_dir: &std::path::Path) -> PathBuf {
        #[cfg(target_os = "windows")]
        let base = dirs::data_local_dir();

        #[cfg(target_os = "linux")]
        let base = dirs::data_dir();

        #[cfg(not(any(target_os = "windows", target_os = "linux")))]
        let base: Option<PathBuf> = None;

        base.map(|p| p.join("Scribed").join("logs"))
            .unwrap_or_else(|| data_dir.join("logs"))
    }
}

impl ConfigStore for TomlConfigStore {
    fn load(&self) -> Result<AppConfig, DomainError> {
        let config_path = self.config_path();

        if config_path.exists() {
            debug!(path = ?config_path, "Loading configuration");
            let content = fs::read_to_string(&config_path)?;
            let config: AppConfig = toml::from_str(&content)?;
            info!(path = ?config_path, "Configuration loaded");
            Ok(config)
        } else {
            info!(path = ?config_path, "Configuration file not found, creating default");
            let config = AppConfig::new();
            self.save(&config)?;
            Ok(config)
        }
    }

    fn save(&self, config: &AppConfig) -> Result<(), DomainError> {
        let config_path = self.config_path();

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(config)?;
        fs::write(&config_path, content)?;

        info!(path = ?config_path, "Configuration saved");
        Ok(())
    }

    fn config_path(&self) -> PathBuf {
        self.data_dir.join("config.toml")
    }

    fn data_dir(&self) -> PathBuf {
        self.data_dir.clone()
    }

    fn logs_dir(&self) -> PathBuf {
        self.logs_dir.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_explicit_data_dir_layout() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = TomlConfigStore::with_data_dir(temp_dir.path()).unwrap();

        assert_eq!(store.config_path(), temp_dir.path().join("config.toml"));
        assert_eq!(store.logs_dir(), temp_dir.path().join("logs"));
        assert_eq!(
            store.resolve_data_path(Path::new("jobs.db")),
            temp_dir.path().join("jobs.db")
        );
        assert_eq!(
            store.resolve_data_path(Path::new("/var/lib/jobs.db")),
            PathBuf::from("/var/lib/jobs.db")
        );
    }

    #[test]
    fn test_load_creates_default_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = TomlConfigStore::with_data_dir(temp_dir.path().join("nested")).unwrap();

        let config = store.load().unwrap();
        assert_eq!(config.pool.capacity, 2);
        assert!(store.config_path().exists());
    }

    #[test]
    fn test_config_roundtrip() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = TomlConfigStore::with_data_dir(temp_dir.path()).unwrap();

        let mut config = AppConfig::new();
        config.pool.capacity = 3;
        config.transcriber.model = "small".to_string();
        config
            .transcriber
            .env
            .insert("OMP_NUM_THREADS".to_string(), "4".to_string());
        config.logging.level = "debug".to_string();

        store.save(&config).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.pool.capacity, 3);
        assert_eq!(loaded.transcriber.model, "small");
        assert_eq!(loaded.transcriber.env.get("OMP_NUM_THREADS").map(String::as_str), Some("4"));
        assert_eq!(loaded.logging.level, "debug");
    }
}

use std::path::{Path, PathBuf};

use crate::domain::{AppConfig, DomainError};

/// Port for locating and persisting scribed's configuration and data files.
pub trait ConfigStore: Send + Sync {
    /// Load configuration, writing the defaults first if no file exists.
    fn load(&self) -> Result<AppConfig, DomainError>;

    fn save(&self, config: &AppConfig) -> Result<(), DomainError>;

    fn config_path(&self) -> PathBuf;

    /// Directory holding the database and other persistent state.
    fn data_dir(&self) -> PathBuf;

    fn logs_dir(&self) -> PathBuf;

    /// Resolve a configured path: absolute paths are kept, relative ones
    /// are placed under the data directory.
    fn resolve_data_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.data_dir().join(path)
        }
    }
}

//! Application settings.
//!
//! Settings live in a JSON file outside the vault. The session only reads
//! `max_backup_count`; the replication fields are consumed by the sync
//! engine and the CLI.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use passvault_common::{Error, Result};

/// Backups kept when settings cannot be read.
pub const DEFAULT_MAX_BACKUP_COUNT: usize = 10;

/// Settings file name inside the config directory.
pub const SETTINGS_FILENAME: &str = "settings.json";

/// Replication target and schedule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplicationSettings {
    /// Provider name (e.g., "dropbox", "local").
    pub provider: Option<String>,
    /// Account label shown to the user.
    pub account: Option<String>,
    /// Directory holding one mirror folder per provider.
    pub mirror_root: Option<PathBuf>,
    /// Minutes between scheduled syncs; `None` means manual only.
    pub interval_minutes: Option<u64>,
    /// Replicate after every save.
    pub sync_on_save: bool,
}

/// User settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Backups kept per vault; zero disables backups.
    pub max_backup_count: usize,
    /// Idle minutes before an external collaborator should lock the vault.
    pub auto_lock_minutes: Option<u32>,
    /// Seconds before a copied password is cleared.
    pub clipboard_clear_seconds: Option<u32>,
    pub replication: ReplicationSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_backup_count: DEFAULT_MAX_BACKUP_COUNT,
            auto_lock_minutes: Some(5),
            clipboard_clear_seconds: Some(30),
            replication: ReplicationSettings::default(),
        }
    }
}

/// Source of settings, loaded and saved as a whole.
pub trait SettingsStore: Send + Sync {
    fn load(&self) -> Result<Settings>;
    fn save(&self, settings: &Settings) -> Result<()>;
}

/// Settings persisted as a JSON file.
#[derive(Debug, Clone)]
pub struct JsonSettingsStore {
    path: PathBuf,
}

impl JsonSettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `{config_dir}/passvault/settings.json`, if the platform has a config dir.
    pub fn default_location() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("passvault").join(SETTINGS_FILENAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SettingsStore for JsonSettingsStore {
    /// A missing file yields the defaults.
    fn load(&self) -> Result<Settings> {
        match std::fs::read(&self.path) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Settings::default()),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, settings: &Settings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_vec_pretty(settings)?;
        let temp = self.path.with_extension("json.tmp");
        std::fs::write(&temp, json)?;
        std::fs::rename(&temp, &self.path)?;
        Ok(())
    }
}

/// In-memory settings.
#[derive(Debug, Default)]
pub struct StaticSettings {
    settings: RwLock<Settings>,
}

impl StaticSettings {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings: RwLock::new(settings),
        }
    }
}

impl SettingsStore for StaticSettings {
    fn load(&self) -> Result<Settings> {
        self.settings
            .read()
            .map(|s| s.clone())
            .map_err(|_| Error::Storage("Settings lock poisoned".to_string()))
    }

    fn save(&self, settings: &Settings) -> Result<()> {
        let mut current = self
            .settings
            .write()
            .map_err(|_| Error::Storage("Settings lock poisoned".to_string()))?;
        *current = settings.clone();
        Ok(())
    }
}

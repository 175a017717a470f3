//! Persistent key/value settings and the Cloudinary credentials kept in them.

use crate::config::app_dir;
use crate::error::Result;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};

pub const CLOUD_NAME_KEY: &str = "cloud-name";
pub const UPLOAD_PRESET_KEY: &str = "upload-preset";
const STORAGE_FILE: &str = "storage.toml";

pub trait SettingsStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// Flat TOML table of strings, rewritten on every `set`.
pub struct FileSettingsStore {
    path: PathBuf,
    values: Mutex<BTreeMap<String, String>>,
}

impl FileSettingsStore {
    /// Opens the store in the user's config directory, falling back to the
    /// working directory when there is none.
    pub fn open_default() -> Self {
        let path = app_dir()
            .map(|dir| dir.join(STORAGE_FILE))
            .unwrap_or_else(|| PathBuf::from(STORAGE_FILE));
        Self::open(path)
    }

    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let values = read_table(&path).unwrap_or_else(|e| {
            warn!(path = %path.display(), "Starting with empty settings: {}", e);
            BTreeMap::new()
        });
        Self {
            path,
            values: Mutex::new(values),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn read_table(path: &Path) -> Result<BTreeMap<String, String>> {
    if !path.exists() {
        return Ok(BTreeMap::new());
    }
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

impl SettingsStore for FileSettingsStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        values.insert(key.to_string(), value.to_string());
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, toml::to_string(&*values)?)?;
        debug!(key, path = %self.path.display(), "Setting saved");
        Ok(())
    }
}

#[derive(Default)]
pub struct MemorySettingsStore {
    values: Mutex<BTreeMap<String, String>>,
}

impl SettingsStore for MemorySettingsStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.values
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CloudCredentials {
    pub cloud_name: String,
    pub upload_preset: String,
}

impl CloudCredentials {
    pub fn new(cloud_name: &str, upload_preset: &str) -> Self {
        Self {
            cloud_name: cloud_name.trim().to_string(),
            upload_preset: upload_preset.trim().to_string(),
        }
    }

    pub fn load(store: &dyn SettingsStore) -> Self {
        Self::new(
            &store.get(CLOUD_NAME_KEY).unwrap_or_default(),
            &store.get(UPLOAD_PRESET_KEY).unwrap_or_default(),
        )
    }

    pub fn is_complete(&self) -> bool {
        !self.cloud_name.trim().is_empty() && !self.upload_preset.trim().is_empty()
    }

    /// Stores trimmed values. Returns `Ok(false)` without writing anything
    /// when either value is blank.
    pub fn save(&self, store: &dyn SettingsStore) -> Result<bool> {
        let trimmed = Self::new(&self.cloud_name, &self.upload_preset);
        if !trimmed.is_complete() {
            return Ok(false);
        }
        store.set(CLOUD_NAME_KEY, &trimmed.cloud_name)?;
        store.set(UPLOAD_PRESET_KEY, &trimmed.upload_preset)?;
        Ok(true)
    }
}

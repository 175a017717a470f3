//! Application configuration, read from `config.toml` in the user's config
//! directory. A missing or unreadable file yields the defaults.

use crate::error::Result;
use crate::layout::DEFAULT_DISPLAY_LIMIT;
use crate::upload::{Restrictions, DEFAULT_ALLOWED_EXTENSIONS, DEFAULT_MAX_FILE_SIZE};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const APP_DIR: &str = "image-uploader";
const CONFIG_FILE: &str = "config.toml";
pub const DEFAULT_LOCAL_ENDPOINT: &str = "http://localhost:3000/api/upload";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadMode {
    Local,
    #[default]
    Cloudinary,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub mode: UploadMode,
    pub local_endpoint: String,
    pub max_file_size: u64,
    pub allowed_extensions: Vec<String>,
    pub page_size: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            mode: UploadMode::default(),
            local_endpoint: DEFAULT_LOCAL_ENDPOINT.to_string(),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            allowed_extensions: DEFAULT_ALLOWED_EXTENSIONS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            page_size: DEFAULT_DISPLAY_LIMIT,
        }
    }
}

impl AppConfig {
    pub fn restrictions(&self) -> Restrictions {
        Restrictions {
            max_file_size: Some(self.max_file_size),
            allowed_extensions: self
                .allowed_extensions
                .iter()
                .map(|ext| normalize_extension(ext))
                .collect(),
        }
    }
}

fn normalize_extension(ext: &str) -> String {
    let ext = ext.trim().to_lowercase();
    if ext.starts_with('.') {
        ext
    } else {
        format!(".{ext}")
    }
}

pub fn app_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|mut path| {
        path.push(APP_DIR);
        path
    })
}

fn default_config_path() -> Option<PathBuf> {
    app_dir().map(|dir| dir.join(CONFIG_FILE))
}

/// Reads the user's config, writing the defaults out on first run so there
/// is a file to edit.
pub fn load() -> Result<AppConfig> {
    let Some(path) = default_config_path() else {
        return Ok(AppConfig::default());
    };
    if path.exists() {
        return load_from_path(&path);
    }
    let config = AppConfig::default();
    match save_to_path(&config, &path) {
        Ok(()) => info!(path = %path.display(), "Wrote default config"),
        Err(e) => warn!(path = %path.display(), "Failed to write default config: {}", e),
    }
    Ok(config)
}

pub fn load_from_path(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)?;
    match toml::from_str::<AppConfig>(&content) {
        Ok(mut config) => {
            if config.page_size == 0 {
                warn!(path = %path.display(), "page_size must be at least 1");
                config.page_size = 1;
            }
            Ok(config)
        }
        Err(e) => {
            warn!(path = %path.display(), "Ignoring invalid config: {}", e);
            Ok(AppConfig::default())
        }
    }
}

pub fn save_to_path(config: &AppConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let content = toml::to_string_pretty(config)?;
    fs::write(path, content)?;
    Ok(())
}

use anyhow::{anyhow, Context, Result};
use directories::ProjectDirs;
use log::warn;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

static SETTINGS_FILE_NAME: &str = "settings.json";

pub struct ProjectConfig {
    pub settings: Settings,
    pub config_dir: PathBuf,
    pub data_dir: PathBuf,
}

impl ProjectConfig {
    /// Load settings from the platform config directory, creating the
    /// config, cache and data directories on first use.
    pub fn new() -> Result<Self> {
        let proj_dirs = ProjectDirs::from("com", "drive-projection", "drive-projection")
            .ok_or_else(|| anyhow!("Failed to get project directories"))?;
        for dir in [proj_dirs.config_dir(), proj_dirs.cache_dir(), proj_dirs.data_dir()] {
            if !dir.exists() {
                fs::create_dir_all(dir)
                    .with_context(|| format!("Failed to create directory {}", dir.display()))?;
            }
        }

        let settings = Settings::new(&proj_dirs.config_dir().join(SETTINGS_FILE_NAME))?;
        Ok(Self {
            settings,
            config_dir: proj_dirs.config_dir().to_path_buf(),
            data_dir: proj_dirs.data_dir().to_path_buf(),
        })
    }

    /// Use one explicit directory for both settings and data.
    pub fn from_dir(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create config directory {}", dir.display()))?;
        let settings = Settings::new(&dir.join(SETTINGS_FILE_NAME))?;
        Ok(Self {
            settings,
            config_dir: dir.to_path_buf(),
            data_dir: dir.to_path_buf(),
        })
    }

    pub fn settings_path(&self) -> PathBuf {
        self.config_dir.join(SETTINGS_FILE_NAME)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub projection: ProjectionConfig,
    /// One of error, warn, info, debug, trace.
    pub log_level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            projection: ProjectionConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ProjectionConfig {
    /// Upper bound on item materializations in flight.
    pub max_concurrent_items: usize,
    pub page_size: u32,
    /// Stop following continuation tokens after this many pages.
    pub max_pages: Option<u32>,
    pub create_parents: bool,
    /// Retry pending shortcuts after every batch.
    pub resolve_pending: bool,
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            max_concurrent_items: 8,
            page_size: 1000,
            max_pages: None,
            create_parents: true,
            resolve_pending: true,
        }
    }
}

impl Settings {
    /// Load from `config_file_path`, falling back to (and writing) defaults.
    pub fn new(config_file_path: &Path) -> Result<Self> {
        match Self::load_settings_from_file(config_file_path) {
            Ok(settings) => Ok(settings),
            Err(e) => {
                warn!("Error loading settings from file - creating default config: {}", e);
                let default = Self::default();
                default.save_to_file(config_file_path)?;
                Ok(default)
            }
        }
    }

    pub fn load_settings_from_file(config_file_path: &Path) -> Result<Self> {
        if !config_file_path.exists() {
            return Err(anyhow!("Config file not found"));
        }
        let data = fs::read_to_string(config_file_path)
            .with_context(|| format!("Failed to read {}", config_file_path.display()))?;
        let settings: Self = serde_json::from_str(&data).context("Failed to parse settings")?;
        Ok(settings)
    }

    pub fn save_to_file(&self, config_file_path: &Path) -> Result<()> {
        if let Some(parent_path) = config_file_path.parent() {
            fs::create_dir_all(parent_path).context("Failed to create config directory")?;
        }

        let data = serde_json::to_string_pretty(self)?;
        fs::write(config_file_path, data)
            .with_context(|| format!("Failed to write {}", config_file_path.display()))?;
        Ok(())
    }
}

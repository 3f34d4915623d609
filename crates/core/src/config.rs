//! Application configuration.
//!
//! Values are layered: built-in defaults, then `~/.config/shelfmark/config.toml`,
//! then `SHELFMARK__SECTION__KEY` environment variables.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::storage::{FlatFileStore, MemoryStore, Persistence};

/// Directory under the user's config dir holding `config.toml`.
pub const CONFIG_DIR_NAME: &str = "shelfmark";
/// Configuration file name.
pub const CONFIG_FILE_NAME: &str = "config.toml";
/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "SHELFMARK";

/// Where catalog state lives between runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageMode {
    /// Flat text files under `storage.data_dir`.
    #[default]
    Files,
    /// Nothing is written; state is lost on exit.
    Memory,
}

/// Persistence settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Backend selection.
    pub mode: StorageMode,
    /// Directory for `members.txt`, `books.txt` and `transactions.txt`.
    pub data_dir: PathBuf,
    /// Save after every successful mutation.
    pub autosave: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            mode: StorageMode::default(),
            data_dir: dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(CONFIG_DIR_NAME),
            autosave: true,
        }
    }
}

/// Console presentation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    /// Emit ANSI colours.
    pub color: bool,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self { color: true }
    }
}

/// Log output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Directory receiving `shelfmark.log`.
    pub dir: PathBuf,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("logs"),
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Persistence settings.
    pub storage: StorageConfig,
    /// Console settings.
    pub console: ConsoleConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Default location of the configuration file.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(CONFIG_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Load from the default path plus environment overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(Self::default_path())
    }

    /// Load from `path` (optional) plus environment overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let settings = config::Config::builder()
            .add_source(config::File::from(path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()
            .with_context(|| format!("failed to build configuration from {}", path.display()))?;

        settings
            .try_deserialize()
            .with_context(|| format!("failed to parse configuration {}", path.display()))
    }

    /// Build the persistence backend selected by `storage.mode`.
    pub fn open_store(&self) -> Box<dyn Persistence> {
        match self.storage.mode {
            StorageMode::Files => Box::new(FlatFileStore::new(&self.storage.data_dir)),
            StorageMode::Memory => Box::new(MemoryStore),
        }
    }
}

/// Write a default configuration file if none exists yet.
pub fn ensure_default_config() -> Result<PathBuf> {
    let path = AppConfig::default_path();
    ensure_config_at(&path)?;
    Ok(path)
}

/// Write a default configuration file at `path` if it is missing.
pub fn ensure_config_at(path: &Path) -> Result<()> {
    if path.exists() {
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let rendered = toml_template(&AppConfig::default());
    fs::write(path, rendered).with_context(|| format!("failed to write {}", path.display()))?;
    info!("wrote default configuration to {}", path.display());
    Ok(())
}

fn toml_template(config: &AppConfig) -> String {
    let mode = match config.storage.mode {
        StorageMode::Files => "files",
        StorageMode::Memory => "memory",
    };
    format!(
        "# shelfmark configuration\n\
         \n\
         [storage]\n\
         # \"files\" keeps members, books and transactions under data_dir; \"memory\" keeps nothing.\n\
         mode = \"{mode}\"\n\
         data_dir = {data_dir:?}\n\
         autosave = {autosave}\n\
         \n\
         [console]\n\
         color = {color}\n\
         \n\
         [logging]\n\
         dir = {log_dir:?}\n",
        data_dir = config.storage.data_dir.display().to_string(),
        autosave = config.storage.autosave,
        color = config.console.color,
        log_dir = config.logging.dir.display().to_string(),
    )
}

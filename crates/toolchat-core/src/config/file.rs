//! File-based configuration provider (YAML)
//!
//! Supports user-level (~/.config/toolchat/config.yaml) and workspace-level (.config/toolchat/config.yaml) config.

use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;

use super::settings::AppConfig;
use super::traits::ConfigResult;

/// Config level (user or workspace)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigLevel {
    /// User-level config (~/.config/toolchat/config.yaml)
    User,
    /// Workspace-level config (.config/toolchat/config.yaml in workspace root)
    Workspace,
    /// An explicitly chosen file
    Explicit,
}

impl ConfigLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigLevel::User => "user",
            ConfigLevel::Workspace => "workspace",
            ConfigLevel::Explicit => "explicit",
        }
    }
}

/// File-based configuration provider
///
/// Reads configuration from a YAML file. A missing file yields defaults.
///
/// # Example
///
/// ```no_run
/// use toolchat_core::config::FileConfigProvider;
///
/// let config = FileConfigProvider::workspace(".").load()?;
/// println!("{} tool servers", config.servers.len());
/// # Ok::<(), toolchat_core::config::ConfigError>(())
/// ```
pub struct FileConfigProvider {
    path: PathBuf,
    level: ConfigLevel,
    cache: RwLock<Option<AppConfig>>,
}

impl FileConfigProvider {
    /// Create a new file config provider for a specific path
    pub fn new(path: impl Into<PathBuf>, level: ConfigLevel) -> Self {
        Self {
            path: path.into(),
            level,
            cache: RwLock::new(None),
        }
    }

    /// Create a user-level config provider (~/.config/toolchat/config.yaml)
    pub fn user() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")).join(".config"));
        Self::new(config_dir.join("toolchat").join("config.yaml"), ConfigLevel::User)
    }

    /// Create a workspace-level config provider (.config/toolchat/config.yaml)
    pub fn workspace(workspace_root: impl AsRef<Path>) -> Self {
        let path = workspace_root.as_ref().join(".config").join("toolchat").join("config.yaml");
        Self::new(path, ConfigLevel::Workspace)
    }

    /// Get the config file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get the config level
    pub fn level(&self) -> ConfigLevel {
        self.level
    }

    /// Check if the config file exists
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    fn read(&self) -> ConfigResult<AppConfig> {
        if !self.path.exists() {
            return Ok(AppConfig::default());
        }

        let content = fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(AppConfig::default());
        }
        Ok(serde_yaml::from_str(&content)?)
    }

    /// Cached config, reading the file on first use
    pub fn load(&self) -> ConfigResult<AppConfig> {
        if let Some(config) = self.cache.read().as_ref() {
            return Ok(config.clone());
        }
        self.reload()
    }

    /// Reload config from disk (invalidate cache)
    pub fn reload(&self) -> ConfigResult<AppConfig> {
        let config = self.read()?;
        *self.cache.write() = Some(config.clone());
        Ok(config)
    }
}

/// Load config files in order, later ones overriding earlier ones
///
/// Files that do not exist are skipped; with none present the result is
/// the default config.
pub fn load_layered(providers: &[FileConfigProvider]) -> ConfigResult<AppConfig> {
    let mut config = AppConfig::default();
    for provider in providers.iter().filter(|p| p.exists()) {
        config.overlay(provider.load()?);
    }
    Ok(config)
}

impl std::fmt::Debug for FileConfigProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileConfigProvider")
            .field("path", &self.path)
            .field("level", &self.level)
            .field("exists", &self.exists())
            .finish()
    }
}

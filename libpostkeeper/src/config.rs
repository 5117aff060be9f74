//! Configuration management for Postkeeper

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ConfigError, Result};

/// Explicit config file location
pub const CONFIG_ENV: &str = "POSTKEEPER_CONFIG";
/// Overrides `workspace.path`
pub const HOME_ENV: &str = "POSTKEEPER_HOME";

const DEFAULT_WORKSPACE: &str = "~/social_posts";
const DEFAULT_DB_FILE: &str = "posts.db";
const DEFAULT_POLL_INTERVAL: u64 = 300;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub workspace: WorkspaceConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    /// Posting order is the order of this list
    #[serde(default)]
    pub destinations: Vec<DestinationConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    pub path: String,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            path: DEFAULT_WORKSPACE.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Defaults to `<workspace>/posts.db`
    pub path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Seconds between due checks
    pub poll_interval: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// An external program that publishes to one destination
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DestinationConfig {
    pub name: String,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl Config {
    /// Load configuration from the default location
    ///
    /// A file named by `POSTKEEPER_CONFIG` must exist; the XDG default is
    /// optional and built-in defaults apply when it is absent.
    pub fn load() -> Result<Self> {
        let explicit = std::env::var(CONFIG_ENV).is_ok();
        let config_path = resolve_config_path()?;

        let mut config = if explicit || config_path.exists() {
            Self::load_from_path(&config_path)?
        } else {
            Self::default_config()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        let config: Config = toml::from_str(&content).map_err(ConfigError::ParseError)?;
        config.validate()?;
        Ok(config)
    }

    /// Create a default configuration
    pub fn default_config() -> Self {
        Self::default()
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(home) = std::env::var(HOME_ENV) {
            self.workspace.path = home;
        }
    }

    fn validate(&self) -> Result<()> {
        if self.workspace.path.trim().is_empty() {
            return Err(ConfigError::MissingField("workspace.path".to_string()).into());
        }
        for destination in &self.destinations {
            if destination.name.trim().is_empty() {
                return Err(ConfigError::MissingField("destinations.name".to_string()).into());
            }
            if destination.command.trim().is_empty() {
                return Err(ConfigError::MissingField(format!(
                    "destinations.{}.command",
                    destination.name
                ))
                .into());
            }
        }
        Ok(())
    }

    /// Expanded workspace directory
    pub fn workspace_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.workspace.path).to_string())
    }

    /// Database file, defaulting to `posts.db` inside the workspace
    pub fn database_path(&self) -> String {
        match &self.database.path {
            Some(path) => shellexpand::tilde(path).to_string(),
            None => self
                .workspace_path()
                .join(DEFAULT_DB_FILE)
                .to_string_lossy()
                .into_owned(),
        }
    }
}

/// Resolve the configuration file path, falling back to the XDG config directory
pub fn resolve_config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_ENV) {
        return Ok(PathBuf::from(shellexpand::tilde(&path).to_string()));
    }

    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::MissingField("config directory".to_string()))?;

    Ok(config_dir.join("postkeeper").join("config.toml"))
}

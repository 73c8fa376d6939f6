//! Application configuration for PageNotFound.
//!
//! User config lives at `~/.pagenotfound/pagenotfound.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{PageNotFoundError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "pagenotfound.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".pagenotfound";

// ---------------------------------------------------------------------------
// Config structs (matching pagenotfound.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Finder behaviour.
    #[serde(default)]
    pub resolver: ResolverSettings,

    /// Editorial mapping persistence.
    #[serde(default)]
    pub storage: StorageConfig,
}

/// `[resolver]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverSettings {
    /// Request paths starting with any of these are never handled.
    #[serde(default = "default_bypass_prefixes")]
    pub bypass_prefixes: Vec<String>,

    /// Whether unpublished domain bindings take part in section detection.
    #[serde(default = "default_true")]
    pub include_unpublished_sections: bool,

    /// Upper bound on ancestor steps taken while looking for a 404 target.
    #[serde(default = "default_max_walk_depth")]
    pub max_walk_depth: usize,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            bypass_prefixes: default_bypass_prefixes(),
            include_unpublished_sections: true,
            max_walk_depth: default_max_walk_depth(),
        }
    }
}

fn default_bypass_prefixes() -> Vec<String> {
    vec!["/umbraco-signin".into()]
}
fn default_true() -> bool {
    true
}
fn default_max_walk_depth() -> usize {
    256
}

/// `[storage]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Path to the mapping database. Unset means `~/.pagenotfound/pagenotfound.db`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_path: Option<String>,
}

impl StorageConfig {
    /// Resolve the configured database path, falling back to the config directory.
    pub fn resolved_database_path(&self) -> Result<PathBuf> {
        match &self.database_path {
            Some(p) => Ok(PathBuf::from(p)),
            None => Ok(config_dir()?.join("pagenotfound.db")),
        }
    }
}

// ---------------------------------------------------------------------------
// Resolver config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime finder configuration.
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    pub bypass_prefixes: Vec<String>,
    pub include_unpublished_sections: bool,
    pub max_walk_depth: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for ResolverConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            bypass_prefixes: config.resolver.bypass_prefixes.clone(),
            include_unpublished_sections: config.resolver.include_unpublished_sections,
            max_walk_depth: config.resolver.max_walk_depth,
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.pagenotfound/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| PageNotFoundError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.pagenotfound/pagenotfound.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| PageNotFoundError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        PageNotFoundError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| PageNotFoundError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| PageNotFoundError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| PageNotFoundError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

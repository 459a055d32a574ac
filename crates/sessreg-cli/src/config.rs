//! CLI configuration at `~/.sessreg/config.toml`.
//!
//! CLI flags always override config file values.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Top-level config file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub registry: RegistrySection,
    #[serde(default)]
    pub storage: StorageSection,
}

/// `[registry]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrySection {
    /// Seconds without activity before a session is treated as gone.
    #[serde(default = "default_active_session_ttl")]
    pub active_session_ttl: u64,
}

impl Default for RegistrySection {
    fn default() -> Self {
        Self {
            active_session_ttl: default_active_session_ttl(),
        }
    }
}

/// `[storage]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageSection {
    #[serde(default = "default_data_dir")]
    pub path: String,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            path: default_data_dir(),
        }
    }
}

fn default_active_session_ttl() -> u64 {
    sessreg_core::ACTIVE_SESSION_TTL.as_secs()
}

fn default_data_dir() -> String {
    "~/.sessreg/data".to_string()
}

pub fn default_config_path() -> String {
    "~/.sessreg/config.toml".to_string()
}

/// Resolved configuration (paths expanded, CLI overrides applied).
#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    pub active_session_ttl: Duration,
}

impl Config {
    /// Load the config file (defaults if it does not exist), then apply
    /// CLI overrides.
    pub fn load(
        config_path: &str,
        cli_data_dir: Option<&str>,
        cli_ttl: Option<u64>,
    ) -> Result<Self> {
        let path = expand_tilde(config_path);
        let file = read_config_file(&path)?;

        let data_dir = cli_data_dir
            .map(str::to_string)
            .unwrap_or(file.storage.path);
        let ttl = cli_ttl.unwrap_or(file.registry.active_session_ttl);
        if ttl == 0 {
            bail!("active_session_ttl must be at least 1 second");
        }

        Ok(Self {
            data_dir: expand_tilde(&data_dir),
            active_session_ttl: Duration::from_secs(ttl),
        })
    }
}

fn read_config_file(path: &Path) -> Result<ConfigFile> {
    if !path.exists() {
        debug!(path = %path.display(), "config file not found, using defaults");
        return Ok(ConfigFile::default());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config at {}", path.display()))?;
    let file = toml::from_str(&content)
        .with_context(|| format!("failed to parse config at {}", path.display()))?;
    debug!(path = %path.display(), "loaded config");
    Ok(file)
}

/// Expand a leading `~/` to the user's home directory.
fn expand_tilde(s: &str) -> PathBuf {
    if let Some(rest) = s.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(s)
}

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::data_source::{AccessMethod, FILESYSTEM_PROVIDER};
use crate::session::CurrentTracking;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub sessions: SessionsConfig,
    #[serde(default)]
    pub data_sources: BTreeMap<String, DataSourceConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RegistryConfig {
    /// Provider manifest; the embedded manifest is used when unset.
    #[serde(default)]
    pub manifest: Option<PathBuf>,
    /// Deployment variant override.
    #[serde(default)]
    pub variant: Option<String>,
    /// Directory probed for the variant marker file.
    #[serde(default = "default_probe_dir")]
    pub variant_probe_dir: PathBuf,
    #[serde(default)]
    pub available_dependencies: Vec<String>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            manifest: None,
            variant: None,
            variant_probe_dir: default_probe_dir(),
            available_dependencies: Vec::new(),
        }
    }
}

fn default_probe_dir() -> PathBuf {
    PathBuf::from(".")
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// `EnvFilter` directive; `RUST_LOG` takes precedence when set.
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            json: false,
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct SessionsConfig {
    #[serde(default)]
    pub current_tracking: CurrentTracking,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DataSourceConfig {
    pub provider_type: String,
    #[serde(default)]
    pub access_method: AccessMethod,
    /// Provider-specific keys (`dataSourceRoot`, `serverId`, ...).
    #[serde(default)]
    pub config: toml::Table,
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;

    if config.logging.level.trim().is_empty() {
        anyhow::bail!("logging.level must not be empty");
    }

    for (name, ds) in &config.data_sources {
        if ds.provider_type.trim().is_empty() {
            anyhow::bail!("data_sources.{}.provider_type must not be empty", name);
        }
        if ds.provider_type == FILESYSTEM_PROVIDER && ds.access_method == AccessMethod::Direct {
            match ds.config.get("dataSourceRoot") {
                Some(toml::Value::String(root)) if !root.trim().is_empty() => {}
                _ => anyhow::bail!(
                    "data_sources.{}.config.dataSourceRoot must be a non-empty string",
                    name
                ),
            }
        }
    }

    Ok(config)
}

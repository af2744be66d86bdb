//! Data source connections.
//!
//! A [`DataSourceConnection`] binds one provider type to its connection
//! parameters. Connections are validated when created and immutable after.
//! A [`DataSourceRegistry`] holds the connections registered for one project
//! and resolves resource URIs to the connection that owns them.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::{Config, DataSourceConfig};
use crate::error::{Operation, RegistryError, ResourceError, ResourceResult};
use crate::uri::{ResourceUri, UriForm, BRIDGED_SCHEME, DIRECT_SCHEME};

/// Provider type of the built-in filesystem accessor.
pub const FILESYSTEM_PROVIDER: &str = "filesystem";

/// How a provider is reached.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessMethod {
    /// Implemented in-process.
    #[default]
    Direct,
    /// Consumed through an opaque protocol-bridged connection.
    Bridged,
}

impl AccessMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessMethod::Direct => "direct",
            AccessMethod::Bridged => "bridged",
        }
    }

    /// Scheme prefix used in multi-instance URIs.
    pub fn uri_scheme(&self) -> &'static str {
        match self {
            AccessMethod::Direct => DIRECT_SCHEME,
            AccessMethod::Bridged => BRIDGED_SCHEME,
        }
    }
}

impl fmt::Display for AccessMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Filesystem connection parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilesystemConfig {
    pub data_source_root: PathBuf,
    #[serde(default = "default_true")]
    pub follow_symlinks: bool,
    /// Canonicalize existing targets and reject symlinks that leave the root.
    #[serde(default = "default_true")]
    pub strict_root: bool,
    #[serde(default)]
    pub exclude_patterns: Vec<String>,
    /// Ignore file to read patterns from, relative to the root.
    #[serde(default)]
    pub exclude_file: Option<PathBuf>,
}

fn default_true() -> bool {
    true
}

impl FilesystemConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            data_source_root: root.into(),
            follow_symlinks: true,
            strict_root: true,
            exclude_patterns: Vec::new(),
            exclude_file: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionConfig {
    Filesystem(FilesystemConfig),
    /// Provider-specific parameters passed through untouched.
    Opaque(Map<String, Value>),
}

/// A validated, immutable binding of a provider to its configuration.
#[derive(Debug, Clone)]
pub struct DataSourceConnection {
    pub id: Uuid,
    pub name: String,
    pub provider_type: String,
    pub access_method: AccessMethod,
    pub config: ConnectionConfig,
}

impl DataSourceConnection {
    /// Create a filesystem connection.
    pub fn filesystem(name: impl Into<String>, config: FilesystemConfig) -> Result<Self, RegistryError> {
        let name = name.into();
        validate_filesystem(&name, &config)?;
        Ok(Self {
            id: Uuid::new_v4(),
            name,
            provider_type: FILESYSTEM_PROVIDER.to_string(),
            access_method: AccessMethod::Direct,
            config: ConnectionConfig::Filesystem(config),
        })
    }

    /// Create a connection from an untyped configuration map.
    ///
    /// Filesystem providers get their parameters checked and typed; other
    /// providers keep the map as-is.
    pub fn from_parts(
        name: impl Into<String>,
        provider_type: impl Into<String>,
        access_method: AccessMethod,
        config: Value,
    ) -> Result<Self, RegistryError> {
        let name = name.into();
        let provider_type = provider_type.into();

        let config = if provider_type == FILESYSTEM_PROVIDER && access_method == AccessMethod::Direct {
            let fs: FilesystemConfig =
                serde_json::from_value(config).map_err(|e| RegistryError::InvalidConnection {
                    name: name.clone(),
                    reason: e.to_string(),
                })?;
            validate_filesystem(&name, &fs)?;
            ConnectionConfig::Filesystem(fs)
        } else {
            match config {
                Value::Object(map) => ConnectionConfig::Opaque(map),
                Value::Null => ConnectionConfig::Opaque(Map::new()),
                other => {
                    return Err(RegistryError::InvalidConnection {
                        name,
                        reason: format!("config must be a table, got {}", other),
                    })
                }
            }
        };

        Ok(Self {
            id: Uuid::new_v4(),
            name,
            provider_type,
            access_method,
            config,
        })
    }

    pub fn from_config(name: &str, cfg: &DataSourceConfig) -> Result<Self, RegistryError> {
        let config = serde_json::to_value(&cfg.config).map_err(|e| RegistryError::InvalidConnection {
            name: name.to_string(),
            reason: e.to_string(),
        })?;
        Self::from_parts(name, cfg.provider_type.clone(), cfg.access_method, config)
    }

    /// Scheme of direct-form URIs: `<providerType>-<name>`.
    pub fn uri_scheme(&self) -> String {
        format!("{}-{}", self.provider_type, self.name)
    }

    /// Direct-form URI for a path inside this data source.
    pub fn uri_for(&self, path: &str) -> String {
        ResourceUri::direct(&self.uri_scheme(), path)
    }

    /// Multi-instance URI for a path inside this data source.
    pub fn multi_instance_uri_for(&self, path: &str) -> String {
        ResourceUri::multi_instance(
            self.access_method.uri_scheme(),
            &self.provider_type,
            &self.name,
            path,
        )
    }

    /// Whether a parsed URI addresses this data source, in either form.
    pub fn owns(&self, uri: &ResourceUri) -> bool {
        match uri.form {
            UriForm::Direct => uri.scheme == self.uri_scheme(),
            UriForm::MultiInstance => {
                uri.provider_type.as_deref() == Some(self.provider_type.as_str())
                    && uri.name.as_deref() == Some(self.name.as_str())
            }
        }
    }

    pub fn filesystem_config(&self) -> Option<&FilesystemConfig> {
        match &self.config {
            ConnectionConfig::Filesystem(fs) => Some(fs),
            ConnectionConfig::Opaque(_) => None,
        }
    }

    pub fn opaque_config(&self) -> Option<&Map<String, Value>> {
        match &self.config {
            ConnectionConfig::Opaque(map) => Some(map),
            ConnectionConfig::Filesystem(_) => None,
        }
    }
}

fn validate_filesystem(name: &str, cfg: &FilesystemConfig) -> Result<(), RegistryError> {
    if cfg.data_source_root.as_os_str().is_empty() {
        return Err(RegistryError::InvalidConnection {
            name: name.to_string(),
            reason: "dataSourceRoot must not be empty".to_string(),
        });
    }
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════
// Per-project registry
// ═══════════════════════════════════════════════════════════════════════

/// The data sources registered for one project, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct DataSourceRegistry {
    sources: BTreeMap<String, Arc<DataSourceConnection>>,
}

impl DataSourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from every `[data_sources.*]` table in the config.
    pub fn from_config(config: &Config) -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        for (name, cfg) in &config.data_sources {
            registry.register(DataSourceConnection::from_config(name, cfg)?)?;
        }
        Ok(registry)
    }

    pub fn register(
        &mut self,
        connection: DataSourceConnection,
    ) -> Result<Arc<DataSourceConnection>, RegistryError> {
        if self.sources.contains_key(&connection.name) {
            return Err(RegistryError::DuplicateDataSource(connection.name));
        }
        let connection = Arc::new(connection);
        self.sources
            .insert(connection.name.clone(), Arc::clone(&connection));
        Ok(connection)
    }

    pub fn remove(&mut self, name: &str) -> Option<Arc<DataSourceConnection>> {
        self.sources.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&Arc<DataSourceConnection>> {
        self.sources.get(name)
    }

    pub fn connections(&self) -> impl Iterator<Item = &Arc<DataSourceConnection>> {
        self.sources.values()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Find the connection owning a URI, returning it with the parsed URI.
    pub fn resolve(&self, uri: &str) -> ResourceResult<(Arc<DataSourceConnection>, ResourceUri)> {
        let parsed = ResourceUri::parse(uri)?;
        self.sources
            .values()
            .find(|c| c.owns(&parsed))
            .map(|c| (Arc::clone(c), parsed))
            .ok_or_else(|| {
                ResourceError::invalid_uri(uri, Operation::Resolve, "no data source owns this uri")
            })
    }
}

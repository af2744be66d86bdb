//! Provider manifest and registry.
//!
//! The manifest enumerates every provider implementation the process knows
//! about, with its capabilities and activation conditions. At startup the
//! [`ProviderRegistry`] loads it once, drops entries that are disabled, not
//! shipped in the current deployment variant, or missing a required
//! dependency, and indexes the rest by `(providerType, accessMethod)`.
//!
//! # Manifest Layout
//!
//! ```json
//! {
//!   "providers": [
//!     {
//!       "name": "Local Filesystem",
//!       "providerClass": "FilesystemAccessor",
//!       "productVariants": [],
//!       "capabilities": ["read", "write", "list", "search", "move", "delete"],
//!       "requiredDependencies": [],
//!       "providerType": "filesystem",
//!       "accessMethod": "direct"
//!     }
//!   ]
//! }
//! ```
//!
//! # Resolution
//!
//! ```text
//! connection (type, method) ──▶ ProviderEntry ──▶ providerClass ──▶ ProviderFactory
//!                                                                      │
//!                                                                      ▼
//!                                                          Arc<dyn ResourceAccessor>
//! ```
//!
//! A missing or unparseable manifest file is fatal. A single malformed
//! entry is logged and skipped.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, OnceLock};
use tracing::{info, warn};

use crate::accessor_fs::{FilesystemProviderFactory, FILESYSTEM_PROVIDER_CLASS};
use crate::config::RegistryConfig;
use crate::data_source::{AccessMethod, DataSourceConnection};
use crate::error::RegistryError;
use crate::models::Capability;
use crate::traits::ResourceAccessor;

/// Environment variable that selects the deployment variant.
pub const VARIANT_ENV: &str = "RESOURCE_HARNESS_VARIANT";
/// Marker file whose presence selects the `saas` variant.
pub const SAAS_MARKER: &str = ".saas";
pub const VARIANT_OPENSOURCE: &str = "opensource";
pub const VARIANT_SAAS: &str = "saas";

const EMBEDDED_MANIFEST: &str = include_str!("../providers/manifest.json");

// ═══════════════════════════════════════════════════════════════════════
// Manifest Types
// ═══════════════════════════════════════════════════════════════════════

/// One provider implementation described by the manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderEntry {
    /// Display name (e.g. `"Local Filesystem"`).
    pub name: String,
    /// Implementation identifier; selects the [`ProviderFactory`].
    pub provider_class: String,
    #[serde(default)]
    pub import_path: Option<String>,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub license: String,
    #[serde(default)]
    pub description: String,
    /// Variants this provider ships in. Empty means every variant.
    #[serde(default)]
    pub product_variants: Vec<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub deprecated: bool,
    #[serde(default)]
    pub replaced_by: Option<String>,
    #[serde(default)]
    pub capabilities: Vec<Capability>,
    #[serde(default)]
    pub required_dependencies: Vec<String>,
    pub provider_type: String,
    #[serde(default)]
    pub access_method: AccessMethod,
}

fn default_true() -> bool {
    true
}

impl ProviderEntry {
    pub fn ships_in(&self, variant: &str) -> bool {
        self.product_variants.is_empty() || self.product_variants.iter().any(|v| v == variant)
    }

    pub fn has_capability(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }
}

/// The parsed provider manifest.
#[derive(Debug, Clone, Default)]
pub struct ProviderManifest {
    pub providers: Vec<ProviderEntry>,
}

impl ProviderManifest {
    /// Parse manifest JSON. `source` names the origin in errors and logs.
    pub fn from_json(source: &str, json: &str) -> Result<Self, RegistryError> {
        let root: Value = serde_json::from_str(json).map_err(|e| RegistryError::Manifest {
            path: source.to_string(),
            reason: e.to_string(),
        })?;
        let entries = root
            .get("providers")
            .and_then(Value::as_array)
            .ok_or_else(|| RegistryError::Manifest {
                path: source.to_string(),
                reason: "expected a top-level \"providers\" array".to_string(),
            })?;

        let mut providers = Vec::with_capacity(entries.len());
        for (index, raw) in entries.iter().enumerate() {
            match serde_json::from_value::<ProviderEntry>(raw.clone()) {
                Ok(entry) => providers.push(entry),
                Err(e) => warn!(manifest = source, index, error = %e, "skipping malformed provider entry"),
            }
        }
        Ok(Self { providers })
    }

    /// The manifest compiled into the crate.
    pub fn embedded() -> Result<Self, RegistryError> {
        Self::from_json("<embedded>", EMBEDDED_MANIFEST)
    }
}

/// Load and parse a manifest file.
pub fn load_manifest(path: &Path) -> Result<ProviderManifest, RegistryError> {
    let content = std::fs::read_to_string(path).map_err(|e| RegistryError::Manifest {
        path: path.display().to_string(),
        reason: format!("failed to read manifest: {}", e),
    })?;
    ProviderManifest::from_json(&path.display().to_string(), &content)
}

// ═══════════════════════════════════════════════════════════════════════
// Deployment Variant
// ═══════════════════════════════════════════════════════════════════════

static DETECTED_VARIANT: OnceLock<String> = OnceLock::new();

/// Resolve the deployment variant.
///
/// An explicit override always wins. Otherwise the variant is detected
/// once per process from [`VARIANT_ENV`] or the [`SAAS_MARKER`] file in
/// `probe_dir`, and memoized.
pub fn resolve_variant(override_variant: Option<&str>, probe_dir: &Path) -> String {
    if let Some(v) = override_variant.filter(|v| !v.is_empty()) {
        return v.to_string();
    }
    DETECTED_VARIANT
        .get_or_init(|| detect_variant(std::env::var(VARIANT_ENV).ok(), probe_dir))
        .clone()
}

/// Unmemoized variant detection.
pub fn detect_variant(env_value: Option<String>, probe_dir: &Path) -> String {
    if let Some(v) = env_value.filter(|v| !v.trim().is_empty()) {
        return v.trim().to_string();
    }
    if probe_dir.join(SAAS_MARKER).exists() {
        VARIANT_SAAS.to_string()
    } else {
        VARIANT_OPENSOURCE.to_string()
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Provider Factories
// ═══════════════════════════════════════════════════════════════════════

/// Builds accessors for one provider class.
pub trait ProviderFactory: Send + Sync {
    fn create(
        &self,
        connection: Arc<DataSourceConnection>,
        entry: &ProviderEntry,
    ) -> Result<Arc<dyn ResourceAccessor>, RegistryError>;
}

// ═══════════════════════════════════════════════════════════════════════
// Provider Registry
// ═══════════════════════════════════════════════════════════════════════

/// Eligible providers keyed by `(providerType, accessMethod)`, plus the
/// factories that instantiate them.
///
/// Built once per process and shared as `Arc<ProviderRegistry>`.
pub struct ProviderRegistry {
    variant: String,
    providers: Vec<ProviderEntry>,
    index: HashMap<(String, AccessMethod), usize>,
    factories: HashMap<String, Arc<dyn ProviderFactory>>,
}

impl ProviderRegistry {
    pub fn new<I, S>(manifest: ProviderManifest, variant: impl Into<String>, available_dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let variant = variant.into();
        let available: HashSet<String> = available_dependencies.into_iter().map(Into::into).collect();
        let total = manifest.providers.len();

        let providers: Vec<ProviderEntry> = manifest
            .providers
            .into_iter()
            .filter(|p| p.enabled)
            .filter(|p| p.ships_in(&variant))
            .filter(|p| {
                let missing: Vec<&String> = p
                    .required_dependencies
                    .iter()
                    .filter(|d| !available.contains(*d))
                    .collect();
                if !missing.is_empty() {
                    info!(provider = %p.name, missing = ?missing, "provider unavailable: missing dependencies");
                }
                missing.is_empty()
            })
            .collect();

        let mut index = HashMap::new();
        for (i, p) in providers.iter().enumerate() {
            let key = (p.provider_type.clone(), p.access_method);
            if index.contains_key(&key) {
                warn!(provider = %p.name, provider_type = %p.provider_type, access_method = %p.access_method, "duplicate provider key; keeping the first entry");
                continue;
            }
            index.insert(key, i);
        }

        info!(variant = %variant, total, eligible = providers.len(), "provider registry loaded");
        Self {
            variant,
            providers,
            index,
            factories: HashMap::new(),
        }
    }

    /// A registry with the built-in provider factories installed.
    pub fn with_builtins<I, S>(manifest: ProviderManifest, variant: impl Into<String>, available_dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut registry = Self::new(manifest, variant, available_dependencies);
        registry.register_factory(FILESYSTEM_PROVIDER_CLASS, Arc::new(FilesystemProviderFactory));
        registry
    }

    /// Build from the `[registry]` config section.
    pub fn from_config(cfg: &RegistryConfig) -> Result<Self, RegistryError> {
        let manifest = match &cfg.manifest {
            Some(path) => load_manifest(path)?,
            None => ProviderManifest::embedded()?,
        };
        let variant = resolve_variant(cfg.variant.as_deref(), &cfg.variant_probe_dir);
        Ok(Self::with_builtins(
            manifest,
            variant,
            cfg.available_dependencies.iter().cloned(),
        ))
    }

    pub fn variant(&self) -> &str {
        &self.variant
    }

    pub fn register_factory(&mut self, provider_class: impl Into<String>, factory: Arc<dyn ProviderFactory>) {
        self.factories.insert(provider_class.into(), factory);
    }

    /// The eligible provider for a type and access method, if any.
    pub fn get_provider(&self, provider_type: &str, access_method: AccessMethod) -> Option<&ProviderEntry> {
        let entry = self
            .index
            .get(&(provider_type.to_string(), access_method))
            .map(|&i| &self.providers[i])?;
        if entry.deprecated {
            warn!(
                provider = %entry.name,
                replaced_by = entry.replaced_by.as_deref().unwrap_or("none"),
                "provider is deprecated"
            );
        }
        Some(entry)
    }

    pub fn get_all_providers(&self) -> &[ProviderEntry] {
        &self.providers
    }

    pub fn get_providers_by_access_method(&self, access_method: AccessMethod) -> Vec<&ProviderEntry> {
        self.providers
            .iter()
            .filter(|p| p.access_method == access_method)
            .collect()
    }

    pub fn provider_has_capability(
        &self,
        provider_type: &str,
        access_method: AccessMethod,
        capability: Capability,
    ) -> bool {
        self.get_provider(provider_type, access_method)
            .is_some_and(|p| p.has_capability(capability))
    }

    /// Instantiate the accessor for a connection.
    pub fn create_accessor(
        &self,
        connection: Arc<DataSourceConnection>,
    ) -> Result<Arc<dyn ResourceAccessor>, RegistryError> {
        let entry = self
            .get_provider(&connection.provider_type, connection.access_method)
            .ok_or_else(|| RegistryError::ProviderNotFound {
                provider_type: connection.provider_type.clone(),
                access_method: connection.access_method.to_string(),
            })?;
        let factory = self
            .factories
            .get(&entry.provider_class)
            .ok_or_else(|| RegistryError::FactoryNotFound(entry.provider_class.clone()))?;
        factory.create(connection, entry)
    }
}

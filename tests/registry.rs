//! Provider discovery and accessor instantiation through the registry.

use async_trait::async_trait;
use resource_harness::accessor_bridged::{BridgedProviderFactory, BRIDGED_PROVIDER_CLASS};
use resource_harness::config::parse_config;
use resource_harness::data_source::{AccessMethod, DataSourceConnection, DataSourceRegistry, FilesystemConfig};
use resource_harness::models::{Capability, ListOptions};
use resource_harness::registry::{load_manifest, ProviderManifest, ProviderRegistry, VARIANT_OPENSOURCE, VARIANT_SAAS};
use resource_harness::traits::BridgedConnection;
use resource_harness::{ErrorKind, Harness, RegistryError};
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;

fn registry(variant: &str) -> ProviderRegistry {
    ProviderRegistry::with_builtins(ProviderManifest::embedded().unwrap(), variant, Vec::<String>::new())
}

// ─── Manifest ───────────────────────────────────────────────────────

#[test]
fn embedded_manifest_filters_by_variant() {
    let open = registry(VARIANT_OPENSOURCE);
    assert!(open.get_provider("filesystem", AccessMethod::Direct).is_some());
    assert!(open.get_provider("notion", AccessMethod::Bridged).is_none());
    assert!(open.get_provider("postgres", AccessMethod::Direct).is_none());

    let saas = registry(VARIANT_SAAS);
    assert!(saas.get_provider("notion", AccessMethod::Bridged).is_some());

    let bridged = open.get_providers_by_access_method(AccessMethod::Bridged);
    assert!(bridged.iter().all(|p| p.access_method == AccessMethod::Bridged));
    assert!(!bridged.is_empty());
}

#[test]
fn deprecated_providers_still_resolve() {
    let open = registry(VARIANT_OPENSOURCE);
    let gdrive = open.get_provider("gdrive", AccessMethod::Bridged).unwrap();
    assert!(gdrive.deprecated);
    assert_eq!(gdrive.replaced_by.as_deref(), Some("googledocs"));
}

#[test]
fn dependencies_gate_providers() {
    let with_pg = ProviderRegistry::new(ProviderManifest::embedded().unwrap(), VARIANT_OPENSOURCE, ["postgres"]);
    assert!(with_pg.get_provider("postgres", AccessMethod::Direct).is_some());
}

#[test]
fn manifest_file_skips_bad_entries() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("manifest.json");
    std::fs::write(
        &path,
        r#"{ "providers": [
            { "name": "ok", "providerClass": "FilesystemAccessor", "providerType": "filesystem" },
            { "name": "no-type", "providerClass": "FilesystemAccessor" }
        ] }"#,
    )
    .unwrap();
    let manifest = load_manifest(&path).unwrap();
    assert_eq!(manifest.providers.len(), 1);

    std::fs::write(&path, r#"{ "plugins": [] }"#).unwrap();
    assert!(matches!(load_manifest(&path), Err(RegistryError::Manifest { .. })));
    assert!(load_manifest(&dir.path().join("missing.json")).is_err());
}

// ─── Accessor creation ──────────────────────────────────────────────

#[tokio::test]
async fn filesystem_accessor_from_registry() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("a.txt"), "a").unwrap();
    let conn = DataSourceConnection::filesystem("local", FilesystemConfig::new(dir.path())).unwrap();

    let accessor = registry(VARIANT_OPENSOURCE).create_accessor(Arc::new(conn)).unwrap();
    assert_eq!(accessor.capabilities(), Capability::ALL.as_slice());
    let listed = accessor.list_resources(ListOptions::default()).await.unwrap();
    assert_eq!(listed.resources.len(), 1);
}

#[test]
fn missing_provider_and_factory_are_distinct_errors() {
    let open = registry(VARIANT_OPENSOURCE);

    let unknown = DataSourceConnection::from_parts("x", "dropbox", AccessMethod::Bridged, json!({})).unwrap();
    assert!(matches!(
        open.create_accessor(Arc::new(unknown)),
        Err(RegistryError::ProviderNotFound { .. })
    ));

    let no_factory = DataSourceConnection::from_parts("docs", "googledocs", AccessMethod::Bridged, json!({})).unwrap();
    assert!(matches!(
        open.create_accessor(Arc::new(no_factory)),
        Err(RegistryError::FactoryNotFound(class)) if class == BRIDGED_PROVIDER_CLASS
    ));
}

#[test]
fn duplicate_data_source_names_are_rejected() {
    let dir = TempDir::new().unwrap();
    let mut sources = DataSourceRegistry::new();
    sources
        .register(DataSourceConnection::filesystem("local", FilesystemConfig::new(dir.path())).unwrap())
        .unwrap();
    let err = sources
        .register(DataSourceConnection::filesystem("local", FilesystemConfig::new(dir.path())).unwrap())
        .unwrap_err();
    assert!(matches!(err, RegistryError::DuplicateDataSource(name) if name == "local"));
}

// ─── Bridged providers ──────────────────────────────────────────────

struct DocsServer;

#[async_trait]
impl BridgedConnection for DocsServer {
    fn server_id(&self) -> &str {
        "google-workspace"
    }

    fn capabilities(&self) -> Vec<Capability> {
        vec![Capability::Read, Capability::List, Capability::Search]
    }

    async fn call(&self, operation: &str, _params: Value) -> anyhow::Result<Value> {
        match operation {
            "list_resources" => Ok(json!({
                "resources": [{
                    "uri": "mcp+googledocs+work://doc/1", "name": "Plan", "type": "file",
                    "mimeType": "application/vnd.google-apps.document", "contentType": "text", "size": 0
                }]
            })),
            other => anyhow::bail!("unsupported call {}", other),
        }
    }
}

#[tokio::test]
async fn bridged_factory_uses_registered_server() {
    let mut open = registry(VARIANT_OPENSOURCE);
    let factory = Arc::new(BridgedProviderFactory::new());
    open.register_factory(BRIDGED_PROVIDER_CLASS, factory.clone());
    factory.register_server(Arc::new(DocsServer));

    let conn = DataSourceConnection::from_parts(
        "work",
        "googledocs",
        AccessMethod::Bridged,
        json!({ "serverId": "google-workspace" }),
    )
    .unwrap();
    let accessor = open.create_accessor(Arc::new(conn)).unwrap();

    // Manifest declares write, the server does not.
    assert!(!accessor.has_capability(Capability::Write));
    let listed = accessor.list_resources(ListOptions::default()).await.unwrap();
    assert_eq!(listed.resources[0].name, "Plan");

    let err = accessor.get_metadata().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Handling);
}

#[tokio::test]
async fn harness_opens_bridged_sources_after_server_registration() {
    let dir = TempDir::new().unwrap();
    let config = parse_config(&format!(
        r#"
[registry]
variant = "opensource"

[data_sources.local]
provider_type = "filesystem"
[data_sources.local.config]
dataSourceRoot = "{}"

[data_sources.work]
provider_type = "googledocs"
access_method = "bridged"
[data_sources.work.config]
serverId = "google-workspace"
"#,
        dir.path().display()
    ))
    .unwrap();
    let harness = Harness::from_config(&config).unwrap();

    let before = harness.open_session("p", "early").await.unwrap();
    assert!(before.unavailable_sources().contains_key("work"));

    harness.register_server(Arc::new(DocsServer));
    let after = harness.open_session("p", "late").await.unwrap();
    assert!(after.unavailable_sources().is_empty());
    let listed = after.list_resources("work", ListOptions::default()).await.unwrap();
    assert_eq!(listed.resources.len(), 1);
}

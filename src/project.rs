//! Per-project session object.
//!
//! A [`ProjectEditor`] holds one accessor per data source of a project and
//! routes URI-addressed operations to the accessor owning the URI. It is
//! what the session manager builds and caches under a [`SessionKey`].

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::data_source::{DataSourceConnection, DataSourceRegistry};
use crate::edit::{EditOperation, EditOptions, EditResult};
use crate::error::{Operation, ResourceError, ResourceResult};
use crate::models::{
    DeleteOptions, DeleteResult, ExistsOptions, FindOptions, FindResult, ListOptions, ListResult,
    LoadOptions, LoadResult, MoveOptions, MoveResult, ResourceContent, WriteOptions, WriteResult,
};
use crate::registry::ProviderRegistry;
use crate::session::{EditorFactory, SessionKey};
use crate::traits::ResourceAccessor;

pub struct ProjectEditor {
    key: SessionKey,
    sources: DataSourceRegistry,
    accessors: BTreeMap<String, Arc<dyn ResourceAccessor>>,
    /// Data sources without a usable provider, with the reason.
    unavailable: BTreeMap<String, String>,
}

impl ProjectEditor {
    /// Instantiate accessors for every data source of the project.
    ///
    /// A data source whose provider cannot be built is recorded as
    /// unavailable; the rest of the project stays usable.
    pub fn build(key: SessionKey, sources: DataSourceRegistry, providers: &ProviderRegistry) -> Self {
        let mut accessors = BTreeMap::new();
        let mut unavailable = BTreeMap::new();

        for conn in sources.connections() {
            match providers.create_accessor(Arc::clone(conn)) {
                Ok(accessor) => {
                    accessors.insert(conn.name.clone(), accessor);
                }
                Err(e) => {
                    warn!(session = %key, data_source = %conn.name, error = %e, "data source unavailable");
                    unavailable.insert(conn.name.clone(), e.to_string());
                }
            }
        }

        Self {
            key,
            sources,
            accessors,
            unavailable,
        }
    }

    pub fn key(&self) -> &SessionKey {
        &self.key
    }

    pub fn data_sources(&self) -> &DataSourceRegistry {
        &self.sources
    }

    pub fn accessor(&self, data_source: &str) -> Option<&Arc<dyn ResourceAccessor>> {
        self.accessors.get(data_source)
    }

    pub fn unavailable_sources(&self) -> &BTreeMap<String, String> {
        &self.unavailable
    }

    /// The accessor owning `uri`, with its connection.
    pub fn accessor_for_uri(
        &self,
        uri: &str,
        operation: Operation,
    ) -> ResourceResult<(Arc<dyn ResourceAccessor>, Arc<DataSourceConnection>)> {
        let (conn, _) = self.sources.resolve(uri).map_err(|e| relabel(e, operation))?;
        self.accessor_named(&conn.name, uri, operation)
            .map(|accessor| (accessor, conn))
    }

    fn accessor_named(
        &self,
        data_source: &str,
        path: &str,
        operation: Operation,
    ) -> ResourceResult<Arc<dyn ResourceAccessor>> {
        if let Some(accessor) = self.accessors.get(data_source) {
            return Ok(Arc::clone(accessor));
        }
        match self.unavailable.get(data_source) {
            Some(reason) => Err(ResourceError::unsupported(path, operation, reason.clone())),
            None => Err(ResourceError::not_found(path, operation)),
        }
    }

    pub async fn resource_exists(&self, uri: &str, options: ExistsOptions) -> ResourceResult<bool> {
        let (accessor, _) = self.accessor_for_uri(uri, Operation::Exists)?;
        accessor.resource_exists(uri, options).await
    }

    pub async fn load_resource(&self, uri: &str, options: LoadOptions) -> ResourceResult<LoadResult> {
        let (accessor, _) = self.accessor_for_uri(uri, Operation::Load)?;
        accessor.load_resource(uri, options).await
    }

    pub async fn list_resources(&self, data_source: &str, options: ListOptions) -> ResourceResult<ListResult> {
        self.accessor_named(data_source, data_source, Operation::List)?
            .list_resources(options)
            .await
    }

    pub async fn find_resources(&self, data_source: &str, options: FindOptions) -> ResourceResult<FindResult> {
        self.accessor_named(data_source, data_source, Operation::Find)?
            .find_resources(options)
            .await
    }

    pub async fn write_resource(
        &self,
        uri: &str,
        content: ResourceContent,
        options: WriteOptions,
    ) -> ResourceResult<WriteResult> {
        let (accessor, _) = self.accessor_for_uri(uri, Operation::Write)?;
        accessor.write_resource(uri, content, options).await
    }

    pub async fn edit_resource(
        &self,
        uri: &str,
        operations: Vec<EditOperation>,
        options: EditOptions,
    ) -> ResourceResult<EditResult> {
        let (accessor, _) = self.accessor_for_uri(uri, Operation::Edit)?;
        accessor.edit_resource(uri, operations, options).await
    }

    /// Move within one data source. Moves across data sources are rejected.
    pub async fn move_resource(
        &self,
        source_uri: &str,
        dest_uri: &str,
        options: MoveOptions,
    ) -> ResourceResult<MoveResult> {
        let (accessor, source_conn) = self.accessor_for_uri(source_uri, Operation::Move)?;
        let (_, dest_conn) = self.accessor_for_uri(dest_uri, Operation::Move)?;
        if source_conn.id != dest_conn.id {
            return Err(ResourceError::unsupported(
                dest_uri,
                Operation::Move,
                format!(
                    "cannot move from data source '{}' to '{}'",
                    source_conn.name, dest_conn.name
                ),
            ));
        }
        debug!(session = %self.key, source = source_uri, dest = dest_uri, "routing move");
        accessor.move_resource(source_uri, dest_uri, options).await
    }

    pub async fn delete_resource(&self, uri: &str, options: DeleteOptions) -> ResourceResult<DeleteResult> {
        let (accessor, _) = self.accessor_for_uri(uri, Operation::Delete)?;
        accessor.delete_resource(uri, options).await
    }
}

fn relabel(err: ResourceError, operation: Operation) -> ResourceError {
    match err {
        ResourceError::InvalidUri { path, reason, .. } => ResourceError::invalid_uri(path, operation, reason),
        other => other,
    }
}

/// Builds [`ProjectEditor`]s from a shared provider registry.
///
/// The construction context is the project's data source registry.
pub struct ProjectEditorFactory {
    providers: Arc<ProviderRegistry>,
}

impl ProjectEditorFactory {
    pub fn new(providers: Arc<ProviderRegistry>) -> Self {
        Self { providers }
    }

    pub fn providers(&self) -> &Arc<ProviderRegistry> {
        &self.providers
    }
}

#[async_trait]
impl EditorFactory for ProjectEditorFactory {
    type Editor = ProjectEditor;
    type Context = DataSourceRegistry;

    async fn create(&self, key: &SessionKey, sources: DataSourceRegistry) -> ResourceResult<ProjectEditor> {
        let editor = ProjectEditor::build(key.clone(), sources, &self.providers);
        if editor.accessors.is_empty() && !editor.unavailable.is_empty() {
            let reasons: Vec<String> = editor
                .unavailable
                .iter()
                .map(|(name, reason)| format!("{}: {}", name, reason))
                .collect();
            return Err(ResourceError::unsupported(
                key.to_string(),
                Operation::Connect,
                format!("no data source could be opened ({})", reasons.join("; ")),
            ));
        }
        Ok(editor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_source::{AccessMethod, FilesystemConfig};
    use crate::error::ErrorKind;
    use crate::registry::{ProviderManifest, VARIANT_OPENSOURCE};
    use serde_json::json;
    use tempfile::TempDir;

    fn providers() -> ProviderRegistry {
        ProviderRegistry::with_builtins(
            ProviderManifest::embedded().unwrap(),
            VARIANT_OPENSOURCE,
            Vec::<String>::new(),
        )
    }

    fn project(dirs: &[(&str, &TempDir)]) -> ProjectEditor {
        let mut sources = DataSourceRegistry::new();
        for (name, dir) in dirs {
            sources
                .register(DataSourceConnection::filesystem(*name, FilesystemConfig::new(dir.path())).unwrap())
                .unwrap();
        }
        ProjectEditor::build(SessionKey::new("proj", "collab"), sources, &providers())
    }

    #[tokio::test]
    async fn routes_by_uri() {
        let a = TempDir::new().unwrap();
        let b = TempDir::new().unwrap();
        std::fs::write(b.path().join("x.txt"), "from b").unwrap();
        let editor = project(&[("a", &a), ("b", &b)]);

        let loaded = editor
            .load_resource("filesystem-b:./x.txt", LoadOptions::default())
            .await
            .unwrap();
        assert_eq!(loaded.content.as_text(), Some("from b"));

        let err = editor
            .load_resource("filesystem-a:./x.txt", LoadOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn cross_source_move_is_rejected() {
        let a = TempDir::new().unwrap();
        let b = TempDir::new().unwrap();
        std::fs::write(a.path().join("x.txt"), "x").unwrap();
        let editor = project(&[("a", &a), ("b", &b)]);

        let err = editor
            .move_resource("filesystem-a:./x.txt", "filesystem-b:./x.txt", MoveOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unsupported);
        assert!(a.path().join("x.txt").exists());
    }

    #[tokio::test]
    async fn unknown_scheme_is_invalid_uri() {
        let a = TempDir::new().unwrap();
        let editor = project(&[("a", &a)]);
        let err = editor
            .delete_resource("filesystem-zzz:./x.txt", DeleteOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidUri);
        assert_eq!(err.operation(), Operation::Delete);
    }

    #[tokio::test]
    async fn unavailable_provider_is_reported_per_source() {
        let a = TempDir::new().unwrap();
        let mut sources = DataSourceRegistry::new();
        sources
            .register(DataSourceConnection::filesystem("a", FilesystemConfig::new(a.path())).unwrap())
            .unwrap();
        sources
            .register(
                DataSourceConnection::from_parts("db", "postgres", AccessMethod::Direct, json!({})).unwrap(),
            )
            .unwrap();

        let editor = ProjectEditor::build(SessionKey::new("p", "c"), sources, &providers());
        assert!(editor.accessor("a").is_some());
        assert!(editor.unavailable_sources().contains_key("db"));

        let err = editor
            .list_resources("db", ListOptions::default())
            .await
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::Unsupported);
    }

    #[tokio::test]
    async fn factory_fails_when_nothing_opens() {
        let mut sources = DataSourceRegistry::new();
        sources
            .register(
                DataSourceConnection::from_parts("db", "postgres", AccessMethod::Direct, json!({})).unwrap(),
            )
            .unwrap();
        let factory = ProjectEditorFactory::new(Arc::new(providers()));
        let err = factory
            .create(&SessionKey::new("p", "c"), sources)
            .await
            .err()
            .unwrap();
        assert_eq!(err.operation(), Operation::Connect);
    }
}

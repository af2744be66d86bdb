//! Protocol-bridged resource accessor.
//!
//! Bridged providers (document stores, SaaS workspaces) live behind a
//! remote server. This crate never speaks the wire protocol itself; it
//! drives an opaque [`BridgedConnection`] handle supplied by the embedding
//! application. Each accessor operation becomes one `call(name, params)`:
//!
//! | Operation | Call name | Params |
//! |-----------|-----------|--------|
//! | exists | `resource_exists` | `{uri, path, options}` |
//! | load | `load_resource` | `{uri, path, options}` |
//! | list | `list_resources` | `{options}` |
//! | find | `find_resources` | `{options}` |
//! | write | `write_resource` | `{uri, path, content, options}` |
//! | edit | `edit_resource` | `{uri, path, operations, options}` |
//! | move | `move_resource` | `{sourceUri, destinationUri, ...}` |
//! | delete | `delete_resource` | `{uri, path, options}` |
//! | metadata | `get_metadata` | `{}` |
//!
//! Responses are JSON shaped like the corresponding result type. An
//! operation the server has not declared a capability for fails with
//! `Unsupported` without a round trip.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;

use crate::accessor_fs::normalize_relative;
use crate::data_source::DataSourceConnection;
use crate::edit::{EditOperation, EditOptions, EditResult};
use crate::error::{Operation, RegistryError, ResourceError, ResourceResult};
use crate::models::{
    Capability, DataSourceMetadata, DeleteOptions, DeleteResult, ExistsOptions, FindOptions,
    FindResult, ListOptions, ListResult, LoadOptions, LoadResult, MoveOptions, MoveResult,
    ResourceContent, WriteOptions, WriteResult,
};
use crate::registry::{ProviderEntry, ProviderFactory};
use crate::traits::{ResourceAccessor, SharedBridgedConnection};
use crate::uri::ResourceUri;

/// Provider class name of bridged providers in the manifest.
pub const BRIDGED_PROVIDER_CLASS: &str = "BridgedAccessor";

pub struct BridgedAccessor {
    connection: Arc<DataSourceConnection>,
    bridge: SharedBridgedConnection,
    capabilities: Vec<Capability>,
}

impl BridgedAccessor {
    /// Capabilities are those the manifest declares that the server also
    /// reports. An empty declaration defers to the server.
    pub fn new(
        connection: Arc<DataSourceConnection>,
        bridge: SharedBridgedConnection,
        declared: &[Capability],
    ) -> Self {
        let remote = bridge.capabilities();
        let capabilities = if declared.is_empty() {
            remote
        } else {
            declared.iter().copied().filter(|c| remote.contains(c)).collect()
        };
        Self {
            connection,
            bridge,
            capabilities,
        }
    }

    pub fn server_id(&self) -> &str {
        self.bridge.server_id()
    }

    fn require(&self, capability: Capability, uri: &str, op: Operation) -> ResourceResult<()> {
        if self.has_capability(capability) {
            return Ok(());
        }
        Err(ResourceError::unsupported(
            uri,
            op,
            format!("server '{}' does not provide {}", self.bridge.server_id(), capability),
        ))
    }

    /// Parse a URI, check ownership and reject root escapes.
    fn path_of(&self, uri: &str, op: Operation) -> ResourceResult<String> {
        let parsed = ResourceUri::parse(uri).map_err(|e| match e {
            ResourceError::InvalidUri { reason, .. } => ResourceError::invalid_uri(uri, op, reason),
            other => other,
        })?;
        if !self.connection.owns(&parsed) {
            return Err(ResourceError::invalid_uri(
                uri,
                op,
                format!("uri does not belong to data source '{}'", self.connection.name),
            ));
        }
        let rel = normalize_relative(&parsed.path).ok_or_else(|| ResourceError::sandbox(uri, op))?;
        Ok(rel.to_string_lossy().replace('\\', "/"))
    }

    async fn invoke<T: DeserializeOwned>(&self, op: Operation, method: &str, uri: &str, params: Value) -> ResourceResult<T> {
        if !self.bridge.is_connected() {
            return Err(ResourceError::handling(
                uri,
                op,
                format!("bridged server '{}' is not connected", self.bridge.server_id()),
            ));
        }
        debug!(server = self.bridge.server_id(), method, uri, "bridged call");
        let response = self
            .bridge
            .call(method, params)
            .await
            .map_err(|e| ResourceError::handling(uri, op, format!("{:#}", e)))?;
        serde_json::from_value(response)
            .map_err(|e| ResourceError::handling(uri, op, format!("unexpected response from {}: {}", method, e)))
    }
}

fn to_json<T: serde::Serialize>(value: &T, uri: &str, op: Operation) -> ResourceResult<Value> {
    serde_json::to_value(value).map_err(|e| ResourceError::handling(uri, op, e))
}

#[async_trait]
impl ResourceAccessor for BridgedAccessor {
    fn connection(&self) -> &DataSourceConnection {
        &self.connection
    }

    fn capabilities(&self) -> &[Capability] {
        &self.capabilities
    }

    async fn resource_exists(&self, uri: &str, options: ExistsOptions) -> ResourceResult<bool> {
        let op = Operation::Exists;
        self.require(Capability::Read, uri, op)?;
        let path = self.path_of(uri, op)?;
        let params = json!({ "uri": uri, "path": path, "options": to_json(&options, uri, op)? });
        self.invoke(op, "resource_exists", uri, params).await
    }

    async fn is_resource_within_data_source(&self, uri: &str) -> bool {
        self.path_of(uri, Operation::Resolve).is_ok()
    }

    async fn load_resource(&self, uri: &str, options: LoadOptions) -> ResourceResult<LoadResult> {
        let op = Operation::Load;
        self.require(Capability::Read, uri, op)?;
        let path = self.path_of(uri, op)?;
        let params = json!({ "uri": uri, "path": path, "options": to_json(&options, uri, op)? });
        self.invoke(op, "load_resource", uri, params).await
    }

    async fn list_resources(&self, options: ListOptions) -> ResourceResult<ListResult> {
        let op = Operation::List;
        let uri = self.connection.multi_instance_uri_for(options.path.as_deref().unwrap_or(""));
        self.require(Capability::List, &uri, op)?;
        let params = json!({ "options": to_json(&options, &uri, op)? });
        self.invoke(op, "list_resources", &uri, params).await
    }

    async fn find_resources(&self, options: FindOptions) -> ResourceResult<FindResult> {
        let op = Operation::Find;
        let uri = self.connection.multi_instance_uri_for("");
        self.require(Capability::Search, &uri, op)?;
        let params = json!({ "options": to_json(&options, &uri, op)? });
        self.invoke(op, "find_resources", &uri, params).await
    }

    async fn write_resource(
        &self,
        uri: &str,
        content: ResourceContent,
        options: WriteOptions,
    ) -> ResourceResult<WriteResult> {
        let op = Operation::Write;
        self.require(Capability::Write, uri, op)?;
        let path = self.path_of(uri, op)?;
        let params = json!({
            "uri": uri,
            "path": path,
            "content": to_json(&content, uri, op)?,
            "options": to_json(&options, uri, op)?,
        });
        self.invoke(op, "write_resource", uri, params).await
    }

    async fn edit_resource(
        &self,
        uri: &str,
        operations: Vec<EditOperation>,
        options: EditOptions,
    ) -> ResourceResult<EditResult> {
        let op = Operation::Edit;
        self.require(Capability::Write, uri, op)?;
        let path = self.path_of(uri, op)?;
        let params = json!({
            "uri": uri,
            "path": path,
            "operations": to_json(&operations, uri, op)?,
            "options": to_json(&options, uri, op)?,
        });
        self.invoke(op, "edit_resource", uri, params).await
    }

    async fn move_resource(
        &self,
        source_uri: &str,
        dest_uri: &str,
        options: MoveOptions,
    ) -> ResourceResult<MoveResult> {
        let op = Operation::Move;
        self.require(Capability::Move, source_uri, op)?;
        let source_path = self.path_of(source_uri, op)?;
        let dest_path = self.path_of(dest_uri, op)?;
        let params = json!({
            "sourceUri": source_uri,
            "sourcePath": source_path,
            "destinationUri": dest_uri,
            "destinationPath": dest_path,
            "options": to_json(&options, source_uri, op)?,
        });
        self.invoke(op, "move_resource", source_uri, params).await
    }

    async fn delete_resource(&self, uri: &str, options: DeleteOptions) -> ResourceResult<DeleteResult> {
        let op = Operation::Delete;
        self.require(Capability::Delete, uri, op)?;
        let path = self.path_of(uri, op)?;
        let params = json!({ "uri": uri, "path": path, "options": to_json(&options, uri, op)? });
        self.invoke(op, "delete_resource", uri, params).await
    }

    async fn get_metadata(&self) -> ResourceResult<DataSourceMetadata> {
        let op = Operation::Metadata;
        let uri = self.connection.multi_instance_uri_for("");
        let mut metadata: DataSourceMetadata = self.invoke(op, "get_metadata", &uri, json!({})).await?;
        metadata.capabilities = self.capabilities.clone();
        Ok(metadata)
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Provider factory
// ═══════════════════════════════════════════════════════════════════════

/// Builds [`BridgedAccessor`]s from registered server handles.
///
/// A connection picks its server with the `serverId` key of its config,
/// falling back to its provider type.
#[derive(Default)]
pub struct BridgedProviderFactory {
    servers: RwLock<HashMap<String, SharedBridgedConnection>>,
}

impl BridgedProviderFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_server(&self, server: SharedBridgedConnection) {
        let id = server.server_id().to_string();
        self.servers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, server);
    }

    pub fn remove_server(&self, server_id: &str) -> Option<SharedBridgedConnection> {
        self.servers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(server_id)
    }

    fn server(&self, server_id: &str) -> Option<SharedBridgedConnection> {
        self.servers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(server_id)
            .cloned()
    }
}

impl ProviderFactory for BridgedProviderFactory {
    fn create(
        &self,
        connection: Arc<DataSourceConnection>,
        entry: &ProviderEntry,
    ) -> Result<Arc<dyn ResourceAccessor>, RegistryError> {
        let server_id = connection
            .opaque_config()
            .and_then(|cfg| cfg.get("serverId"))
            .and_then(Value::as_str)
            .unwrap_or(connection.provider_type.as_str())
            .to_string();
        let bridge = self.server(&server_id).ok_or_else(|| RegistryError::InvalidConnection {
            name: connection.name.clone(),
            reason: format!("no bridged server '{}' is registered", server_id),
        })?;
        Ok(Arc::new(BridgedAccessor::new(connection, bridge, &entry.capabilities)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_source::AccessMethod;
    use crate::error::ErrorKind;
    use std::sync::Mutex;

    struct FakeServer {
        calls: Mutex<Vec<(String, Value)>>,
    }

    #[async_trait]
    impl crate::traits::BridgedConnection for FakeServer {
        fn server_id(&self) -> &str {
            "workspace"
        }

        fn capabilities(&self) -> Vec<Capability> {
            vec![Capability::Read, Capability::List]
        }

        async fn call(&self, operation: &str, params: Value) -> anyhow::Result<Value> {
            self.calls.lock().unwrap().push((operation.to_string(), params.clone()));
            match operation {
                "resource_exists" => Ok(json!(params["path"] == "doc/1")),
                "load_resource" => Ok(json!({
                    "content": { "kind": "text", "data": "hello" },
                    "metadata": {
                        "uri": params["uri"], "name": "1", "type": "file",
                        "mimeType": "text/plain", "contentType": "text", "size": 5
                    },
                    "isPartial": false
                })),
                other => anyhow::bail!("unexpected call {}", other),
            }
        }
    }

    fn accessor() -> (BridgedAccessor, Arc<FakeServer>) {
        let server = Arc::new(FakeServer {
            calls: Mutex::new(Vec::new()),
        });
        let conn = DataSourceConnection::from_parts(
            "work",
            "gdrive",
            AccessMethod::Bridged,
            json!({ "serverId": "workspace" }),
        )
        .unwrap();
        let accessor = BridgedAccessor::new(
            Arc::new(conn),
            server.clone(),
            &[Capability::Read, Capability::Write, Capability::List],
        );
        (accessor, server)
    }

    #[tokio::test]
    async fn capabilities_intersect_with_server() {
        let (accessor, _) = accessor();
        assert!(accessor.has_capability(Capability::Read));
        assert!(!accessor.has_capability(Capability::Write));
    }

    #[tokio::test]
    async fn calls_are_forwarded_and_decoded() {
        let (accessor, server) = accessor();
        assert!(accessor
            .resource_exists("mcp+gdrive+work://doc/1", ExistsOptions::default())
            .await
            .unwrap());
        let loaded = accessor
            .load_resource("mcp+gdrive+work://doc/1", LoadOptions::default())
            .await
            .unwrap();
        assert_eq!(loaded.content.as_text(), Some("hello"));
        assert_eq!(server.calls.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn undeclared_capability_never_reaches_server() {
        let (accessor, server) = accessor();
        let err = accessor
            .write_resource("mcp+gdrive+work://doc/1", "x".into(), WriteOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unsupported);

        let err = accessor
            .load_resource("mcp+gdrive+work://../secret", LoadOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SandboxViolation);
        assert!(server.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn factory_resolves_server_by_id() {
        let factory = BridgedProviderFactory::new();
        let entry: ProviderEntry = serde_json::from_value(json!({
            "name": "Drive", "providerClass": BRIDGED_PROVIDER_CLASS,
            "providerType": "gdrive", "accessMethod": "bridged", "capabilities": ["read"]
        }))
        .unwrap();
        let conn = Arc::new(
            DataSourceConnection::from_parts("work", "gdrive", AccessMethod::Bridged, json!({ "serverId": "workspace" }))
                .unwrap(),
        );

        assert!(factory.create(conn.clone(), &entry).is_err());
        factory.register_server(Arc::new(FakeServer {
            calls: Mutex::new(Vec::new()),
        }));
        let accessor = factory.create(conn, &entry).ok().unwrap();
        assert_eq!(accessor.capabilities(), &[Capability::Read]);
    }
}

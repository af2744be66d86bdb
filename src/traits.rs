//! The resource accessor contract.
//!
//! Every backend exposes the same operation surface through
//! [`ResourceAccessor`]. Callers never branch on the backend; they check
//! [`ResourceAccessor::has_capability`] and handle
//! [`ResourceError::Unsupported`](crate::error::ResourceError::Unsupported).
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │            ProviderRegistry              │
//! │   (providerType, accessMethod) → class   │
//! │   class → ProviderFactory                │
//! └──────────────┬───────────────────────────┘
//!                ▼ create_accessor(connection)
//! ┌──────────────────────────────────────────┐
//! │        Arc<dyn ResourceAccessor>         │
//! │  ┌──────────────┐   ┌─────────────────┐  │
//! │  │ Filesystem   │   │ Bridged         │  │
//! │  │ (direct)     │   │ (BridgedConn.)  │  │
//! │  └──────────────┘   └─────────────────┘  │
//! └──────────────────────────────────────────┘
//! ```
//!
//! Protocol-bridged providers are reached through a [`BridgedConnection`],
//! an opaque capability-bearing handle whose transport and authentication
//! live outside this crate.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use crate::data_source::DataSourceConnection;
use crate::edit::{EditOperation, EditOptions, EditResult};
use crate::error::{Operation, ResourceError, ResourceResult};
use crate::models::{
    Capability, DataSourceMetadata, DeleteOptions, DeleteResult, ExistsOptions, FindOptions,
    FindResult, ListOptions, ListResult, LoadOptions, LoadResult, MoveOptions, MoveResult,
    ResourceContent, SuggestOptions, SuggestResult, WriteOptions, WriteResult,
};

// ═══════════════════════════════════════════════════════════════════════
// ResourceAccessor Trait
// ═══════════════════════════════════════════════════════════════════════

/// Uniform operations over the resources of one data source.
///
/// An accessor is built from exactly one [`DataSourceConnection`]. All URIs
/// passed in must address that data source, in either URI form (see
/// [`crate::uri`]). Mutating operations enforce the sandbox boundary
/// themselves and fail with `SandboxViolation` before touching the backend.
///
/// # Example
///
/// ```rust,ignore
/// let accessor = registry.create_accessor(Arc::clone(&connection))?;
/// if accessor.has_capability(Capability::Write) {
///     accessor
///         .write_resource("filesystem-local:./notes.md", "hello".into(), WriteOptions::default())
///         .await?;
/// }
/// let loaded = accessor
///     .load_resource("filesystem-local:./notes.md", LoadOptions::default())
///     .await?;
/// ```
#[async_trait]
pub trait ResourceAccessor: Send + Sync {
    /// The connection this accessor was built from.
    fn connection(&self) -> &DataSourceConnection;

    /// Capabilities this accessor actually supports.
    fn capabilities(&self) -> &[Capability];

    fn has_capability(&self, capability: Capability) -> bool {
        self.capabilities().contains(&capability)
    }

    async fn resource_exists(&self, uri: &str, options: ExistsOptions) -> ResourceResult<bool>;

    /// Sandbox predicate: whether `uri` resolves inside this data source.
    ///
    /// Never errors; malformed or foreign URIs are simply outside.
    async fn is_resource_within_data_source(&self, uri: &str) -> bool;

    /// Read a resource. A byte range yields a partial read.
    async fn load_resource(&self, uri: &str, options: LoadOptions) -> ResourceResult<LoadResult>;

    async fn list_resources(&self, options: ListOptions) -> ResourceResult<ListResult>;

    /// Content and metadata search behind one call.
    async fn find_resources(&self, options: FindOptions) -> ResourceResult<FindResult>;

    async fn write_resource(
        &self,
        uri: &str,
        content: ResourceContent,
        options: WriteOptions,
    ) -> ResourceResult<WriteResult>;

    /// Apply a batch of edits, reporting an outcome per operation.
    async fn edit_resource(
        &self,
        uri: &str,
        operations: Vec<EditOperation>,
        options: EditOptions,
    ) -> ResourceResult<EditResult>;

    async fn move_resource(
        &self,
        source_uri: &str,
        dest_uri: &str,
        options: MoveOptions,
    ) -> ResourceResult<MoveResult>;

    /// Rename is a move within the same data source.
    async fn rename_resource(
        &self,
        source_uri: &str,
        dest_uri: &str,
        options: MoveOptions,
    ) -> ResourceResult<MoveResult> {
        self.move_resource(source_uri, dest_uri, options).await
    }

    async fn delete_resource(&self, uri: &str, options: DeleteOptions) -> ResourceResult<DeleteResult>;

    /// Aggregate statistics for the whole data source.
    async fn get_metadata(&self) -> ResourceResult<DataSourceMetadata>;

    /// Path autocompletion.
    async fn suggest_resources(
        &self,
        partial: &str,
        _options: SuggestOptions,
    ) -> ResourceResult<SuggestResult> {
        Err(ResourceError::unsupported(
            partial,
            Operation::Suggest,
            "suggestions are not available for this data source",
        ))
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Bridged connections
// ═══════════════════════════════════════════════════════════════════════

/// An opaque handle to a protocol-bridged server.
///
/// The bridged accessor maps every accessor operation onto
/// [`call`](BridgedConnection::call) with a JSON parameter object and
/// expects a JSON response shaped like the matching result type.
#[async_trait]
pub trait BridgedConnection: Send + Sync {
    /// Identifier of the remote server (e.g. `"google-workspace"`).
    fn server_id(&self) -> &str;

    /// Capabilities the remote server declares.
    fn capabilities(&self) -> Vec<Capability>;

    fn is_connected(&self) -> bool {
        true
    }

    async fn call(&self, operation: &str, params: Value) -> anyhow::Result<Value>;
}

/// Shared handle to a bridged connection.
pub type SharedBridgedConnection = Arc<dyn BridgedConnection>;

//! Filesystem resource accessor.
//!
//! The reference implementation of [`ResourceAccessor`] over a local
//! directory tree.
//!
//! # Configuration
//!
//! ```toml
//! [data_sources.local]
//! provider_type = "filesystem"
//!
//! [data_sources.local.config]
//! dataSourceRoot = "./my-project"
//! followSymlinks = true
//! strictRoot = true
//! excludePatterns = ["*.log", "dist/"]
//! excludeFile = ".gitignore"
//! ```
//!
//! # Sandboxing
//!
//! Resource paths are normalized lexically and any `..` that would climb
//! above the root is rejected before a single syscall is made. With
//! `strictRoot`, the nearest existing ancestor of every target is also
//! canonicalized, so symlinks cannot be used to leave the root.
//!
//! # Pagination
//!
//! Page tokens are decimal offsets into the walk order (file-name sorted).
//! A token is only returned when a page came back exactly full.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::debug;

use crate::data_source::DataSourceConnection;
use crate::edit::{EditBatcher, EditOperation, EditOptions, EditResult};
use crate::error::{Operation, RegistryError, ResourceError, ResourceResult};
use crate::exclude::ExcludeMatcher;
use crate::mime::{content_kind, detect_mime, is_binary_mime};
use crate::models::{
    Capability, DataSourceMetadata, DeleteOptions, DeleteResult, ExistsOptions, FindOptions,
    FindResult, ListOptions, ListResult, LoadOptions, LoadResult, MoveOptions, MoveResult,
    Pagination, ResourceContent, ResourceExtra, ResourceMetadata, ResourceType, SuggestOptions,
    SuggestResult, WriteOptions, WriteResult,
};
use crate::registry::{ProviderEntry, ProviderFactory};
use crate::traits::ResourceAccessor;
use crate::uri::ResourceUri;
use crate::walk::Walker;
use crate::{scan, search, suggest};

/// Mime type reported for directories.
pub const DIRECTORY_MIME: &str = "application/x-directory";

/// Provider class name of the filesystem accessor in the manifest.
pub const FILESYSTEM_PROVIDER_CLASS: &str = "FilesystemAccessor";

/// A path inside the data source, both root-relative and absolute.
#[derive(Debug, Clone)]
struct Target {
    rel: String,
    abs: PathBuf,
}

pub struct FilesystemAccessor {
    connection: Arc<DataSourceConnection>,
    walker: Walker,
    canonical_root: PathBuf,
    strict_root: bool,
    capabilities: Vec<Capability>,
    batcher: EditBatcher,
}

impl FilesystemAccessor {
    /// Build an accessor with every filesystem capability.
    pub fn new(connection: Arc<DataSourceConnection>) -> ResourceResult<Self> {
        Self::with_capabilities(connection, Capability::ALL.to_vec())
    }

    /// Build an accessor restricted to the given capabilities.
    pub fn with_capabilities(
        connection: Arc<DataSourceConnection>,
        capabilities: Vec<Capability>,
    ) -> ResourceResult<Self> {
        let cfg = connection.filesystem_config().ok_or_else(|| {
            ResourceError::unsupported(
                connection.name.clone(),
                Operation::Connect,
                "connection is not a filesystem data source",
            )
        })?;

        let root = cfg.data_source_root.clone();
        let canonical_root = std::fs::canonicalize(&root).unwrap_or_else(|_| root.clone());
        let excludes = ExcludeMatcher::for_config(&root, cfg).map_err(|e| {
            ResourceError::invalid_pattern(
                connection.uri_for(""),
                Operation::Connect,
                "excludePatterns",
                e,
            )
        })?;

        let walker = Walker::new(
            root,
            canonical_root.clone(),
            cfg.follow_symlinks,
            cfg.strict_root,
            Arc::new(excludes),
        );

        Ok(Self {
            strict_root: cfg.strict_root,
            connection,
            walker,
            canonical_root,
            capabilities,
            batcher: EditBatcher::text_only(),
        })
    }

    pub fn root(&self) -> &Path {
        self.walker.root()
    }

    fn require(&self, capability: Capability, uri: &str, op: Operation) -> ResourceResult<()> {
        if self.has_capability(capability) {
            Ok(())
        } else {
            Err(ResourceError::unsupported(
                uri,
                op,
                format!("data source '{}' does not allow {}", self.connection.name, capability),
            ))
        }
    }

    /// Lexical resolution of a URI to a path under the root. No I/O.
    fn target(&self, uri: &str, op: Operation) -> ResourceResult<Target> {
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
        self.target_for_path(&parsed.path, uri, op)
    }

    fn target_for_path(&self, path: &str, uri: &str, op: Operation) -> ResourceResult<Target> {
        let rel = normalize_relative(path).ok_or_else(|| ResourceError::sandbox(uri, op))?;
        Ok(Target {
            abs: self.root().join(&rel),
            rel: rel.to_string_lossy().replace('\\', "/"),
        })
    }

    /// Under a strict root, ensure the nearest existing ancestor of `abs`
    /// canonicalizes inside the root.
    async fn check_strict(&self, target: &Target, uri: &str, op: Operation) -> ResourceResult<()> {
        if !self.strict_root {
            return Ok(());
        }
        let mut probe = target.abs.clone();
        loop {
            match tokio::fs::canonicalize(&probe).await {
                Ok(real) if real.starts_with(&self.canonical_root) => return Ok(()),
                Ok(_) => return Err(ResourceError::sandbox(uri, op)),
                Err(_) => {
                    if !probe.pop() || !probe.starts_with(self.root()) {
                        return Ok(());
                    }
                }
            }
        }
    }

    async fn resolve(&self, uri: &str, op: Operation) -> ResourceResult<Target> {
        let target = self.target(uri, op)?;
        self.check_strict(&target, uri, op).await?;
        Ok(target)
    }

    async fn stat(&self, target: &Target, uri: &str, op: Operation) -> ResourceResult<ResourceMetadata> {
        let meta = tokio::fs::metadata(&target.abs)
            .await
            .map_err(|e| ResourceError::from_io(uri, op, e))?;
        Ok(build_metadata(
            &self.connection,
            &self.capabilities,
            &target.rel,
            &target.abs,
            &meta,
        ))
    }

    async fn ensure_parent(
        &self,
        target: &Target,
        create: bool,
        uri: &str,
        op: Operation,
    ) -> ResourceResult<()> {
        let Some(parent) = target.abs.parent() else {
            return Ok(());
        };
        match tokio::fs::metadata(parent).await {
            Ok(meta) if meta.is_dir() => Ok(()),
            Ok(_) => Err(ResourceError::precondition(uri, op, "parent is not a directory")),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                if create {
                    tokio::fs::create_dir_all(parent)
                        .await
                        .map_err(|e| ResourceError::from_io(uri, op, e))
                } else {
                    Err(ResourceError::precondition(
                        uri,
                        op,
                        "parent directory does not exist; set createMissingDirectories",
                    ))
                }
            }
            Err(e) => Err(ResourceError::from_io(uri, op, e)),
        }
    }

    fn page_offset(&self, token: Option<&str>, op: Operation) -> ResourceResult<usize> {
        match token {
            None => Ok(0),
            Some(t) => t.parse::<usize>().map_err(|_| {
                ResourceError::precondition(self.connection.uri_for(""), op, format!("invalid page token '{}'", t))
            }),
        }
    }

    async fn start_dir(&self, path: Option<&str>, op: Operation) -> ResourceResult<Target> {
        let path = path.unwrap_or("");
        let uri = self.connection.uri_for(path);
        let target = self.target_for_path(path, &uri, op)?;
        self.check_strict(&target, &uri, op).await?;
        let meta = tokio::fs::metadata(&target.abs)
            .await
            .map_err(|e| ResourceError::from_io(&uri, op, e))?;
        if !meta.is_dir() {
            return Err(ResourceError::precondition(uri, op, "not a directory"));
        }
        Ok(target)
    }
}

#[async_trait]
impl ResourceAccessor for FilesystemAccessor {
    fn connection(&self) -> &DataSourceConnection {
        &self.connection
    }

    fn capabilities(&self) -> &[Capability] {
        &self.capabilities
    }

    async fn resource_exists(&self, uri: &str, options: ExistsOptions) -> ResourceResult<bool> {
        let target = self.resolve(uri, Operation::Exists).await?;
        match tokio::fs::metadata(&target.abs).await {
            Ok(meta) => Ok(match options.is_file {
                Some(true) => meta.is_file(),
                Some(false) => meta.is_dir(),
                None => true,
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(ResourceError::from_io(uri, Operation::Exists, e)),
        }
    }

    async fn is_resource_within_data_source(&self, uri: &str) -> bool {
        self.resolve(uri, Operation::Resolve).await.is_ok()
    }

    async fn load_resource(&self, uri: &str, options: LoadOptions) -> ResourceResult<LoadResult> {
        let op = Operation::Load;
        self.require(Capability::Read, uri, op)?;
        let target = self.resolve(uri, op).await?;
        let metadata = self.stat(&target, uri, op).await?;
        if metadata.resource_type == ResourceType::Directory {
            return Err(ResourceError::precondition(uri, op, "cannot load a directory"));
        }
        debug!(uri, operation = %op, range = ?options.range, "loading resource");

        let (bytes, is_partial) = match options.range {
            Some(range) => {
                let end = range.end.unwrap_or(u64::MAX);
                if end < range.start {
                    return Err(ResourceError::precondition(uri, op, "range end precedes start"));
                }
                let mut file = tokio::fs::File::open(&target.abs)
                    .await
                    .map_err(|e| ResourceError::from_io(uri, op, e))?;
                file.seek(std::io::SeekFrom::Start(range.start))
                    .await
                    .map_err(|e| ResourceError::from_io(uri, op, e))?;
                let mut buf = Vec::new();
                file.take(end - range.start)
                    .read_to_end(&mut buf)
                    .await
                    .map_err(|e| ResourceError::from_io(uri, op, e))?;
                (buf, true)
            }
            None => {
                let buf = tokio::fs::read(&target.abs)
                    .await
                    .map_err(|e| ResourceError::from_io(uri, op, e))?;
                (buf, false)
            }
        };

        let content = if is_binary_mime(&metadata.mime_type) {
            ResourceContent::Bytes(bytes)
        } else {
            match String::from_utf8(bytes) {
                Ok(text) => ResourceContent::Text(text),
                Err(e) => ResourceContent::Bytes(e.into_bytes()),
            }
        };

        Ok(LoadResult {
            content,
            metadata,
            is_partial,
        })
    }

    async fn list_resources(&self, options: ListOptions) -> ResourceResult<ListResult> {
        let op = Operation::List;
        let root_uri = self.connection.uri_for("");
        self.require(Capability::List, &root_uri, op)?;
        let start = self.start_dir(options.path.as_deref(), op).await?;
        let offset = self.page_offset(options.page_token.as_deref(), op)?;
        let depth = options.depth.unwrap_or(1).max(1);
        let page_size = options.page_size.filter(|&n| n > 0);
        debug!(uri = %root_uri, operation = %op, path = %start.rel, depth, offset, "listing resources");

        let walker = self.walker.clone();
        let connection = Arc::clone(&self.connection);
        let capabilities = self.capabilities.clone();

        let resources = tokio::task::spawn_blocking(move || {
            let mut visited = 0usize;
            let mut out = Vec::new();
            for entry in walker.walk(&start.abs, Some(depth)) {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) => {
                        debug!(error = %e, "skipping unreadable entry");
                        continue;
                    }
                };
                let meta = match entry.metadata() {
                    Ok(meta) => meta,
                    Err(e) => {
                        debug!(path = %entry.path().display(), error = %e, "skipping entry without metadata");
                        continue;
                    }
                };
                visited += 1;
                if visited <= offset {
                    continue;
                }
                let rel = walker.relative(entry.path());
                out.push(build_metadata(&connection, &capabilities, &rel, entry.path(), &meta));
                if page_size.is_some_and(|n| out.len() >= n) {
                    break;
                }
            }
            out
        })
        .await
        .map_err(|e| ResourceError::handling(&root_uri, op, e))?;

        let pagination = page_size.map(|n| Pagination {
            page_size: n,
            next_page_token: (resources.len() == n).then(|| (offset + n).to_string()),
        });

        Ok(ListResult {
            resources,
            pagination,
        })
    }

    async fn find_resources(&self, options: FindOptions) -> ResourceResult<FindResult> {
        let op = Operation::Find;
        let root_uri = self.connection.uri_for("");
        self.require(Capability::Search, &root_uri, op)?;
        if options.structured_query.is_some() {
            return Err(ResourceError::unsupported(
                root_uri,
                op,
                "structured queries are not supported by filesystem data sources",
            ));
        }
        let start = self.start_dir(options.options.path.as_deref(), op).await?;
        let offset = self.page_offset(options.options.page_token.as_deref(), op)?;
        debug!(
            uri = %root_uri,
            operation = %op,
            content_pattern = ?options.content_pattern,
            resource_pattern = ?options.resource_pattern,
            "finding resources"
        );

        let walker = self.walker.clone();
        let connection = Arc::clone(&self.connection);
        let capabilities = self.capabilities.clone();
        tokio::task::spawn_blocking(move || {
            search::find_blocking(&walker, &connection, &capabilities, &start.abs, &options, offset)
        })
        .await
        .map_err(|e| ResourceError::handling(self.connection.uri_for(""), op, e))?
    }

    async fn write_resource(
        &self,
        uri: &str,
        content: ResourceContent,
        options: WriteOptions,
    ) -> ResourceResult<WriteResult> {
        let op = Operation::Write;
        self.require(Capability::Write, uri, op)?;
        let target = self.resolve(uri, op).await?;
        if target.rel.is_empty() {
            return Err(ResourceError::precondition(uri, op, "cannot write to the data source root"));
        }

        match tokio::fs::metadata(&target.abs).await {
            Ok(meta) if meta.is_dir() => {
                return Err(ResourceError::precondition(uri, op, "target is a directory"))
            }
            Ok(_) if !options.overwrite => return Err(ResourceError::already_exists(uri, op)),
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(ResourceError::from_io(uri, op, e)),
        }
        self.ensure_parent(&target, options.create_missing_directories, uri, op)
            .await?;

        debug!(uri, operation = %op, bytes = content.len(), "writing resource");
        tokio::fs::write(&target.abs, content.as_bytes())
            .await
            .map_err(|e| ResourceError::from_io(uri, op, e))?;

        Ok(WriteResult {
            success: true,
            metadata: self.stat(&target, uri, op).await?,
            bytes_written: content.len() as u64,
        })
    }

    async fn edit_resource(
        &self,
        uri: &str,
        operations: Vec<EditOperation>,
        options: EditOptions,
    ) -> ResourceResult<EditResult> {
        let op = Operation::Edit;
        self.require(Capability::Write, uri, op)?;
        let target = self.resolve(uri, op).await?;

        let mime = detect_mime(&target.abs);
        if is_binary_mime(mime) {
            return Err(ResourceError::unsupported(uri, op, format!("cannot edit {} content", mime)));
        }

        let (original, is_new) = match tokio::fs::metadata(&target.abs).await {
            Ok(meta) if meta.is_dir() => {
                return Err(ResourceError::precondition(uri, op, "cannot edit a directory"))
            }
            Ok(_) => {
                let bytes = tokio::fs::read(&target.abs)
                    .await
                    .map_err(|e| ResourceError::from_io(uri, op, e))?;
                let text = String::from_utf8(bytes).map_err(|_| {
                    ResourceError::unsupported(uri, op, "content is not valid UTF-8 text")
                })?;
                (text, false)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && options.create_if_missing => {
                (String::new(), true)
            }
            Err(e) => return Err(ResourceError::from_io(uri, op, e)),
        };

        let outcome = self.batcher.run(&original, &operations, is_new);
        debug!(
            uri,
            operation = %op,
            operations = operations.len(),
            changed = outcome.changed,
            is_new,
            "applied edit batch"
        );
        if !outcome.changed && !is_new {
            return Err(ResourceError::no_change(uri, op));
        }

        if is_new {
            self.ensure_parent(&target, true, uri, op).await?;
        }
        tokio::fs::write(&target.abs, outcome.content.as_bytes())
            .await
            .map_err(|e| ResourceError::from_io(uri, op, e))?;

        let metadata = self.stat(&target, uri, op).await?;
        Ok(EditResult::new(
            outcome.results,
            metadata,
            is_new,
            outcome.content.len() as u64,
        ))
    }

    async fn move_resource(
        &self,
        source_uri: &str,
        dest_uri: &str,
        options: MoveOptions,
    ) -> ResourceResult<MoveResult> {
        let op = Operation::Move;
        self.require(Capability::Move, source_uri, op)?;
        let source = self.target(source_uri, op)?;
        let dest = self.target(dest_uri, op)?;
        self.check_strict(&source, source_uri, op).await?;
        self.check_strict(&dest, dest_uri, op).await?;

        if source.rel.is_empty() || dest.rel.is_empty() {
            return Err(ResourceError::precondition(source_uri, op, "cannot move the data source root"));
        }
        if source.abs == dest.abs {
            return Err(ResourceError::precondition(source_uri, op, "source and destination are the same"));
        }
        if dest.abs.starts_with(&source.abs) {
            return Err(ResourceError::precondition(dest_uri, op, "cannot move a directory into itself"));
        }
        if source.abs.starts_with(&dest.abs) {
            return Err(ResourceError::precondition(dest_uri, op, "destination contains the source"));
        }

        let source_meta = tokio::fs::symlink_metadata(&source.abs)
            .await
            .map_err(|e| ResourceError::from_io(source_uri, op, e))?;
        match tokio::fs::symlink_metadata(&dest.abs).await {
            Ok(_) if !options.overwrite => return Err(ResourceError::already_exists(dest_uri, op)),
            Ok(meta) if meta.is_dir() => {
                if !source_meta.is_dir() {
                    return Err(ResourceError::precondition(
                        dest_uri,
                        op,
                        "cannot replace a directory with a file",
                    ));
                }
                let mut entries = tokio::fs::read_dir(&dest.abs)
                    .await
                    .map_err(|e| ResourceError::from_io(dest_uri, op, e))?;
                let has_children = entries
                    .next_entry()
                    .await
                    .map_err(|e| ResourceError::from_io(dest_uri, op, e))?
                    .is_some();
                if has_children {
                    return Err(ResourceError::precondition(
                        dest_uri,
                        op,
                        "destination directory is not empty",
                    ));
                }
                tokio::fs::remove_dir(&dest.abs)
                    .await
                    .map_err(|e| ResourceError::from_io(dest_uri, op, e))?;
            }
            Ok(_) if source_meta.is_dir() => {
                return Err(ResourceError::precondition(
                    dest_uri,
                    op,
                    "cannot replace a file with a directory",
                ));
            }
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(ResourceError::from_io(dest_uri, op, e)),
        }
        self.ensure_parent(&dest, options.create_missing_directories, dest_uri, op)
            .await?;

        debug!(source = source_uri, destination = dest_uri, operation = %op, "moving resource");
        tokio::fs::rename(&source.abs, &dest.abs)
            .await
            .map_err(|e| ResourceError::from_io(source_uri, op, e))?;

        Ok(MoveResult {
            success: true,
            source_uri: self.connection.uri_for(&source.rel),
            destination_uri: self.connection.uri_for(&dest.rel),
            metadata: self.stat(&dest, dest_uri, op).await?,
        })
    }

    async fn rename_resource(
        &self,
        source_uri: &str,
        dest_uri: &str,
        options: MoveOptions,
    ) -> ResourceResult<MoveResult> {
        self.move_resource(source_uri, dest_uri, options)
            .await
            .map_err(|e| relabel(e, Operation::Rename))
    }

    async fn delete_resource(&self, uri: &str, options: DeleteOptions) -> ResourceResult<DeleteResult> {
        let op = Operation::Delete;
        self.require(Capability::Delete, uri, op)?;
        let target = self.resolve(uri, op).await?;
        if target.rel.is_empty() {
            return Err(ResourceError::precondition(uri, op, "cannot delete the data source root"));
        }

        let meta = tokio::fs::symlink_metadata(&target.abs)
            .await
            .map_err(|e| ResourceError::from_io(uri, op, e))?;

        let resource_type = if meta.is_dir() {
            if options.recursive {
                tokio::fs::remove_dir_all(&target.abs)
                    .await
                    .map_err(|e| ResourceError::from_io(uri, op, e))?;
            } else {
                let mut entries = tokio::fs::read_dir(&target.abs)
                    .await
                    .map_err(|e| ResourceError::from_io(uri, op, e))?;
                let has_children = entries
                    .next_entry()
                    .await
                    .map_err(|e| ResourceError::from_io(uri, op, e))?
                    .is_some();
                if has_children {
                    return Err(ResourceError::precondition(
                        uri,
                        op,
                        "directory is not empty; set recursive to delete it",
                    ));
                }
                tokio::fs::remove_dir(&target.abs)
                    .await
                    .map_err(|e| ResourceError::from_io(uri, op, e))?;
            }
            ResourceType::Directory
        } else {
            tokio::fs::remove_file(&target.abs)
                .await
                .map_err(|e| ResourceError::from_io(uri, op, e))?;
            if meta.is_file() {
                ResourceType::File
            } else {
                ResourceType::Other
            }
        };
        debug!(uri, operation = %op, recursive = options.recursive, "deleted resource");

        Ok(DeleteResult {
            success: true,
            uri: self.connection.uri_for(&target.rel),
            resource_type,
        })
    }

    async fn get_metadata(&self) -> ResourceResult<DataSourceMetadata> {
        let op = Operation::Metadata;
        let root_uri = self.connection.uri_for("");
        let walker = self.walker.clone();
        let mut metadata = tokio::task::spawn_blocking(move || scan::scan_blocking(&walker))
            .await
            .map_err(|e| ResourceError::handling(&root_uri, op, e))?;

        metadata.can_write = Some(scan::probe_write(self.root()).await);
        metadata.capabilities = self.capabilities.clone();
        Ok(metadata)
    }

    async fn suggest_resources(
        &self,
        partial: &str,
        options: SuggestOptions,
    ) -> ResourceResult<SuggestResult> {
        let op = Operation::Suggest;
        let uri = self.connection.uri_for(partial);
        self.require(Capability::List, &uri, op)?;
        let walker = match options.follow_symlinks {
            Some(follow) => self.walker.with_follow_links(follow),
            None => self.walker.clone(),
        };
        let connection = Arc::clone(&self.connection);
        let partial = partial.to_string();
        tokio::task::spawn_blocking(move || suggest::suggest_blocking(&walker, &connection, &partial, &options))
            .await
            .map_err(|e| ResourceError::handling(uri, op, e))?
    }
}

/// Normalize a root-relative path lexically. Returns `None` when a `..`
/// component would climb above the root.
pub(crate) fn normalize_relative(path: &str) -> Option<PathBuf> {
    let mut out = PathBuf::new();
    for component in Path::new(path).components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir | Component::RootDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    return None;
                }
            }
            Component::Prefix(_) => return None,
        }
    }
    Some(out)
}

/// Metadata for one filesystem entry.
pub(crate) fn build_metadata(
    connection: &DataSourceConnection,
    capabilities: &[Capability],
    rel: &str,
    abs: &Path,
    meta: &std::fs::Metadata,
) -> ResourceMetadata {
    let resource_type = if meta.is_dir() {
        ResourceType::Directory
    } else if meta.is_file() {
        ResourceType::File
    } else {
        ResourceType::Other
    };
    let mime_type = match resource_type {
        ResourceType::Directory => DIRECTORY_MIME,
        _ => detect_mime(abs),
    };
    let name = abs
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| connection.name.clone());

    ResourceMetadata {
        uri: connection.uri_for(rel),
        name,
        resource_type,
        mime_type: mime_type.to_string(),
        content_type: content_kind(mime_type),
        size: if meta.is_file() { meta.len() } else { 0 },
        last_modified: meta.modified().ok().map(DateTime::<Utc>::from),
        extra: Some(ResourceExtra {
            capabilities: capabilities.to_vec(),
            content_visible: resource_type == ResourceType::File && !is_binary_mime(mime_type),
            supports_range: resource_type == ResourceType::File,
            max_read_bytes: None,
        }),
    }
}

fn relabel(err: ResourceError, operation: Operation) -> ResourceError {
    match err {
        ResourceError::NotFound { path, .. } => ResourceError::NotFound { path, operation },
        ResourceError::SandboxViolation { path, .. } => ResourceError::SandboxViolation { path, operation },
        ResourceError::AlreadyExists { path, .. } => ResourceError::AlreadyExists { path, operation },
        ResourceError::Unsupported { path, reason, .. } => ResourceError::Unsupported { path, operation, reason },
        ResourceError::Precondition { path, reason, .. } => ResourceError::Precondition { path, operation, reason },
        ResourceError::InvalidUri { path, reason, .. } => ResourceError::InvalidUri { path, operation, reason },
        ResourceError::Handling { path, source, .. } => ResourceError::Handling { path, operation, source },
        other => other,
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Provider factory
// ═══════════════════════════════════════════════════════════════════════

/// Builds [`FilesystemAccessor`]s for the `FilesystemAccessor` provider class.
#[derive(Debug, Default, Clone, Copy)]
pub struct FilesystemProviderFactory;

impl ProviderFactory for FilesystemProviderFactory {
    fn create(
        &self,
        connection: Arc<DataSourceConnection>,
        entry: &ProviderEntry,
    ) -> Result<Arc<dyn ResourceAccessor>, RegistryError> {
        let capabilities = if entry.capabilities.is_empty() {
            Capability::ALL.to_vec()
        } else {
            entry.capabilities.clone()
        };
        let accessor = FilesystemAccessor::with_capabilities(connection, capabilities)?;
        Ok(Arc::new(accessor))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_source::FilesystemConfig;
    use crate::error::ErrorKind;
    use tempfile::TempDir;

    fn accessor(dir: &TempDir) -> FilesystemAccessor {
        let conn = DataSourceConnection::filesystem("local", FilesystemConfig::new(dir.path())).unwrap();
        FilesystemAccessor::new(Arc::new(conn)).unwrap()
    }

    #[test]
    fn normalize_rejects_escape() {
        assert_eq!(normalize_relative("a/./b/../c"), Some(PathBuf::from("a/c")));
        assert_eq!(normalize_relative(""), Some(PathBuf::new()));
        assert!(normalize_relative("../etc/passwd").is_none());
        assert!(normalize_relative("a/../../b").is_none());
    }

    #[tokio::test]
    async fn range_read_is_partial_and_trimmed() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.txt"), "0123456789").unwrap();
        let fs = accessor(&dir);

        let result = fs
            .load_resource(
                "filesystem-local:./a.txt",
                LoadOptions {
                    range: Some(crate::models::ByteRange { start: 7, end: Some(100) }),
                },
            )
            .await
            .unwrap();
        assert!(result.is_partial);
        assert_eq!(result.content.as_text(), Some("789"));
    }

    #[tokio::test]
    async fn binary_files_load_as_bytes() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("pic.png"), [0x89, b'P', b'N', b'G']).unwrap();
        let fs = accessor(&dir);

        let result = fs
            .load_resource("filesystem-local:./pic.png", LoadOptions::default())
            .await
            .unwrap();
        assert!(matches!(result.content, ResourceContent::Bytes(ref b) if b.len() == 4));
        assert!(!result.metadata.extra.unwrap().content_visible);
    }

    #[tokio::test]
    async fn foreign_uri_is_rejected() {
        let dir = TempDir::new().unwrap();
        let fs = accessor(&dir);
        let err = fs
            .load_resource("filesystem-other:./a.txt", LoadOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidUri);
        assert!(!fs.is_resource_within_data_source("filesystem-local:./../x").await);
        assert!(fs.is_resource_within_data_source("filesystem-local:./new/file.txt").await);
    }

    #[tokio::test]
    async fn capability_restrictions_are_enforced() {
        let dir = TempDir::new().unwrap();
        let conn = DataSourceConnection::filesystem("local", FilesystemConfig::new(dir.path())).unwrap();
        let fs = FilesystemAccessor::with_capabilities(
            Arc::new(conn),
            vec![Capability::Read, Capability::List],
        )
        .unwrap();

        let err = fs
            .write_resource("filesystem-local:./a.txt", "x".into(), WriteOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unsupported);
        assert!(!dir.path().join("a.txt").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn strict_root_blocks_symlink_escape() {
        let outside = TempDir::new().unwrap();
        std::fs::write(outside.path().join("secret.txt"), "s").unwrap();
        let dir = TempDir::new().unwrap();
        std::os::unix::fs::symlink(outside.path(), dir.path().join("link")).unwrap();
        let fs = accessor(&dir);

        let err = fs
            .load_resource("filesystem-local:./link/secret.txt", LoadOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SandboxViolation);

        let listed = fs.list_resources(ListOptions::default()).await.unwrap();
        assert!(listed.resources.is_empty());
    }

    #[tokio::test]
    async fn move_refuses_existing_destination() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.txt"), "a").unwrap();
        std::fs::write(dir.path().join("b.txt"), "b").unwrap();
        let fs = accessor(&dir);

        let err = fs
            .move_resource("filesystem-local:./a.txt", "filesystem-local:./b.txt", MoveOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);

        let renamed = fs
            .rename_resource(
                "filesystem-local:./a.txt",
                "filesystem-local:./nested/c.txt",
                MoveOptions {
                    overwrite: false,
                    create_missing_directories: true,
                },
            )
            .await
            .unwrap();
        assert_eq!(renamed.destination_uri, "filesystem-local:./nested/c.txt");
        assert!(dir.path().join("nested/c.txt").exists());
        assert!(!dir.path().join("a.txt").exists());
    }

    #[tokio::test]
    async fn range_splitting_a_character_returns_bytes() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("greek.txt"), "αβγ").unwrap();
        let fs = accessor(&dir);

        let result = fs
            .load_resource(
                "filesystem-local:./greek.txt",
                LoadOptions {
                    range: Some(crate::models::ByteRange { start: 1, end: Some(4) }),
                },
            )
            .await
            .unwrap();
        assert!(result.is_partial);
        assert_eq!(result.content, ResourceContent::Bytes(vec![0xb1, 0xce, 0xb2]));
    }

    #[tokio::test]
    async fn suggest_errors_name_a_uri() {
        let dir = TempDir::new().unwrap();
        let conn = DataSourceConnection::filesystem("local", FilesystemConfig::new(dir.path())).unwrap();
        let fs = FilesystemAccessor::with_capabilities(Arc::new(conn), vec![Capability::Read]).unwrap();

        let err = fs
            .suggest_resources("docs/", SuggestOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unsupported);
        assert_eq!(err.path(), "filesystem-local:./docs/");
    }

    #[tokio::test]
    async fn move_onto_an_ancestor_is_rejected() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("a")).unwrap();
        std::fs::write(dir.path().join("a/b.txt"), "b").unwrap();
        std::fs::write(dir.path().join("a/other.txt"), "o").unwrap();
        let fs = accessor(&dir);

        let err = fs
            .move_resource(
                "filesystem-local:./a/b.txt",
                "filesystem-local:./a",
                MoveOptions {
                    overwrite: true,
                    create_missing_directories: false,
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Precondition);
        assert!(dir.path().join("a/b.txt").exists());
        assert!(dir.path().join("a/other.txt").exists());
    }

    #[tokio::test]
    async fn overwrite_never_discards_a_directory_tree() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.txt"), "a").unwrap();
        std::fs::create_dir(dir.path().join("docs")).unwrap();
        std::fs::write(dir.path().join("docs/keep.md"), "k").unwrap();
        std::fs::create_dir(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src/lib.rs"), "").unwrap();
        std::fs::create_dir(dir.path().join("empty")).unwrap();
        let fs = accessor(&dir);
        let overwrite = MoveOptions {
            overwrite: true,
            create_missing_directories: false,
        };

        let err = fs
            .move_resource("filesystem-local:./a.txt", "filesystem-local:./docs", overwrite.clone())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Precondition);

        let err = fs
            .move_resource("filesystem-local:./src", "filesystem-local:./docs", overwrite.clone())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Precondition);
        assert!(dir.path().join("docs/keep.md").exists());
        assert!(dir.path().join("a.txt").exists());

        let err = fs
            .move_resource("filesystem-local:./src", "filesystem-local:./a.txt", overwrite.clone())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Precondition);
        assert!(dir.path().join("src/lib.rs").exists());

        fs.move_resource("filesystem-local:./src", "filesystem-local:./empty", overwrite)
            .await
            .unwrap();
        assert!(dir.path().join("empty/lib.rs").exists());
        assert!(!dir.path().join("src").exists());
    }
}

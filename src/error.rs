//! Error types for resource operations.
//!
//! Every domain error carries the resource path and the operation that
//! failed, so a caller-visible error always identifies both. Unexpected
//! backend failures are wrapped into [`ResourceError::Handling`] rather than
//! leaking backend-specific error types.

use serde::Serialize;
use std::fmt;
use std::io;
use std::sync::Arc;
use thiserror::Error;

/// The operation that was being performed when an error occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Operation {
    Exists,
    Load,
    List,
    Find,
    Write,
    Edit,
    Move,
    Rename,
    Delete,
    Metadata,
    Suggest,
    Resolve,
    Connect,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Operation::Exists => "exists",
            Operation::Load => "load",
            Operation::List => "list",
            Operation::Find => "find",
            Operation::Write => "write",
            Operation::Edit => "edit",
            Operation::Move => "move",
            Operation::Rename => "rename",
            Operation::Delete => "delete",
            Operation::Metadata => "metadata",
            Operation::Suggest => "suggest",
            Operation::Resolve => "resolve",
            Operation::Connect => "connect",
        };
        f.write_str(s)
    }
}

/// Coarse classification of a [`ResourceError`], for callers that branch
/// on the kind of failure rather than its message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    NotFound,
    SandboxViolation,
    AlreadyExists,
    Unsupported,
    Precondition,
    InvalidPattern,
    NoEffectiveChange,
    InvalidUri,
    Handling,
}

/// Errors returned by resource accessors and the session registry.
///
/// The type is `Clone` so a single construction failure can be handed to
/// every waiter of a shared in-flight future.
#[derive(Debug, Clone, Error)]
pub enum ResourceError {
    /// The addressed resource does not exist.
    #[error("{operation}: resource not found: {path}")]
    NotFound { path: String, operation: Operation },

    /// The path resolves outside the data source root.
    #[error("{operation}: path escapes data source root: {path}")]
    SandboxViolation { path: String, operation: Operation },

    /// The destination exists and overwrite was not requested.
    #[error("{operation}: resource already exists: {path}")]
    AlreadyExists { path: String, operation: Operation },

    /// The accessor does not implement this capability or edit kind.
    #[error("{operation}: unsupported for {path}: {reason}")]
    Unsupported {
        path: String,
        operation: Operation,
        reason: String,
    },

    /// A precondition of the operation was not met.
    #[error("{operation}: {reason}: {path}")]
    Precondition {
        path: String,
        operation: Operation,
        reason: String,
    },

    /// A search pattern could not be compiled.
    #[error("{operation}: invalid pattern '{pattern}' under {path}: {message}")]
    InvalidPattern {
        path: String,
        operation: Operation,
        pattern: String,
        message: String,
    },

    /// An edit batch produced no change to an existing resource.
    #[error("{operation}: no changes were made to {path}")]
    NoEffectiveChange { path: String, operation: Operation },

    /// The resource URI could not be parsed or is not owned by any data source.
    #[error("{operation}: invalid resource uri '{path}': {reason}")]
    InvalidUri {
        path: String,
        operation: Operation,
        reason: String,
    },

    /// Any other failure while handling the resource.
    #[error("{operation}: failed handling {path}: {source}")]
    Handling {
        path: String,
        operation: Operation,
        #[source]
        source: Arc<io::Error>,
    },
}

impl ResourceError {
    pub fn not_found(path: impl Into<String>, operation: Operation) -> Self {
        Self::NotFound {
            path: path.into(),
            operation,
        }
    }

    pub fn sandbox(path: impl Into<String>, operation: Operation) -> Self {
        Self::SandboxViolation {
            path: path.into(),
            operation,
        }
    }

    pub fn already_exists(path: impl Into<String>, operation: Operation) -> Self {
        Self::AlreadyExists {
            path: path.into(),
            operation,
        }
    }

    pub fn unsupported(
        path: impl Into<String>,
        operation: Operation,
        reason: impl Into<String>,
    ) -> Self {
        Self::Unsupported {
            path: path.into(),
            operation,
            reason: reason.into(),
        }
    }

    pub fn precondition(
        path: impl Into<String>,
        operation: Operation,
        reason: impl Into<String>,
    ) -> Self {
        Self::Precondition {
            path: path.into(),
            operation,
            reason: reason.into(),
        }
    }

    pub fn invalid_pattern(
        path: impl Into<String>,
        operation: Operation,
        pattern: impl Into<String>,
        message: impl fmt::Display,
    ) -> Self {
        Self::InvalidPattern {
            path: path.into(),
            operation,
            pattern: pattern.into(),
            message: message.to_string(),
        }
    }

    pub fn no_change(path: impl Into<String>, operation: Operation) -> Self {
        Self::NoEffectiveChange {
            path: path.into(),
            operation,
        }
    }

    pub fn invalid_uri(
        uri: impl Into<String>,
        operation: Operation,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidUri {
            path: uri.into(),
            operation,
            reason: reason.into(),
        }
    }

    /// Wrap an arbitrary failure message as a handling error.
    pub fn handling(
        path: impl Into<String>,
        operation: Operation,
        message: impl fmt::Display,
    ) -> Self {
        Self::Handling {
            path: path.into(),
            operation,
            source: Arc::new(io::Error::other(message.to_string())),
        }
    }

    /// Map an I/O error onto the taxonomy.
    ///
    /// `NotFound` and `AlreadyExists` keep their domain meaning; everything
    /// else becomes a [`ResourceError::Handling`].
    pub fn from_io(path: impl Into<String>, operation: Operation, err: io::Error) -> Self {
        let path = path.into();
        match err.kind() {
            io::ErrorKind::NotFound => Self::NotFound { path, operation },
            io::ErrorKind::AlreadyExists => Self::AlreadyExists { path, operation },
            _ => Self::Handling {
                path,
                operation,
                source: Arc::new(err),
            },
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::SandboxViolation { .. } => ErrorKind::SandboxViolation,
            Self::AlreadyExists { .. } => ErrorKind::AlreadyExists,
            Self::Unsupported { .. } => ErrorKind::Unsupported,
            Self::Precondition { .. } => ErrorKind::Precondition,
            Self::InvalidPattern { .. } => ErrorKind::InvalidPattern,
            Self::NoEffectiveChange { .. } => ErrorKind::NoEffectiveChange,
            Self::InvalidUri { .. } => ErrorKind::InvalidUri,
            Self::Handling { .. } => ErrorKind::Handling,
        }
    }

    /// The resource path (or URI) the error refers to.
    pub fn path(&self) -> &str {
        match self {
            Self::NotFound { path, .. }
            | Self::SandboxViolation { path, .. }
            | Self::AlreadyExists { path, .. }
            | Self::Unsupported { path, .. }
            | Self::Precondition { path, .. }
            | Self::InvalidPattern { path, .. }
            | Self::NoEffectiveChange { path, .. }
            | Self::InvalidUri { path, .. }
            | Self::Handling { path, .. } => path,
        }
    }

    pub fn operation(&self) -> Operation {
        match self {
            Self::NotFound { operation, .. }
            | Self::SandboxViolation { operation, .. }
            | Self::AlreadyExists { operation, .. }
            | Self::Unsupported { operation, .. }
            | Self::Precondition { operation, .. }
            | Self::InvalidPattern { operation, .. }
            | Self::NoEffectiveChange { operation, .. }
            | Self::InvalidUri { operation, .. }
            | Self::Handling { operation, .. } => *operation,
        }
    }
}

/// Result alias used throughout the accessor layer.
pub type ResourceResult<T> = Result<T, ResourceError>;

/// Errors raised while building or querying the provider and data source
/// registries.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The manifest file is missing or cannot be parsed as a whole.
    #[error("provider manifest {path}: {reason}")]
    Manifest { path: String, reason: String },

    #[error("no enabled provider for type '{provider_type}' via {access_method}")]
    ProviderNotFound {
        provider_type: String,
        access_method: String,
    },

    #[error("no factory registered for provider class '{0}'")]
    FactoryNotFound(String),

    #[error("data source '{0}' is already registered")]
    DuplicateDataSource(String),

    #[error("invalid configuration for data source '{name}': {reason}")]
    InvalidConnection { name: String, reason: String },

    #[error(transparent)]
    Resource(#[from] ResourceError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_not_found_maps_to_domain_kind() {
        let err = ResourceError::from_io(
            "docs/a.md",
            Operation::Load,
            io::Error::new(io::ErrorKind::NotFound, "gone"),
        );
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.path(), "docs/a.md");
        assert_eq!(err.operation(), Operation::Load);
    }

    #[test]
    fn unexpected_io_is_wrapped_with_context() {
        let err = ResourceError::from_io(
            "docs/a.md",
            Operation::Write,
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        );
        assert_eq!(err.kind(), ErrorKind::Handling);
        let msg = err.to_string();
        assert!(msg.contains("write"));
        assert!(msg.contains("docs/a.md"));
        assert!(msg.contains("denied"));
    }

    #[test]
    fn errors_clone_for_shared_waiters() {
        let err = ResourceError::handling("x", Operation::Connect, "boom");
        let copy = err.clone();
        assert_eq!(copy.to_string(), err.to_string());
    }
}

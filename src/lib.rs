//! # Resource Harness
//!
//! A uniform resource-access layer for AI agents.
//!
//! Resource Harness lets an agent read, write, list, search, edit, move and
//! delete "resources" (files, documents, pages) across heterogeneous data
//! sources through one contract. Each data source is a validated binding of
//! a provider to its configuration; providers are discovered from a
//! manifest and selected by `(providerType, accessMethod)`.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐   ┌────────────────┐   ┌──────────────────┐
//! │  Caller   │──▶│ EditorManager  │──▶│  ProjectEditor   │
//! │ (uri, op) │   │ (single-flight)│   │ routes by URI    │
//! └───────────┘   └────────────────┘   └────────┬─────────┘
//!                                               │
//!                        ┌──────────────────────┤
//!                        ▼                      ▼
//!               ┌──────────────────┐   ┌──────────────────┐
//!               │FilesystemAccessor│   │ BridgedAccessor  │
//!               │ sandboxed local  │   │ remote server    │
//!               └──────────────────┘   └──────────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`logging`] | `tracing` subscriber setup |
//! | [`models`] | Resource and result types |
//! | [`error`] | Typed accessor and registry errors |
//! | [`uri`] | Resource URI parsing |
//! | [`registry`] | Provider manifest and registry |
//! | [`data_source`] | Data source connections |
//! | [`traits`] | The `ResourceAccessor` contract |
//! | [`accessor_fs`] | Filesystem accessor |
//! | [`accessor_bridged`] | Protocol-bridged accessor |
//! | [`edit`] | Edit operation batcher |
//! | [`session`] | Single-flight session registry |
//! | [`project`] | Per-project session object |
//! | [`harness`] | Process-level wiring |
//! | [`sources`] | Data source health |

pub mod accessor_bridged;
pub mod accessor_fs;
pub mod config;
pub mod data_source;
pub mod edit;
pub mod error;
pub mod exclude;
pub mod harness;
pub mod logging;
pub mod mime;
pub mod models;
pub mod project;
pub mod registry;
pub mod scan;
pub mod search;
pub mod session;
pub mod sources;
pub mod suggest;
pub mod traits;
pub mod uri;
mod walk;

pub use error::{ErrorKind, Operation, RegistryError, ResourceError, ResourceResult};
pub use harness::Harness;
pub use traits::ResourceAccessor;

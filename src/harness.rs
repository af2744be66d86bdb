//! Process-level wiring: config in, sessions out.
//!
//! A [`Harness`] owns the provider registry, the configured data sources,
//! the bridged server table, and the session manager. Callers open a
//! session per (project, collaboration) and route operations through the
//! returned [`ProjectEditor`].

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::accessor_bridged::{BridgedProviderFactory, BRIDGED_PROVIDER_CLASS};
use crate::config::{load_config, Config};
use crate::data_source::DataSourceRegistry;
use crate::error::ResourceResult;
use crate::project::{ProjectEditor, ProjectEditorFactory};
use crate::registry::ProviderRegistry;
use crate::session::{EditorManager, SessionKey};
use crate::sources::{source_statuses, SourceStatus};
use crate::traits::SharedBridgedConnection;

pub struct Harness {
    sources: DataSourceRegistry,
    bridged: Arc<BridgedProviderFactory>,
    sessions: EditorManager<ProjectEditorFactory>,
}

impl Harness {
    pub fn load(path: &Path) -> Result<Self> {
        let config = load_config(path)?;
        Self::from_config(&config)
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let mut providers =
            ProviderRegistry::from_config(&config.registry).with_context(|| "Failed to load provider registry")?;
        let bridged = Arc::new(BridgedProviderFactory::new());
        providers.register_factory(BRIDGED_PROVIDER_CLASS, bridged.clone());

        let sources = DataSourceRegistry::from_config(config).with_context(|| "Failed to register data sources")?;
        info!(
            variant = providers.variant(),
            data_sources = sources.len(),
            "harness ready"
        );

        let factory = ProjectEditorFactory::new(Arc::new(providers));
        Ok(Self {
            sources,
            bridged,
            sessions: EditorManager::new(factory, config.sessions.current_tracking),
        })
    }

    pub fn providers(&self) -> &Arc<ProviderRegistry> {
        self.sessions.factory().providers()
    }

    pub fn data_sources(&self) -> &DataSourceRegistry {
        &self.sources
    }

    /// Make a bridged server available to sessions opened from now on.
    pub fn register_server(&self, server: SharedBridgedConnection) {
        self.bridged.register_server(server);
    }

    pub fn sessions(&self) -> &EditorManager<ProjectEditorFactory> {
        &self.sessions
    }

    /// Open (or join) the session for a project and collaboration.
    pub async fn open_session(&self, project_id: &str, collaboration_id: &str) -> ResourceResult<Arc<ProjectEditor>> {
        let key = SessionKey::new(project_id, collaboration_id);
        self.sessions
            .get_or_create_editor(&key, self.sources.clone())
            .await
    }

    pub async fn close_session(&self, project_id: &str, collaboration_id: &str) -> bool {
        let key = SessionKey::new(project_id, collaboration_id);
        self.sessions.release_editor(&key).await.is_some()
    }

    pub fn source_statuses(&self) -> Vec<SourceStatus> {
        source_statuses(&self.sources, self.providers())
    }
}

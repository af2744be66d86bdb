//! Health view of configured data sources.

use serde::Serialize;

use crate::data_source::{AccessMethod, DataSourceConnection, DataSourceRegistry};
use crate::models::Capability;
use crate::registry::ProviderRegistry;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceStatus {
    pub name: String,
    pub provider_type: String,
    pub access_method: AccessMethod,
    /// `OK`, or why the source cannot be used.
    pub status: String,
    pub healthy: bool,
    /// Capabilities declared by the provider; empty when none resolves.
    pub capabilities: Vec<Capability>,
}

/// One status row per data source, in name order.
pub fn source_statuses(sources: &DataSourceRegistry, providers: &ProviderRegistry) -> Vec<SourceStatus> {
    sources
        .connections()
        .map(|conn| status_of(conn, providers))
        .collect()
}

fn status_of(conn: &DataSourceConnection, providers: &ProviderRegistry) -> SourceStatus {
    let provider = providers.get_provider(&conn.provider_type, conn.access_method);

    let problem = match (provider, conn.filesystem_config()) {
        (None, _) => Some("NO PROVIDER".to_string()),
        (Some(_), Some(fs)) if !fs.data_source_root.is_dir() => {
            Some("NOT CONFIGURED (root does not exist)".to_string())
        }
        _ => None,
    };

    SourceStatus {
        name: conn.name.clone(),
        provider_type: conn.provider_type.clone(),
        access_method: conn.access_method,
        healthy: problem.is_none(),
        status: problem.unwrap_or_else(|| "OK".to_string()),
        capabilities: provider.map(|p| p.capabilities.clone()).unwrap_or_default(),
    }
}

//! Veracity Learning plugin: access-key Basic auth, optional tenant
//! path segment, endpoint normalization that strips a trailing `/xapi`.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use learnlrs_xapi::{QueryFilter, Statement};

use crate::config::{normalize_endpoint, PluginConfig};
use crate::credential::{Credential, CredentialProvider};
use crate::error::Result;
use crate::plugin::base::{actor_from_config, XapiBackend};
use crate::plugin::{AuthKind, HealthStatus, LrsPlugin, PluginDescriptor, StatementId};
use crate::stream::StatementStream;
use crate::transport::Transport;

pub static DESCRIPTOR: PluginDescriptor = PluginDescriptor {
    name: "veracity",
    description: "Veracity Learning - cloud or self-hosted xAPI Learning Record Store",
    required_keys: &["endpoint", "username", "password", "actor_id"],
    auth: AuthKind::AccessKey,
    max_page_size: 50,
};

/// Plugin for the Veracity Learning LRS.
pub struct VeracityPlugin {
    backend: Arc<XapiBackend>,
}

impl VeracityPlugin {
    pub fn from_config(config: &PluginConfig) -> Result<Arc<dyn LrsPlugin>> {
        let endpoint = clean_endpoint(config.require(DESCRIPTOR.name, "endpoint")?)?;
        let username = config.require(DESCRIPTOR.name, "username")?;
        let password = config.require(DESCRIPTOR.name, "password")?;

        // Veracity LRS instances may be namespaced by tenant.
        let prefix = match config.get("tenant") {
            Some(tenant) => format!("/{tenant}/xapi"),
            None => "/xapi".to_string(),
        };

        let credentials = CredentialProvider::Static(Credential::basic(username, password));
        let backend = XapiBackend::new(
            endpoint,
            format!("{prefix}/statements"),
            format!("{prefix}/about"),
            Transport::from_config(config)?,
            credentials,
            actor_from_config(config, DESCRIPTOR.name)?,
        );

        Ok(Arc::new(Self {
            backend: Arc::new(backend),
        }))
    }
}

/// Veracity endpoints commonly arrive with a `/xapi` suffix; strip it
/// so the path prefix is not duplicated.
fn clean_endpoint(raw: &str) -> Result<String> {
    let endpoint = normalize_endpoint(raw)?;
    if let Some(stripped) = endpoint.strip_suffix("/xapi") {
        debug!("stripped /xapi suffix from veracity endpoint");
        return Ok(stripped.to_string());
    }
    Ok(endpoint)
}

#[async_trait]
impl LrsPlugin for VeracityPlugin {
    fn descriptor(&self) -> &'static PluginDescriptor {
        &DESCRIPTOR
    }

    async fn send(&self, statement: &Statement) -> Result<StatementId> {
        self.backend.send(statement).await
    }

    async fn query(&self, filter: QueryFilter) -> Result<StatementStream> {
        self.backend.query(filter, &DESCRIPTOR)
    }

    fn list_verbs(&self) -> std::collections::BTreeMap<String, String> {
        self.backend.vocabulary().to_uri_map()
    }

    async fn health(&self) -> Result<HealthStatus> {
        Ok(self.backend.health().await)
    }
}

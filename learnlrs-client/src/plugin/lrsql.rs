//! SQL LRS plugin: Basic auth, `/xapi/statements` path convention.

use std::sync::Arc;

use async_trait::async_trait;
use learnlrs_xapi::{QueryFilter, Statement};

use crate::config::{normalize_endpoint, PluginConfig};
use crate::credential::{Credential, CredentialProvider};
use crate::error::Result;
use crate::plugin::base::{actor_from_config, XapiBackend};
use crate::plugin::{AuthKind, HealthStatus, LrsPlugin, PluginDescriptor, StatementId};
use crate::stream::StatementStream;
use crate::transport::Transport;

pub static DESCRIPTOR: PluginDescriptor = PluginDescriptor {
    name: "lrsql",
    description: "SQL LRS - SQLite-backed Learning Record Store",
    required_keys: &["endpoint", "key", "secret", "actor_id"],
    auth: AuthKind::Basic,
    max_page_size: 50,
};

/// Plugin for the SQL LRS implementation.
pub struct LrsqlPlugin {
    backend: Arc<XapiBackend>,
}

impl LrsqlPlugin {
    pub fn from_config(config: &PluginConfig) -> Result<Arc<dyn LrsPlugin>> {
        let endpoint = normalize_endpoint(config.require(DESCRIPTOR.name, "endpoint")?)?;
        let key = config.require(DESCRIPTOR.name, "key")?;
        let secret = config.require(DESCRIPTOR.name, "secret")?;

        let credentials = CredentialProvider::Static(Credential::basic(key, secret));
        let backend = XapiBackend::new(
            endpoint,
            "/xapi/statements",
            "/xapi/about",
            Transport::from_config(config)?,
            credentials,
            actor_from_config(config, DESCRIPTOR.name)?,
        );

        Ok(Arc::new(Self {
            backend: Arc::new(backend),
        }))
    }
}

#[async_trait]
impl LrsPlugin for LrsqlPlugin {
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

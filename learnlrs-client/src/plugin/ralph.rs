//! Ralph LRS plugin: Basic or OIDC client-credentials auth, `/xAPI/`
//! path convention (capital X, trailing slash on statements).

use std::sync::Arc;

use async_trait::async_trait;
use secrecy::SecretString;
use tracing::debug;

use learnlrs_xapi::{QueryFilter, Statement};

use crate::config::{normalize_endpoint, PluginConfig};
use crate::credential::{
    Credential, CredentialProvider, HttpTokenExchanger, OidcConfig, OidcProvider,
};
use crate::error::{ConfigError, Result};
use crate::plugin::base::{actor_from_config, XapiBackend};
use crate::plugin::{AuthKind, HealthStatus, LrsPlugin, PluginDescriptor, StatementId};
use crate::stream::StatementStream;
use crate::transport::Transport;

pub static DESCRIPTOR: PluginDescriptor = PluginDescriptor {
    name: "ralph",
    description: "Ralph LRS - open-source Learning Record Store by France Universite Numerique",
    required_keys: &["endpoint", "actor_id"],
    auth: AuthKind::BasicOrOidc,
    max_page_size: 50,
};

/// Plugin for the Ralph LRS implementation.
pub struct RalphPlugin {
    backend: Arc<XapiBackend>,
}

impl RalphPlugin {
    pub fn from_config(config: &PluginConfig) -> Result<Arc<dyn LrsPlugin>> {
        let endpoint = normalize_endpoint(config.require(DESCRIPTOR.name, "endpoint")?)?;
        let credentials = detect_credentials(config)?;
        let backend = XapiBackend::new(
            endpoint,
            "/xAPI/statements/",
            "/xAPI/about",
            Transport::from_config(config)?,
            credentials,
            actor_from_config(config, DESCRIPTOR.name)?,
        );

        Ok(Arc::new(Self {
            backend: Arc::new(backend),
        }))
    }
}

/// Any OIDC key present selects OIDC; otherwise Basic.
fn detect_credentials(config: &PluginConfig) -> Result<CredentialProvider> {
    if config.contains("oidc_token_url") || config.contains("oidc_client_id") {
        let oidc = OidcConfig {
            token_url: config.require(DESCRIPTOR.name, "oidc_token_url")?.to_string(),
            client_id: config.require(DESCRIPTOR.name, "oidc_client_id")?.to_string(),
            client_secret: SecretString::from(
                config.require(DESCRIPTOR.name, "oidc_client_secret")?.to_string(),
            ),
            scope: config.get("oidc_scope").unwrap_or("openid").to_string(),
        };
        debug!(token_url = %oidc.token_url, "ralph plugin using OIDC authentication");

        let client = reqwest::Client::builder()
            .timeout(config.timeout()?)
            .build()
            .map_err(|e| ConfigError::Invalid(format!("failed to build HTTP client: {e}")))?;
        let exchanger = Arc::new(HttpTokenExchanger::new(client));
        return Ok(CredentialProvider::Oidc(OidcProvider::new(oidc, exchanger)));
    }

    let username = config.require(DESCRIPTOR.name, "username")?;
    let password = config.require(DESCRIPTOR.name, "password")?;
    debug!("ralph plugin using basic authentication");
    Ok(CredentialProvider::Static(Credential::basic(
        username, password,
    )))
}

#[async_trait]
impl LrsPlugin for RalphPlugin {
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

//! Shared backend machinery used by every plugin variant.
//!
//! Variants differ only in path conventions and credentials; the
//! send/query/health mechanics live here once.

use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, info};
use url::{Position, Url};

use learnlrs_xapi::{Actor, QueryFilter, Statement, VerbVocabulary};

use crate::config::PluginConfig;
use crate::credential::CredentialProvider;
use crate::error::{ConfigError, Result};
use crate::plugin::{HealthStatus, PluginDescriptor, StatementId};
use crate::stream::{paginate, PageFetcher, StatementPage, StatementStream};
use crate::translate::translate;
use crate::transport::{HttpRequest, Transport};

/// Default account home page when a deployment does not configure one.
pub(crate) const DEFAULT_HOME_PAGE: &str = "https://learnlrs.example.com";

/// Actor identity from the shared config keys `actor_id` (required)
/// and `home_page` (optional).
pub(crate) fn actor_from_config(config: &PluginConfig, plugin: &str) -> Result<Actor> {
    let actor_id = config.require(plugin, "actor_id")?;
    let home_page = config.get("home_page").unwrap_or(DEFAULT_HOME_PAGE);
    Ok(Actor::new(home_page, actor_id))
}

/// xAPI statements response envelope.
#[derive(Debug, Deserialize)]
struct StatementsResponse {
    #[serde(default)]
    statements: Vec<Statement>,
    #[serde(default)]
    more: Option<String>,
}

/// One configured backend connection.
pub(crate) struct XapiBackend {
    endpoint: String,
    statements_path: String,
    about_path: String,
    transport: Transport,
    credentials: CredentialProvider,
    actor: Actor,
    vocabulary: VerbVocabulary,
}

impl XapiBackend {
    pub(crate) fn new(
        endpoint: String,
        statements_path: impl Into<String>,
        about_path: impl Into<String>,
        transport: Transport,
        credentials: CredentialProvider,
        actor: Actor,
    ) -> Self {
        Self {
            endpoint,
            statements_path: statements_path.into(),
            about_path: about_path.into(),
            transport,
            credentials,
            actor,
            vocabulary: VerbVocabulary::builtin(),
        }
    }

    pub(crate) fn vocabulary(&self) -> &VerbVocabulary {
        &self.vocabulary
    }

    fn statements_url(&self) -> String {
        format!("{}{}", self.endpoint, self.statements_path)
    }

    /// Scheme + authority of the endpoint, for resolving the relative
    /// `more` continuation URL.
    fn origin(&self) -> Result<String> {
        let url = Url::parse(&self.endpoint)
            .map_err(|e| ConfigError::Invalid(format!("invalid endpoint: {e}")))?;
        Ok(url[..Position::BeforePath].to_string())
    }

    /// POST one statement; 2xx only. The returned id is the backend's
    /// where it issues one, else the statement's own UUID.
    pub(crate) async fn send(&self, statement: &Statement) -> Result<StatementId> {
        let body = serde_json::to_value(statement)
            .map_err(|e| crate::error::TransportError::Body(e.to_string()))?;
        let request = HttpRequest::post(self.statements_url()).with_body(body);

        let response = self.transport.execute(&request, &self.credentials).await?;
        let id = parse_send_response(&response.body, statement);
        info!(id = %id, status = response.status, "statement stored");
        Ok(id)
    }

    /// Translate the filter and return a lazy paginated stream.
    pub(crate) fn query(
        self: &Arc<Self>,
        filter: QueryFilter,
        descriptor: &PluginDescriptor,
    ) -> Result<StatementStream> {
        let params = translate(&filter, descriptor, &self.vocabulary, &self.actor)?;
        let limit = filter
            .limit
            .unwrap_or(descriptor.max_page_size)
            .min(descriptor.max_page_size);

        debug!(plugin = descriptor.name, limit, "querying statements");
        let fetcher = Arc::new(HttpPageFetcher {
            backend: self.clone(),
            params,
        });
        Ok(paginate(fetcher, limit))
    }

    /// Probe the backend's about resource.
    pub(crate) async fn health(&self) -> HealthStatus {
        let request = HttpRequest::get(format!("{}{}", self.endpoint, self.about_path));
        match self.transport.execute(&request, &self.credentials).await {
            Ok(_) => HealthStatus::Healthy,
            Err(e) => HealthStatus::Unhealthy {
                reason: e.to_string(),
            },
        }
    }
}

/// Backends answer a statement POST with an id array, an object
/// carrying `id`, or nothing useful; normalize all three.
fn parse_send_response(body: &str, statement: &Statement) -> StatementId {
    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(serde_json::Value::Array(ids)) => ids
            .first()
            .and_then(|id| id.as_str())
            .map(StatementId::new)
            .unwrap_or_else(|| StatementId::from(statement.id)),
        Ok(serde_json::Value::Object(map)) => map
            .get("id")
            .and_then(|id| id.as_str())
            .map(StatementId::new)
            .unwrap_or_else(|| StatementId::from(statement.id)),
        _ => StatementId::from(statement.id),
    }
}

struct HttpPageFetcher {
    backend: Arc<XapiBackend>,
    params: Vec<(String, String)>,
}

#[async_trait::async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch(&self, cursor: Option<&str>) -> Result<StatementPage> {
        let request = match cursor {
            None => HttpRequest::get(self.backend.statements_url())
                .with_query(self.params.clone()),
            Some(more) => HttpRequest::get(format!("{}{}", self.backend.origin()?, more)),
        };

        let response = self
            .backend
            .transport
            .execute(&request, &self.backend.credentials)
            .await?;
        let parsed: StatementsResponse = response.json()?;

        Ok(StatementPage {
            statements: parsed.statements,
            more: parsed.more,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use learnlrs_xapi::{Activity, Verb};

    fn statement() -> Statement {
        Statement {
            id: uuid::Uuid::new_v4(),
            actor: Actor::new("https://lrs.example.com", "a1"),
            verb: Verb::new("http://adlnet.gov/expapi/verbs/practiced", "practiced"),
            object: Activity::new("https://example.org/activities/algebra"),
            result: None,
            context: None,
            timestamp: chrono::Utc::now(),
        }
    }

    #[test]
    fn send_response_array_takes_first_id() {
        let id = parse_send_response(r#"["abc-1", "abc-2"]"#, &statement());
        assert_eq!(id.as_str(), "abc-1");
    }

    #[test]
    fn send_response_object_takes_id_member() {
        let id = parse_send_response(r#"{"id": "abc-1", "stored": true}"#, &statement());
        assert_eq!(id.as_str(), "abc-1");
    }

    #[test]
    fn send_response_fallback_is_statement_uuid() {
        let statement = statement();
        let id = parse_send_response("", &statement);
        assert_eq!(id.as_str(), statement.id.to_string());

        let id = parse_send_response("[]", &statement);
        assert_eq!(id.as_str(), statement.id.to_string());
    }

    #[test]
    fn actor_from_config_requires_actor_id() {
        let err = actor_from_config(&PluginConfig::new(), "lrsql").unwrap_err();
        assert!(err.to_string().contains("actor_id"));
    }

    #[test]
    fn actor_from_config_uses_default_home_page() {
        let config = PluginConfig::new().set("actor_id", "a1");
        let actor = actor_from_config(&config, "lrsql").unwrap();
        assert_eq!(actor.account.home_page, DEFAULT_HOME_PAGE);
        assert_eq!(actor.account.name, "a1");
    }

    #[test]
    fn actor_from_config_honors_home_page_override() {
        let config = PluginConfig::new()
            .set("actor_id", "a1")
            .set("home_page", "https://school.example.org");
        let actor = actor_from_config(&config, "lrsql").unwrap();
        assert_eq!(actor.account.home_page, "https://school.example.org");
    }

    #[test]
    fn statements_response_tolerates_missing_members() {
        let parsed: StatementsResponse = serde_json::from_str("{}").unwrap();
        assert!(parsed.statements.is_empty());
        assert!(parsed.more.is_none());
    }
}

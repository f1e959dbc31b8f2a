//! Inbound service facade.
//!
//! [`LrsService`] is what the external tool-protocol layer calls:
//! record a statement, query statements, list verbs, probe health.
//! Validation strictly precedes I/O, so a rejected call leaves no
//! partial side effects.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use learnlrs_xapi::{Level, QueryFilter, Score, StatementBuilder, StatementDraft, ValidationError};

use crate::error::Result;
use crate::plugin::{HealthStatus, LrsPlugin, StatementId};
use crate::stream::StatementStream;

/// Facade over the statement engine and the active plugin.
pub struct LrsService {
    builder: StatementBuilder,
    actor_id: String,
    plugin: Arc<dyn LrsPlugin>,
}

impl LrsService {
    pub fn new(
        builder: StatementBuilder,
        actor_id: impl Into<String>,
        plugin: Arc<dyn LrsPlugin>,
    ) -> Self {
        Self {
            builder,
            actor_id: actor_id.into(),
            plugin,
        }
    }

    /// Record one learning-evidence statement.
    ///
    /// `level` is an optional mastery band (0-3) or raw score; `extras`
    /// is an optional JSON object (or a JSON string encoding one) whose
    /// members become result extensions. The reserved `score_max` key
    /// scales a raw level and is not forwarded.
    pub async fn record_statement(
        &self,
        verb_alias: &str,
        object_id: &str,
        level: Option<Level>,
        extras: Option<serde_json::Value>,
    ) -> Result<StatementId> {
        let mut extras = match extras {
            Some(value) => parse_extras(value)?,
            None => BTreeMap::new(),
        };

        let mut draft = StatementDraft::new(&self.actor_id, verb_alias, object_id);

        if let Some(level) = level {
            let score_max = extras
                .remove("score_max")
                .and_then(|value| value.as_f64());
            let score = Score::from_level(level, score_max)?;
            draft.success = score.derived_success();
            draft.score = Some(score);
        }

        if !extras.is_empty() {
            draft.extensions = Some(extras);
        }

        self.record(draft).await
    }

    /// Build, validate and send a prepared draft.
    pub async fn record(&self, draft: StatementDraft) -> Result<StatementId> {
        let statement = self.builder.build(draft)?;
        debug!(id = %statement.id, verb = %statement.verb.id, "recording statement");
        self.plugin.send(&statement).await
    }

    /// Query statements for the configured actor.
    pub async fn query_statements(&self, filter: QueryFilter) -> Result<StatementStream> {
        filter.validate()?;
        self.plugin.query(filter).await
    }

    /// Snapshot of the verb vocabulary (alias -> URI).
    pub fn list_verbs(&self) -> BTreeMap<String, String> {
        self.plugin.list_verbs()
    }

    /// Probe the backend.
    pub async fn health(&self) -> Result<HealthStatus> {
        self.plugin.health().await
    }
}

/// Accept extras as a JSON object, or a JSON string encoding one.
fn parse_extras(
    value: serde_json::Value,
) -> Result<BTreeMap<String, serde_json::Value>> {
    let object = match value {
        serde_json::Value::Object(map) => map,
        serde_json::Value::String(raw) => match serde_json::from_str(&raw) {
            Ok(serde_json::Value::Object(map)) => map,
            Ok(_) => {
                return Err(
                    ValidationError::InvalidExtras("expected a JSON object".to_string()).into(),
                );
            }
            Err(e) => return Err(ValidationError::InvalidExtras(e.to_string()).into()),
        },
        other => {
            return Err(ValidationError::InvalidExtras(format!(
                "expected a JSON object, got {other}"
            ))
            .into());
        }
    };
    Ok(object.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{Duration, Utc};
    use futures_util::StreamExt;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use learnlrs_xapi::{Statement, VerbVocabulary};

    use crate::plugin::{AuthKind, PluginDescriptor};

    static MEMORY_DESCRIPTOR: PluginDescriptor = PluginDescriptor {
        name: "memory",
        description: "in-memory test backend",
        required_keys: &[],
        auth: AuthKind::Basic,
        max_page_size: 50,
    };

    /// Stores statements in memory; queries filter on object and since.
    struct MemoryPlugin {
        statements: Mutex<Vec<Statement>>,
        sends: AtomicUsize,
    }

    impl MemoryPlugin {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                statements: Mutex::new(Vec::new()),
                sends: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl LrsPlugin for MemoryPlugin {
        fn descriptor(&self) -> &'static PluginDescriptor {
            &MEMORY_DESCRIPTOR
        }

        async fn send(&self, statement: &Statement) -> Result<StatementId> {
            self.sends.fetch_add(1, Ordering::SeqCst);
            self.statements.lock().unwrap().push(statement.clone());
            Ok(StatementId::from(statement.id))
        }

        async fn query(&self, filter: QueryFilter) -> Result<StatementStream> {
            let matching: Vec<_> = self
                .statements
                .lock()
                .unwrap()
                .iter()
                .filter(|s| {
                    filter
                        .object_id
                        .as_ref()
                        .is_none_or(|object| &s.object.id == object)
                })
                .filter(|s| filter.since.is_none_or(|since| s.timestamp >= since))
                .take(filter.limit.unwrap_or(MEMORY_DESCRIPTOR.max_page_size))
                .cloned()
                .collect();
            Ok(Box::pin(futures_util::stream::iter(
                matching.into_iter().map(Ok),
            )))
        }

        fn list_verbs(&self) -> BTreeMap<String, String> {
            VerbVocabulary::builtin().to_uri_map()
        }

        async fn health(&self) -> Result<HealthStatus> {
            Ok(HealthStatus::Healthy)
        }
    }

    fn service() -> (LrsService, Arc<MemoryPlugin>) {
        let plugin = MemoryPlugin::new();
        let builder =
            StatementBuilder::new(VerbVocabulary::builtin(), "https://lrs.example.com");
        (
            LrsService::new(builder, "a1b2c3", plugin.clone()),
            plugin,
        )
    }

    #[tokio::test]
    async fn practiced_with_scaled_score_round_trips() {
        let (service, plugin) = service();

        let draft = StatementDraft::new(
            "a1b2c3",
            "practiced",
            "https://example.org/activities/linear-algebra",
        )
        .with_score(Score::scaled(0.5));
        let id = service.record(draft).await.unwrap();

        let stored = plugin.statements.lock().unwrap()[0].clone();
        assert_eq!(id.as_str(), stored.id.to_string());
        assert_eq!(stored.verb.id, "http://adlnet.gov/expapi/verbs/practiced");
        assert_eq!(stored.result.unwrap().score.unwrap().scaled, Some(0.5));
    }

    #[tokio::test]
    async fn sent_statement_appears_in_query_exactly_once() {
        let (service, _plugin) = service();

        let object = "https://example.org/activities/linear-algebra";
        let id = service
            .record_statement("practiced", object, None, None)
            .await
            .unwrap();

        let filter = QueryFilter::new()
            .object(object)
            .since(Utc::now() - Duration::minutes(1));
        let results: Vec<_> = service
            .query_statements(filter)
            .await
            .unwrap()
            .collect()
            .await;

        let matches: Vec<_> = results
            .into_iter()
            .map(|r| r.unwrap())
            .filter(|s| s.id.to_string() == id.as_str())
            .collect();
        assert_eq!(matches.len(), 1);
    }

    #[tokio::test]
    async fn unknown_verb_is_rejected_before_any_send() {
        let (service, plugin) = service();

        let err = service
            .record_statement("studied", "https://example.org/a", None, None)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            crate::Error::Validation(ValidationError::UnknownVerb(_))
        ));
        assert_eq!(plugin.sends.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn band_level_produces_score_and_success() {
        let (service, plugin) = service();

        service
            .record_statement(
                "achieved",
                "https://example.org/activities/quiz-1",
                Some(Level::Band(3)),
                None,
            )
            .await
            .unwrap();

        let stored = plugin.statements.lock().unwrap()[0].clone();
        let result = stored.result.unwrap();
        assert_eq!(result.score.as_ref().unwrap().raw, Some(3.0));
        assert_eq!(result.score.as_ref().unwrap().max, Some(3.0));
        assert_eq!(result.success, Some(true));
    }

    #[tokio::test]
    async fn score_max_is_consumed_not_forwarded() {
        let (service, plugin) = service();

        service
            .record_statement(
                "achieved",
                "https://example.org/activities/exam",
                Some(Level::Raw(15.0)),
                Some(serde_json::json!({"score_max": 20, "attempts": 2})),
            )
            .await
            .unwrap();

        let stored = plugin.statements.lock().unwrap()[0].clone();
        let result = stored.result.unwrap();
        assert_eq!(result.score.unwrap().max, Some(20.0));

        let extensions = result.extensions.unwrap();
        assert_eq!(extensions.len(), 1);
        assert!(
            extensions.contains_key("https://lrs.example.com/extensions/attempts"),
            "score_max must not be forwarded: {extensions:?}"
        );
    }

    #[tokio::test]
    async fn string_extras_are_parsed_as_json() {
        let (service, plugin) = service();

        service
            .record_statement(
                "practiced",
                "https://example.org/activities/drill",
                None,
                Some(serde_json::Value::String(r#"{"hints": 1}"#.to_string())),
            )
            .await
            .unwrap();

        let stored = plugin.statements.lock().unwrap()[0].clone();
        assert!(stored.result.unwrap().extensions.is_some());
    }

    #[tokio::test]
    async fn malformed_string_extras_are_rejected() {
        let (service, _plugin) = service();

        let err = service
            .record_statement(
                "practiced",
                "https://example.org/activities/drill",
                None,
                Some(serde_json::Value::String("not json".to_string())),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            crate::Error::Validation(ValidationError::InvalidExtras(_))
        ));
    }

    #[tokio::test]
    async fn non_object_extras_are_rejected() {
        let (service, _plugin) = service();

        let err = service
            .record_statement(
                "practiced",
                "https://example.org/activities/drill",
                None,
                Some(serde_json::json!([1, 2, 3])),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, crate::Error::Validation(_)));
    }

    #[tokio::test]
    async fn invalid_filter_never_reaches_the_plugin() {
        let (service, _plugin) = service();

        let filter = QueryFilter::new()
            .since(Utc::now())
            .until(Utc::now() - Duration::hours(1));
        let err = service.query_statements(filter).await.err().unwrap();
        assert!(matches!(
            err,
            crate::Error::Validation(ValidationError::InvalidTimeRange)
        ));
    }

    #[tokio::test]
    async fn list_verbs_and_health_delegate_to_plugin() {
        let (service, _plugin) = service();
        assert_eq!(service.list_verbs().len(), 4);
        assert!(service.health().await.unwrap().is_healthy());
    }
}

//! Statement engine: draft in, validated canonical statement out.
//!
//! [`StatementBuilder`] is a purely validating transform. It performs no
//! network I/O, so any failure here leaves no side effects anywhere.

use std::collections::BTreeMap;

use chrono::Utc;
use tracing::debug;
use url::Url;
use uuid::Uuid;

use crate::statement::{Activity, Actor, Context, Score, Statement, XapiResult};
use crate::verbs::VerbVocabulary;
use crate::ValidationError;

/// Loosely-structured input for one statement. Created per call and
/// consumed by [`StatementBuilder::build`]; never persisted.
#[derive(Debug, Clone, Default)]
pub struct StatementDraft {
    /// Opaque subject identifier for the actor account.
    pub actor_id: String,
    /// Short verb alias, resolved against the vocabulary.
    pub verb_alias: String,
    /// Activity IRI.
    pub object_id: String,
    pub score: Option<Score>,
    pub success: Option<bool>,
    pub completion: Option<bool>,
    /// Result extensions; keys that are not absolute URIs get qualified
    /// under the builder's home page.
    pub extensions: Option<BTreeMap<String, serde_json::Value>>,
}

impl StatementDraft {
    pub fn new(
        actor_id: impl Into<String>,
        verb_alias: impl Into<String>,
        object_id: impl Into<String>,
    ) -> Self {
        Self {
            actor_id: actor_id.into(),
            verb_alias: verb_alias.into(),
            object_id: object_id.into(),
            ..Self::default()
        }
    }

    pub fn with_score(mut self, score: Score) -> Self {
        self.score = Some(score);
        self
    }

    pub fn with_success(mut self, success: bool) -> Self {
        self.success = Some(success);
        self
    }

    pub fn with_completion(mut self, completion: bool) -> Self {
        self.completion = Some(completion);
        self
    }

    pub fn with_extensions(mut self, extensions: BTreeMap<String, serde_json::Value>) -> Self {
        self.extensions = Some(extensions);
        self
    }
}

/// Builds canonical statements from drafts.
#[derive(Debug, Clone)]
pub struct StatementBuilder {
    vocabulary: VerbVocabulary,
    home_page: String,
    platform: String,
}

impl StatementBuilder {
    pub fn new(vocabulary: VerbVocabulary, home_page: impl Into<String>) -> Self {
        Self {
            vocabulary,
            home_page: home_page.into(),
            platform: "learnlrs".to_string(),
        }
    }

    pub fn with_platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = platform.into();
        self
    }

    pub fn vocabulary(&self) -> &VerbVocabulary {
        &self.vocabulary
    }

    /// Validate a draft and construct the canonical statement.
    ///
    /// Assigns a fresh UUIDv4 id and the current UTC time (second
    /// precision) as the timestamp. The actor account name is the
    /// draft's opaque subject identifier.
    pub fn build(&self, draft: StatementDraft) -> Result<Statement, ValidationError> {
        let verb = self
            .vocabulary
            .get(&draft.verb_alias)
            .cloned()
            .ok_or_else(|| ValidationError::UnknownVerb(draft.verb_alias.clone()))?;

        validate_iri(&draft.object_id)?;

        if let Some(score) = &draft.score {
            validate_score(score)?;
        }

        let result = self.build_result(&draft);

        let statement = Statement {
            id: Uuid::new_v4(),
            actor: Actor::new(&self.home_page, draft.actor_id),
            verb,
            object: Activity::new(draft.object_id),
            result,
            context: Some(Context {
                platform: Some(self.platform.clone()),
                extensions: None,
            }),
            timestamp: Utc::now(),
        };

        debug!(id = %statement.id, verb = %statement.verb.id, "built statement");
        Ok(statement)
    }

    fn build_result(&self, draft: &StatementDraft) -> Option<XapiResult> {
        if draft.score.is_none()
            && draft.success.is_none()
            && draft.completion.is_none()
            && draft.extensions.is_none()
        {
            return None;
        }

        let extensions = draft.extensions.as_ref().map(|exts| {
            exts.iter()
                .map(|(key, value)| (self.qualify_extension_key(key), value.clone()))
                .collect()
        });

        Some(XapiResult {
            score: draft.score.clone(),
            success: draft.success,
            completion: draft.completion,
            extensions,
        })
    }

    /// Extension keys must be URIs; bare keys get qualified under the
    /// deployment home page.
    fn qualify_extension_key(&self, key: &str) -> String {
        if key.starts_with("http://") || key.starts_with("https://") || key.starts_with("urn:") {
            key.to_string()
        } else {
            format!("{}/extensions/{}", self.home_page, key)
        }
    }
}

fn validate_iri(object_id: &str) -> Result<(), ValidationError> {
    if object_id.is_empty() || Url::parse(object_id).is_err() {
        return Err(ValidationError::InvalidObjectId(object_id.to_string()));
    }
    Ok(())
}

fn validate_score(score: &Score) -> Result<(), ValidationError> {
    if let Some(scaled) = score.scaled
        && !(-1.0..=1.0).contains(&scaled)
    {
        return Err(ValidationError::ScoreOutOfRange(scaled));
    }

    let raw = score.raw.unwrap_or_default();
    if let Some(min) = score.min
        && score.raw.is_some()
        && raw < min
    {
        return Err(ValidationError::ScoreBoundsViolated {
            raw,
            min,
            max: score.max.unwrap_or(f64::INFINITY),
        });
    }
    if let Some(max) = score.max
        && score.raw.is_some()
        && raw > max
    {
        return Err(ValidationError::ScoreBoundsViolated {
            raw,
            min: score.min.unwrap_or(f64::NEG_INFINITY),
            max,
        });
    }
    Ok(())
}

//! Query translation: generic filter to backend-native parameters.
//!
//! Pure function, no I/O. Plugins pass the result straight to the
//! transport as query parameters.

use chrono::SecondsFormat;
use learnlrs_xapi::{Actor, QueryFilter, ValidationError, VerbVocabulary};

use crate::plugin::PluginDescriptor;

/// Translate a [`QueryFilter`] into xAPI query parameters for one
/// backend.
///
/// Rejects an inverted time range; silently caps `limit` at the
/// plugin's documented maximum page size (an over-large limit is never
/// an error). The `agent` parameter always pins results to the
/// configured actor.
pub fn translate(
    filter: &QueryFilter,
    descriptor: &PluginDescriptor,
    vocabulary: &VerbVocabulary,
    actor: &Actor,
) -> Result<Vec<(String, String)>, ValidationError> {
    filter.validate()?;

    let agent = serde_json::json!({
        "account": {
            "homePage": actor.account.home_page,
            "name": actor.account.name,
        }
    });

    let mut params = vec![("agent".to_string(), agent.to_string())];

    if let Some(alias) = &filter.verb_alias {
        let verb = vocabulary
            .get(alias)
            .ok_or_else(|| ValidationError::UnknownVerb(alias.clone()))?;
        params.push(("verb".to_string(), verb.id.clone()));
    }

    if let Some(object_id) = &filter.object_id {
        params.push(("activity".to_string(), object_id.clone()));
    }

    if let Some(since) = filter.since {
        params.push((
            "since".to_string(),
            since.to_rfc3339_opts(SecondsFormat::Secs, true),
        ));
    }

    if let Some(until) = filter.until {
        params.push((
            "until".to_string(),
            until.to_rfc3339_opts(SecondsFormat::Secs, true),
        ));
    }

    let limit = filter
        .limit
        .unwrap_or(descriptor.max_page_size)
        .min(descriptor.max_page_size);
    params.push(("limit".to_string(), limit.to_string()));

    Ok(params)
}

//! Validation errors for drafts and filters.

use thiserror::Error;

/// Errors produced while validating a statement draft or query filter.
///
/// Validation happens strictly before any network I/O, so a validation
/// failure never leaves partial side effects behind.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// Verb alias is not present in the vocabulary.
    #[error("unknown verb alias: '{0}'")]
    UnknownVerb(String),

    /// Object id is empty or not a well-formed IRI.
    #[error("object_id must be a valid IRI, got '{0}'")]
    InvalidObjectId(String),

    /// `score.scaled` must lie in [-1, 1].
    #[error("score.scaled must be within [-1, 1], got {0}")]
    ScoreOutOfRange(f64),

    /// Raw score falls outside its declared bounds.
    #[error("score bounds violated: expected min {min} <= raw {raw} <= max {max}")]
    ScoreBoundsViolated { raw: f64, min: f64, max: f64 },

    /// Mastery level band must be 0-3.
    #[error("level must be between 0 and 3, got {0}")]
    InvalidLevel(u8),

    /// Filter has `since` later than `until`.
    #[error("invalid time range: 'since' must not be later than 'until'")]
    InvalidTimeRange,

    /// Extras payload could not be interpreted as a JSON object.
    #[error("extras must be a valid JSON object: {0}")]
    InvalidExtras(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_verb_display_names_the_alias() {
        let err = ValidationError::UnknownVerb("studied".to_string());
        assert_eq!(err.to_string(), "unknown verb alias: 'studied'");
    }

    #[test]
    fn score_bounds_display_includes_all_values() {
        let err = ValidationError::ScoreBoundsViolated {
            raw: 5.0,
            min: 0.0,
            max: 3.0,
        };
        let msg = err.to_string();
        assert!(msg.contains("5"));
        assert!(msg.contains("0"));
        assert!(msg.contains("3"));
    }
}

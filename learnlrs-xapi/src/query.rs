//! Generic statement query filter.

use chrono::{DateTime, Utc};

use crate::ValidationError;

/// Backend-independent statement filter. All fields optional; absence
/// means unfiltered on that dimension.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryFilter {
    pub verb_alias: Option<String>,
    pub object_id: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

impl QueryFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn verb(mut self, alias: impl Into<String>) -> Self {
        self.verb_alias = Some(alias.into());
        self
    }

    pub fn object(mut self, object_id: impl Into<String>) -> Self {
        self.object_id = Some(object_id.into());
        self
    }

    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn until(mut self, until: DateTime<Utc>) -> Self {
        self.until = Some(until);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Reject filters whose time range is inverted.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let (Some(since), Some(until)) = (self.since, self.until)
            && since > until
        {
            return Err(ValidationError::InvalidTimeRange);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn empty_filter_is_valid() {
        assert!(QueryFilter::new().validate().is_ok());
    }

    #[test]
    fn ordered_time_range_is_valid() {
        let filter = QueryFilter::new()
            .since(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
            .until(Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap());
        assert!(filter.validate().is_ok());
    }

    #[test]
    fn inverted_time_range_is_rejected() {
        let filter = QueryFilter::new()
            .since(Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap())
            .until(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        assert!(matches!(
            filter.validate(),
            Err(ValidationError::InvalidTimeRange)
        ));
    }

    #[test]
    fn single_bound_is_valid() {
        let filter = QueryFilter::new().since(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        assert!(filter.validate().is_ok());
    }

    #[test]
    fn builder_style_setters_accumulate() {
        let filter = QueryFilter::new()
            .verb("practiced")
            .object("https://example.org/a")
            .limit(5);
        assert_eq!(filter.verb_alias.as_deref(), Some("practiced"));
        assert_eq!(filter.object_id.as_deref(), Some("https://example.org/a"));
        assert_eq!(filter.limit, Some(5));
    }
}

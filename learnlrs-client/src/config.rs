//! Plugin configuration map.
//!
//! The external configuration collaborator loads environment/file
//! settings and hands each plugin an opaque key-value map. This module
//! only provides typed access on top of that map; it does not read the
//! environment itself.

use std::collections::BTreeMap;
use std::time::Duration;

use crate::error::ConfigError;

/// Default per-attempt request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default number of retry attempts.
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;

/// Opaque key-value configuration for one plugin instance.
#[derive(Debug, Clone, Default)]
pub struct PluginConfig {
    values: BTreeMap<String, String>,
}

impl PluginConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Fetch a required key, reporting which plugin is missing it.
    pub fn require(&self, plugin: &str, key: &str) -> Result<&str, ConfigError> {
        self.get(key).ok_or_else(|| ConfigError::MissingKey {
            plugin: plugin.to_string(),
            key: key.to_string(),
        })
    }

    /// Per-attempt timeout from the `timeout` key (seconds).
    pub fn timeout(&self) -> Result<Duration, ConfigError> {
        match self.get("timeout") {
            None => Ok(DEFAULT_TIMEOUT),
            Some(raw) => raw
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|_| ConfigError::Invalid(format!("timeout must be seconds, got '{raw}'"))),
        }
    }

    /// Retry attempt count from the `retry_attempts` key.
    pub fn retry_attempts(&self) -> Result<u32, ConfigError> {
        match self.get("retry_attempts") {
            None => Ok(DEFAULT_RETRY_ATTEMPTS),
            Some(raw) => raw.parse::<u32>().map_err(|_| {
                ConfigError::Invalid(format!("retry_attempts must be an integer, got '{raw}'"))
            }),
        }
    }
}

impl FromIterator<(String, String)> for PluginConfig {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

/// Validate and normalize an LRS endpoint URL.
///
/// Must be http(s); the stored form never carries a trailing slash so
/// request paths can be appended verbatim.
pub fn normalize_endpoint(raw: &str) -> Result<String, ConfigError> {
    if !raw.starts_with("http://") && !raw.starts_with("https://") {
        return Err(ConfigError::Invalid(format!(
            "endpoint must start with http:// or https://, got '{raw}'"
        )));
    }
    Ok(raw.trim_end_matches('/').to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn require_reports_plugin_and_key() {
        let config = PluginConfig::new();
        let err = config.require("lrsql", "secret").unwrap_err();
        assert!(err.to_string().contains("lrsql"));
        assert!(err.to_string().contains("secret"));
    }

    #[test]
    fn timeout_defaults_to_30s() {
        assert_eq!(PluginConfig::new().timeout().unwrap(), DEFAULT_TIMEOUT);
    }

    #[test]
    fn timeout_parses_seconds() {
        let config = PluginConfig::new().set("timeout", "5");
        assert_eq!(config.timeout().unwrap(), Duration::from_secs(5));
    }

    #[test]
    fn invalid_timeout_is_rejected() {
        let config = PluginConfig::new().set("timeout", "soon");
        assert!(config.timeout().is_err());
    }

    #[test]
    fn retry_attempts_default_and_parse() {
        assert_eq!(PluginConfig::new().retry_attempts().unwrap(), 3);
        let config = PluginConfig::new().set("retry_attempts", "5");
        assert_eq!(config.retry_attempts().unwrap(), 5);
    }

    #[test]
    fn normalize_endpoint_strips_trailing_slash() {
        assert_eq!(
            normalize_endpoint("https://lrs.example.com/").unwrap(),
            "https://lrs.example.com"
        );
    }

    #[test]
    fn normalize_endpoint_rejects_non_http() {
        assert!(normalize_endpoint("ftp://lrs.example.com").is_err());
        assert!(normalize_endpoint("lrs.example.com").is_err());
    }

    #[test]
    fn from_iterator_collects_pairs() {
        let config: PluginConfig = [("endpoint".to_string(), "https://x".to_string())]
            .into_iter()
            .collect();
        assert_eq!(config.get("endpoint"), Some("https://x"));
    }
}

//! Error taxonomy for the LRS client.
//!
//! Callers receive one of these kinds plus a human-readable message.
//! Error payloads never carry credential material or stack traces.

use learnlrs_xapi::ValidationError;
use thiserror::Error;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for the LRS client.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed draft or filter. Never retried; surfaced verbatim.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Missing or invalid plugin configuration. Fatal at startup.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Unknown backend name. Fatal at startup.
    #[error("unknown LRS plugin '{name}' (available: {available})")]
    PluginNotFound { name: String, available: String },

    /// Credential exchange or refresh failure.
    #[error("authentication error: {0}")]
    Auth(#[from] AuthError),

    /// Network/timeout/non-2xx after retry exhaustion.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

/// Plugin configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("plugin '{plugin}' requires config key '{key}'")]
    MissingKey { plugin: String, key: String },

    #[error("{0}")]
    Invalid(String),

    /// Exactly one plugin may be active per process.
    #[error("an LRS plugin is already active for this process")]
    AlreadyActive,
}

/// Credential lifecycle errors.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("OIDC token exchange failed: {0}")]
    ExchangeFailed(String),

    /// Backend still answered 401 after a forced credential refresh.
    #[error("backend rejected credentials")]
    Rejected,
}

/// Transport-level failures.
#[derive(Debug, Error)]
pub enum TransportError {
    /// All retry attempts consumed; carries the last observed cause.
    #[error("request failed after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: String },

    /// Terminal non-2xx response.
    #[error("backend returned status {status}: {detail}")]
    Status { status: u16, detail: String },

    /// Overall call deadline exceeded (covers cancellation mid-backoff).
    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// Response body did not match the backend's documented shape.
    #[error("unexpected response body: {0}")]
    Body(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plugin_not_found_lists_available() {
        let err = Error::PluginNotFound {
            name: "moodle".to_string(),
            available: "lrsql, ralph, veracity".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("moodle"));
        assert!(msg.contains("ralph"));
    }

    #[test]
    fn exhausted_reports_attempt_count() {
        let err = TransportError::Exhausted {
            attempts: 3,
            last: "status 503".to_string(),
        };
        assert!(err.to_string().contains("3 attempts"));
        assert!(err.to_string().contains("503"));
    }

    #[test]
    fn validation_error_converts_into_top_level() {
        let err: Error = ValidationError::InvalidTimeRange.into();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn config_error_converts_into_top_level() {
        let err: Error = ConfigError::MissingKey {
            plugin: "lrsql".to_string(),
            key: "secret".to_string(),
        }
        .into();
        assert!(err.to_string().contains("secret"));
    }
}

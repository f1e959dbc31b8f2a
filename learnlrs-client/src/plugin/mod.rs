//! LRS plugin interface and the built-in backend implementations.
//!
//! One plugin per backend family. Variants differ in base path
//! conventions, query-parameter naming and auth kind, but all speak
//! xAPI statements over the shared [`Transport`](crate::Transport).

mod base;

pub mod lrsql;
pub mod ralph;
pub mod registry;
pub mod veracity;

use std::collections::BTreeMap;

use async_trait::async_trait;
use learnlrs_xapi::{QueryFilter, Statement};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::stream::StatementStream;

/// Static metadata for one plugin variant, created at registry-build
/// time and never mutated.
#[derive(Debug, Clone, Copy)]
pub struct PluginDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    /// Config keys that must be present before construction.
    pub required_keys: &'static [&'static str],
    pub auth: AuthKind,
    /// Largest page the backend serves; query limits are capped here.
    pub max_page_size: usize,
}

/// How a plugin authenticates against its backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthKind {
    /// Static HTTP Basic credentials.
    Basic,
    /// Basic or OIDC client-credentials, detected from configuration.
    BasicOrOidc,
    /// Basic-style access-key credentials.
    AccessKey,
}

/// Identifier of a stored statement: backend-issued where the backend
/// returns one, otherwise the statement's own UUID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementId(String);

impl StatementId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for StatementId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<uuid::Uuid> for StatementId {
    fn from(id: uuid::Uuid) -> Self {
        Self(id.to_string())
    }
}

/// Result of a lightweight backend probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    Healthy,
    Unhealthy { reason: String },
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }
}

/// Uniform contract over heterogeneous LRS backends.
///
/// Implementations are shared across concurrent tasks; all methods are
/// read-only with respect to plugin state except the credential
/// provider's internal token refresh.
#[async_trait]
pub trait LrsPlugin: Send + Sync {
    /// Static metadata for this plugin variant.
    fn descriptor(&self) -> &'static PluginDescriptor;

    /// Persist one canonical statement. Succeeds only on a 2xx
    /// response from the backend.
    async fn send(&self, statement: &Statement) -> Result<StatementId>;

    /// Query statements matching a generic filter. Returns a lazy,
    /// finite, non-restartable stream that paginates on demand.
    async fn query(&self, filter: QueryFilter) -> Result<StatementStream>;

    /// Snapshot of the verb vocabulary (alias -> URI).
    fn list_verbs(&self) -> BTreeMap<String, String>;

    /// Lightweight authenticated probe, retried only per the
    /// transport's normal policy.
    async fn health(&self) -> Result<HealthStatus>;
}

impl std::fmt::Debug for dyn LrsPlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LrsPlugin")
            .field("name", &self.descriptor().name)
            .finish()
    }
}

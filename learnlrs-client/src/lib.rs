//! LRS client for learnlrs: backend plugins, transport and credentials.
//!
//! This crate is the networked half of learnlrs:
//!
//! - **Credential provider** - [`CredentialProvider`] owning Basic
//!   credentials or the OIDC client-credentials token lifecycle
//! - **Transport** - [`Transport`] issuing HTTP requests with timeout,
//!   retry/backoff and error classification
//! - **Plugins** - [`LrsPlugin`] implementations for SQL-LRS, Ralph and
//!   Veracity backends, created through the [`plugin::registry`]
//! - **Query translation** - [`translate`] mapping a generic
//!   [`QueryFilter`](learnlrs_xapi::QueryFilter) to backend-native
//!   query parameters
//! - **Service facade** - [`LrsService`], the inbound interface consumed
//!   by the external tool-protocol layer
//!
//! # Architecture
//!
//! ```text
//! caller ──► LrsService ──► StatementBuilder (build + validate)
//!                │
//!                ▼
//!          LrsPlugin (lrsql | ralph | veracity)
//!                │
//!                ▼
//!            Transport (auth + retry) ──► backend HTTP API
//! ```

mod error;

pub mod config;
pub mod credential;
pub mod plugin;
pub mod service;
pub mod stream;
pub mod translate;
pub mod transport;

pub use config::PluginConfig;
pub use credential::{Credential, CredentialProvider, OidcConfig, OidcProvider, TokenExchanger};
pub use error::{AuthError, ConfigError, Error, Result, TransportError};
pub use plugin::{AuthKind, HealthStatus, LrsPlugin, PluginDescriptor, StatementId};
pub use service::LrsService;
pub use stream::{PageFetcher, StatementPage, StatementStream};
pub use translate::translate;
pub use transport::{HttpRequest, HttpResponse, RetryPolicy, Transport};

//! Credential provider: Basic credentials and the OIDC token lifecycle.
//!
//! Basic and access-key plugins carry a static credential. OIDC plugins
//! own a cached client-credentials token that moves through
//! `Unauthenticated -> Requesting -> Valid -> Expiring -> Refreshing`
//! and back to `Valid`; an exchange failure leaves the cache empty
//! until the next credentialed call retries the exchange.
//!
//! Single-flight discipline: the token cache sits behind a
//! `tokio::sync::Mutex` that is held across the exchange request, so
//! concurrent callers observing a stale token all await the one
//! in-flight refresh and see the same refreshed token.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::AuthError;

/// Safety margin subtracted from a token's lifetime: a token within
/// this window of expiry counts as expiring and gets refreshed.
pub const EXPIRY_MARGIN: Duration = Duration::from_secs(30);

/// Authorization material for one request.
#[derive(Clone)]
pub enum Credential {
    Basic {
        username: String,
        password: SecretString,
    },
    Bearer(SecretString),
    None,
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"[REDACTED]")
                .finish(),
            Self::Bearer(_) => write!(f, "Bearer([REDACTED])"),
            Self::None => write!(f, "None"),
        }
    }
}

impl Credential {
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::Basic {
            username: username.into(),
            password: SecretString::from(password.into()),
        }
    }
}

/// Produces valid authorization material for each request.
pub enum CredentialProvider {
    /// Fixed credential; no refresh lifecycle.
    Static(Credential),
    /// OIDC client-credentials token lifecycle.
    Oidc(OidcProvider),
}

impl CredentialProvider {
    /// Current credential, refreshing the OIDC token if stale.
    pub async fn credential(&self) -> Result<Credential, AuthError> {
        match self {
            Self::Static(credential) => Ok(credential.clone()),
            Self::Oidc(provider) => provider.credential().await,
        }
    }

    /// Whether a forced refresh can produce a different credential.
    pub fn supports_refresh(&self) -> bool {
        matches!(self, Self::Oidc(_))
    }

    /// Drop any cached token so the next call re-exchanges.
    pub async fn invalidate(&self) {
        if let Self::Oidc(provider) = self {
            provider.invalidate().await;
        }
    }
}

impl std::fmt::Debug for CredentialProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Static(credential) => f.debug_tuple("Static").field(credential).finish(),
            Self::Oidc(_) => write!(f, "Oidc"),
        }
    }
}

/// OIDC client-credentials configuration.
#[derive(Clone)]
pub struct OidcConfig {
    pub token_url: String,
    pub client_id: String,
    pub client_secret: SecretString,
    pub scope: String,
}

impl std::fmt::Debug for OidcConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OidcConfig")
            .field("token_url", &self.token_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("scope", &self.scope)
            .finish()
    }
}

/// Successful token exchange result.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    /// Lifetime in seconds; defaults to 3600 when the issuer omits it.
    #[serde(default)]
    pub expires_in: Option<u64>,
}

/// Performs the client-credentials exchange. Abstracted so the token
/// lifecycle is testable without a live issuer.
#[async_trait]
pub trait TokenExchanger: Send + Sync {
    async fn exchange(&self, config: &OidcConfig) -> Result<TokenResponse, AuthError>;
}

/// Production exchanger: POSTs form-encoded client credentials to the
/// configured token endpoint.
pub struct HttpTokenExchanger {
    client: reqwest::Client,
}

impl HttpTokenExchanger {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl TokenExchanger for HttpTokenExchanger {
    async fn exchange(&self, config: &OidcConfig) -> Result<TokenResponse, AuthError> {
        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", config.client_id.as_str()),
            ("client_secret", config.client_secret.expose_secret()),
            ("scope", config.scope.as_str()),
        ];

        let response = self
            .client
            .post(&config.token_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| AuthError::ExchangeFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AuthError::ExchangeFailed(format!(
                "token endpoint returned status {status}"
            )));
        }

        response
            .json::<TokenResponse>()
            .await
            .map_err(|e| AuthError::ExchangeFailed(e.to_string()))
    }
}

struct CachedToken {
    token: SecretString,
    expires_at: Instant,
}

impl CachedToken {
    fn is_fresh(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

/// Owns the OIDC token cache for one plugin instance.
pub struct OidcProvider {
    config: OidcConfig,
    exchanger: Arc<dyn TokenExchanger>,
    cache: Mutex<Option<CachedToken>>,
}

impl OidcProvider {
    pub fn new(config: OidcConfig, exchanger: Arc<dyn TokenExchanger>) -> Self {
        Self {
            config,
            exchanger,
            cache: Mutex::new(None),
        }
    }

    /// Bearer credential from the cache, exchanging if absent or
    /// expiring. The cache lock is held across the exchange; that is
    /// the single-flight section.
    pub async fn credential(&self) -> Result<Credential, AuthError> {
        let mut cache = self.cache.lock().await;

        if let Some(cached) = cache.as_ref()
            && cached.is_fresh()
        {
            return Ok(Credential::Bearer(cached.token.clone()));
        }

        debug!(token_url = %self.config.token_url, "requesting OIDC token");
        let response = self.exchanger.exchange(&self.config).await.map_err(|e| {
            *cache = None;
            warn!("OIDC token exchange failed");
            e
        })?;

        let lifetime = Duration::from_secs(response.expires_in.unwrap_or(3600));
        let expires_at = Instant::now() + lifetime.saturating_sub(EXPIRY_MARGIN);
        let token = SecretString::from(response.access_token);

        *cache = Some(CachedToken {
            token: token.clone(),
            expires_at,
        });

        Ok(Credential::Bearer(token))
    }

    pub async fn invalidate(&self) {
        *self.cache.lock().await = None;
    }
}

//! HTTP transport shared by all plugin variants.
//!
//! The retry algorithm is split into pure pieces (outcome
//! classification, backoff computation) and a driver loop that is
//! generic over the attempt function, so the whole policy is testable
//! with scripted outcomes and no network.

use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;

use rand::Rng;
use reqwest::Method;
use secrecy::ExposeSecret;
use tracing::{debug, warn};

use crate::config::DEFAULT_RETRY_ATTEMPTS;
use crate::credential::{Credential, CredentialProvider};
use crate::error::{AuthError, ConfigError, Error, Result, TransportError};

/// xAPI version header sent with every request.
pub const XAPI_VERSION_HEADER: &str = "X-Experience-API-Version";
pub const XAPI_VERSION: &str = "1.0.3";

/// Retry/backoff parameters. One instance per transport, read-only
/// across concurrent calls.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Each backoff delay is scaled by a uniform factor in
    /// `[1 - jitter_ratio, 1 + jitter_ratio]`.
    pub jitter_ratio: f64,
    pub retryable_status: HashSet<u16>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_RETRY_ATTEMPTS,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(5),
            jitter_ratio: 0.2,
            retryable_status: [429, 500, 502, 503, 504].into_iter().collect(),
        }
    }
}

impl RetryPolicy {
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Classify one attempt's outcome.
    pub fn classify(&self, outcome: &Outcome) -> Disposition {
        match outcome {
            Outcome::Response { status, .. } if (200..300).contains(status) => {
                Disposition::Success
            }
            Outcome::Response { status: 401, .. } => Disposition::AuthRetry,
            Outcome::Response { status, .. } if self.retryable_status.contains(status) => {
                Disposition::Retry
            }
            Outcome::Response { .. } => Disposition::Fatal,
            Outcome::TimedOut | Outcome::Network(_) => Disposition::Retry,
        }
    }

    /// Exponential backoff before the next attempt, without jitter:
    /// `min(base * 2^(attempt-1), max)`.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 2f64.powi(attempt.saturating_sub(1).min(31) as i32);
        let delay = self.base_delay.as_secs_f64() * factor;
        Duration::from_secs_f64(delay.min(self.max_delay.as_secs_f64()))
    }

    /// Backoff with jitter applied.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base = self.backoff_delay(attempt);
        if self.jitter_ratio <= 0.0 {
            return base;
        }
        let factor = rand::thread_rng()
            .gen_range(1.0 - self.jitter_ratio..=1.0 + self.jitter_ratio);
        Duration::from_secs_f64(base.as_secs_f64() * factor)
    }
}

/// Raw outcome of a single request attempt.
#[derive(Debug, Clone)]
pub enum Outcome {
    Response { status: u16, body: String },
    TimedOut,
    Network(String),
}

impl Outcome {
    fn describe(&self) -> String {
        match self {
            Self::Response { status, .. } => format!("status {status}"),
            Self::TimedOut => "request timed out".to_string(),
            Self::Network(detail) => format!("connection failed: {detail}"),
        }
    }
}

/// What the policy decided about an outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Success,
    Retry,
    /// 401: one forced credential refresh plus a single extra attempt,
    /// outside the normal retry budget.
    AuthRetry,
    Fatal,
}

/// Request description rebuilt fresh on every attempt.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            url: url.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self {
            method: Method::POST,
            url: url.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn with_query(mut self, query: Vec<(String, String)>) -> Self {
        self.query = query;
        self
    }

    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// Successful response, with the number of attempts it took.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
    pub attempts: u32,
}

impl HttpResponse {
    /// Parse the body as JSON.
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_str(&self.body)
            .map_err(|e| TransportError::Body(e.to_string()).into())
    }
}

/// Issues HTTP requests with per-attempt timeout, retry/backoff and an
/// overall deadline.
#[derive(Debug)]
pub struct Transport {
    client: reqwest::Client,
    policy: RetryPolicy,
    deadline: Duration,
}

impl Transport {
    pub fn new(policy: RetryPolicy, per_attempt_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(per_attempt_timeout)
            .build()
            .map_err(|e| ConfigError::Invalid(format!("failed to build HTTP client: {e}")))?;

        // Budget for every attempt plus capped backoff between them.
        let deadline = per_attempt_timeout
            .saturating_mul(policy.max_attempts.max(1))
            .saturating_add(policy.max_delay.saturating_mul(policy.max_attempts.max(1)));

        Ok(Self {
            client,
            policy,
            deadline,
        })
    }

    /// Build a transport from plugin configuration keys.
    pub fn from_config(config: &crate::PluginConfig) -> Result<Self> {
        let policy = RetryPolicy::default().with_max_attempts(config.retry_attempts()?);
        Self::new(policy, config.timeout()?)
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Execute a request with authentication, retry and the overall
    /// deadline. Fails only after exhausting the retry budget, on a
    /// terminal status, or when the deadline fires mid-backoff.
    pub async fn execute(
        &self,
        request: &HttpRequest,
        credentials: &CredentialProvider,
    ) -> Result<HttpResponse> {
        let drive = self.drive(credentials, |credential| {
            let client = self.client.clone();
            let request = request.clone();
            async move { Self::attempt(client, request, credential).await }
        });

        match tokio::time::timeout(self.deadline, drive).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::DeadlineExceeded.into()),
        }
    }

    /// The retry driver, generic over the attempt function.
    async fn drive<F, Fut>(
        &self,
        credentials: &CredentialProvider,
        mut attempt: F,
    ) -> Result<HttpResponse>
    where
        F: FnMut(Credential) -> Fut,
        Fut: Future<Output = Outcome>,
    {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempts: u32 = 0;
        let mut auth_retry_used = false;

        loop {
            let credential = credentials.credential().await?;
            attempts += 1;
            let outcome = attempt(credential).await;

            match self.policy.classify(&outcome) {
                Disposition::Success => {
                    let Outcome::Response { status, body } = outcome else {
                        unreachable!("success disposition implies a response");
                    };
                    debug!(status, attempts, "request succeeded");
                    return Ok(HttpResponse {
                        status,
                        body,
                        attempts,
                    });
                }
                Disposition::AuthRetry => {
                    if credentials.supports_refresh() && !auth_retry_used {
                        warn!("got 401, forcing credential refresh");
                        auth_retry_used = true;
                        // The forced re-attempt does not consume budget.
                        attempts -= 1;
                        credentials.invalidate().await;
                        continue;
                    }
                    if credentials.supports_refresh() {
                        return Err(AuthError::Rejected.into());
                    }
                    let Outcome::Response { body, .. } = outcome else {
                        unreachable!("auth disposition implies a response");
                    };
                    return Err(TransportError::Status {
                        status: 401,
                        detail: body,
                    }
                    .into());
                }
                Disposition::Fatal => {
                    let Outcome::Response { status, body } = outcome else {
                        unreachable!("fatal disposition implies a response");
                    };
                    return Err(TransportError::Status {
                        status,
                        detail: body,
                    }
                    .into());
                }
                Disposition::Retry => {
                    let last = outcome.describe();
                    if attempts >= max_attempts {
                        return Err(TransportError::Exhausted { attempts, last }.into());
                    }
                    let delay = self.policy.delay_for(attempts);
                    warn!(
                        attempt = attempts,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        "retryable failure: {last}"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// One network attempt.
    async fn attempt(
        client: reqwest::Client,
        request: HttpRequest,
        credential: Credential,
    ) -> Outcome {
        let mut builder = client
            .request(request.method, &request.url)
            .header("Content-Type", "application/json")
            .header(XAPI_VERSION_HEADER, XAPI_VERSION);

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        builder = match credential {
            Credential::Basic { username, password } => {
                builder.basic_auth(username, Some(password.expose_secret().to_string()))
            }
            Credential::Bearer(token) => builder.bearer_auth(token.expose_secret().to_string()),
            Credential::None => builder,
        };

        match builder.send().await {
            Ok(response) => {
                let status = response.status().as_u16();
                let body = response.text().await.unwrap_or_default();
                Outcome::Response { status, body }
            }
            Err(e) if e.is_timeout() => Outcome::TimedOut,
            Err(e) => Outcome::Network(e.to_string()),
        }
    }
}

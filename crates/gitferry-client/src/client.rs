//! Authenticated request/response wrapper around one GitLab instance.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Method;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use gitferry_types::InstanceConfig;

use crate::breaker::{CircuitBreaker, CircuitBreakerConfig};
use crate::error::{ClientError, Result};
use crate::rate_limit::RateLimiter;
use crate::retry::RetryPolicy;

const USER_AGENT: &str = concat!("gitferry/", env!("CARGO_PKG_VERSION"));
const DEFAULT_PER_PAGE: u32 = 100;

/// Standard API response wrapper.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
    pub success: bool,
}

/// GitLab API client with authentication, rate limiting, and a circuit
/// breaker. One instance per remote; limiter and breaker state are shared
/// across all concurrent operations against that remote.
pub struct GitLabClient {
    http: reqwest::Client,
    api_base: String,
    token: String,
    limiter: Arc<RateLimiter>,
    breaker: Arc<CircuitBreaker>,
    retry: RetryPolicy,
    dry_run: bool,
}

impl GitLabClient {
    /// Create a client from instance configuration.
    pub fn new(config: &InstanceConfig, dry_run: bool) -> Result<Self> {
        let base = Url::parse(&config.url)
            .map_err(|e| ClientError::Network(format!("invalid instance url: {e}")))?;

        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ClientError::Network(e.to_string()))?;

        Ok(Self {
            http,
            api_base: format!("{}/api/v4", base.as_str().trim_end_matches('/')),
            token: config.token.clone(),
            limiter: Arc::new(RateLimiter::new(config.requests_per_second)),
            breaker: Arc::new(CircuitBreaker::with_defaults()),
            retry: RetryPolicy::default(),
            dry_run,
        })
    }

    /// Override the circuit breaker configuration.
    pub fn with_breaker_config(mut self, config: CircuitBreakerConfig) -> Self {
        self.breaker = Arc::new(CircuitBreaker::new(config));
        self
    }

    /// Override the transient-failure retry policy.
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    /// API base URL, e.g. `https://gitlab.example.com/api/v4`.
    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Make a GET request.
    pub async fn get(&self, endpoint: &str) -> Result<ApiResponse> {
        self.request(Method::GET, endpoint, None).await
    }

    /// Make a POST request.
    pub async fn post<B: Serialize>(&self, endpoint: &str, body: &B) -> Result<ApiResponse> {
        let payload = serde_json::to_value(body)
            .map_err(|e| ClientError::Network(format!("payload serialization: {e}")))?;
        self.request(Method::POST, endpoint, Some(payload)).await
    }

    /// Make a PUT request.
    pub async fn put<B: Serialize>(&self, endpoint: &str, body: &B) -> Result<ApiResponse> {
        let payload = serde_json::to_value(body)
            .map_err(|e| ClientError::Network(format!("payload serialization: {e}")))?;
        self.request(Method::PUT, endpoint, Some(payload)).await
    }

    /// Make a DELETE request.
    pub async fn delete(&self, endpoint: &str) -> Result<ApiResponse> {
        self.request(Method::DELETE, endpoint, None).await
    }

    /// Lazily paginate a list endpoint. The sequence yields pages until the
    /// remote runs out; restarting means building a new paginator.
    pub fn pages(&self, endpoint: &str) -> Pages<'_> {
        Pages {
            client: self,
            endpoint: endpoint.to_string(),
            per_page: DEFAULT_PER_PAGE,
            page: 1,
            done: false,
        }
    }

    /// Collect every page of a list endpoint.
    pub async fn get_paginated(&self, endpoint: &str) -> Result<Vec<Value>> {
        let mut pages = self.pages(endpoint);
        let mut all = Vec::new();
        while let Some(items) = pages.next_page().await? {
            all.extend(items);
        }
        debug!(endpoint, items = all.len(), "retrieved paginated endpoint");
        Ok(all)
    }

    /// Connectivity check: the authenticated `/user` endpoint.
    pub async fn ping(&self) -> Result<()> {
        self.get("/user").await.map(|_| ())
    }

    /// Instance version string, best-effort.
    pub async fn version(&self) -> Option<String> {
        match self.get("/version").await {
            Ok(resp) => resp
                .body
                .get("version")
                .and_then(Value::as_str)
                .map(String::from),
            Err(e) => {
                warn!(error = %e, "could not retrieve instance version");
                None
            }
        }
    }

    async fn request(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<Value>,
    ) -> Result<ApiResponse> {
        self.breaker.preflight()?;
        self.limiter.acquire().await;

        if self.dry_run && method != Method::GET {
            debug!(%method, endpoint, "dry run: skipping mutating request");
            self.breaker.record_success();
            return Ok(ApiResponse {
                status: 200,
                body: serde_json::json!({ "dry_run": true }),
                success: true,
            });
        }

        let url = format!("{}/{}", self.api_base, endpoint.trim_start_matches('/'));
        let mut attempts = 0u32;
        loop {
            let mut request = self
                .http
                .request(method.clone(), &url)
                .header("PRIVATE-TOKEN", &self.token);
            if let Some(payload) = &body {
                request = request.json(payload);
            }

            match request.send().await {
                Ok(response) if is_transient_status(response.status().as_u16()) => {
                    let status = response.status().as_u16();
                    attempts += 1;
                    if !self.retry.allows_retry(attempts) {
                        self.breaker.record_failure();
                        let text = response.text().await.unwrap_or_default();
                        return Err(ClientError::Api {
                            status,
                            message: extract_message(&text),
                        });
                    }
                    let delay = self.retry.delay_for(attempts);
                    warn!(
                        %method,
                        endpoint,
                        status,
                        attempt = attempts,
                        delay_ms = delay.as_millis() as u64,
                        "transient server error, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Ok(response) => {
                    // The remote answered; only transport-level failures
                    // and exhausted 5xx retries count against the breaker.
                    self.breaker.record_success();
                    return self.interpret(endpoint, response).await;
                }
                Err(e) => {
                    attempts += 1;
                    if !self.retry.allows_retry(attempts) {
                        self.breaker.record_failure();
                        return Err(ClientError::Network(e.to_string()));
                    }
                    let delay = self.retry.delay_for(attempts);
                    warn!(
                        %method,
                        endpoint,
                        attempt = attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "transient network failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    async fn interpret(&self, endpoint: &str, response: reqwest::Response) -> Result<ApiResponse> {
        let status = response.status().as_u16();

        match status {
            401 => Err(ClientError::Auth {
                url: self.api_base.clone(),
            }),
            404 => Err(ClientError::NotFound {
                endpoint: endpoint.to_string(),
            }),
            429 => {
                let retry_after = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(parse_retry_after)
                    .unwrap_or(Duration::from_secs(60));
                Err(ClientError::RateLimited { retry_after })
            }
            s if s >= 400 => {
                let text = response.text().await.unwrap_or_default();
                let message = extract_message(&text);
                if is_conflict_shaped(s, &message) {
                    Err(ClientError::Conflict { message })
                } else {
                    Err(ClientError::Api { status: s, message })
                }
            }
            _ => {
                let text = response.text().await.unwrap_or_default();
                let body = if text.is_empty() {
                    Value::Null
                } else {
                    serde_json::from_str(&text).unwrap_or(Value::String(text))
                };
                Ok(ApiResponse {
                    status,
                    body,
                    success: true,
                })
            }
        }
    }
}

/// Lazy page sequence over a list endpoint.
pub struct Pages<'a> {
    client: &'a GitLabClient,
    endpoint: String,
    per_page: u32,
    page: u32,
    done: bool,
}

impl Pages<'_> {
    /// Override the page size (mainly for tests).
    pub fn per_page(mut self, per_page: u32) -> Self {
        self.per_page = per_page;
        self
    }

    /// Fetch the next page, or `None` once the remote is exhausted.
    pub async fn next_page(&mut self) -> Result<Option<Vec<Value>>> {
        if self.done {
            return Ok(None);
        }

        let sep = if self.endpoint.contains('?') { '&' } else { '?' };
        let path = format!(
            "{}{}page={}&per_page={}",
            self.endpoint, sep, self.page, self.per_page
        );
        let response = self.client.get(&path).await?;

        let items = match response.body {
            Value::Array(items) => items,
            _ => Vec::new(),
        };

        if items.is_empty() {
            self.done = true;
            return Ok(None);
        }
        if (items.len() as u32) < self.per_page {
            self.done = true;
        }
        self.page += 1;
        Ok(Some(items))
    }
}

/// Pull a human-readable message out of a GitLab error body.
///
/// GitLab nests errors in several shapes: `{"message": "..."}`,
/// `{"message": {"path": ["has already been taken"]}}`, `{"error": "..."}`.
fn extract_message(text: &str) -> String {
    let Ok(body) = serde_json::from_str::<Value>(text) else {
        return text.to_string();
    };
    for key in ["message", "error"] {
        match body.get(key) {
            Some(Value::String(s)) => return s.clone(),
            Some(other) if !other.is_null() => return other.to_string(),
            _ => {}
        }
    }
    text.to_string()
}

/// Cheap structural check for collision responses. Full classification
/// (path vs storage) is the conflict resolver's job; this only decides
/// which error variant carries the text there.
fn is_conflict_shaped(status: u16, message: &str) -> bool {
    if status == 409 {
        return true;
    }
    let lower = message.to_lowercase();
    lower.contains("already been taken") || lower.contains("name on disk")
}

/// Parse a `Retry-After` header in delay-seconds form.
fn parse_retry_after(value: &str) -> Option<Duration> {
    value.parse::<u64>().ok().map(Duration::from_secs)
}

/// Gateway-class statuses worth an automatic retry.
fn is_transient_status(status: u16) -> bool {
    matches!(status, 502 | 503 | 504)
}

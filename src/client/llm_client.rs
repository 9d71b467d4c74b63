//! LLM client for OpenAI-compatible chat-completions endpoints.
//!
//! Epistemic foundation:
//! - K_i: OpenAI API schema is the de facto standard
//! - K_i: Aggregators (OpenRouter) and on-prem (vLLM, Ollama) all support it
//! - B_i: API will respond within timeout (might fail)
//! - B_i: Response will be valid JSON (might fail)
//! - I^B: Network availability unknowable → retry with backoff

use crate::client::{Completion, CompletionResponse, Message, RateLimiter, parse_delay_secs};
use crate::models::{ApiError, Config, ConfigError, CouncilError, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue, RETRY_AFTER};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::debug;

const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(10);

/// Chat completion request payload.
#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

/// Chat completion response.
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
    model: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ChatUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

/// API error response (OpenAI-compatible).
#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// Client for any OpenAI-compatible endpoint.
///
/// Features:
/// - Automatic rate limit handling with adaptive backoff
/// - Retry of transient failures (timeouts, network errors, 429, 5xx)
/// - Token tracking
pub struct LLMClient {
    client: reqwest::Client,
    /// Base URL for the API
    base_url: String,
    /// Prebuilt auth and content headers
    headers: HeaderMap,
    /// Request timeout
    timeout: Duration,
    /// Maximum attempts per request
    max_retries: u32,
    /// Rate limiter
    rate_limiter: Arc<RateLimiter>,
    // Token tracking
    total_input_tokens: AtomicU64,
    total_output_tokens: AtomicU64,
}

impl LLMClient {
    /// Create a new LLM client.
    ///
    /// # Arguments
    /// - `api_key`: Bearer credential
    /// - `base_url`: Base URL for the API
    /// - `timeout_secs`: Request timeout in seconds
    /// - `max_retries`: Maximum attempts per request
    /// - `rate_limiter`: Optional shared rate limiter
    pub fn new(
        api_key: &str,
        base_url: impl Into<String>,
        timeout_secs: u64,
        max_retries: u32,
        rate_limiter: Option<Arc<RateLimiter>>,
    ) -> Result<Self> {
        let timeout = Duration::from_secs(timeout_secs);

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(CouncilError::Network)?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            headers: Self::build_headers(api_key)?,
            timeout,
            max_retries: max_retries.max(1),
            rate_limiter: rate_limiter.unwrap_or_else(|| Arc::new(RateLimiter::new())),
            total_input_tokens: AtomicU64::new(0),
            total_output_tokens: AtomicU64::new(0),
        })
    }

    /// Create a client from configuration.
    ///
    /// Fails fast with `ConfigError::MissingApiKey` before any network activity.
    pub fn from_config(config: &Config) -> Result<Self> {
        let api_key = config.resolve_api_key()?;
        Self::new(
            &api_key,
            config.openrouter.base_url.clone(),
            config.openrouter.timeout_secs,
            config.openrouter.max_retries,
            None,
        )
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Get the rate limiter.
    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.rate_limiter
    }

    fn build_headers(api_key: &str) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        let auth = HeaderValue::from_str(&format!("Bearer {api_key}")).map_err(|_| {
            ConfigError::Invalid("API key contains characters not allowed in a header".to_string())
        })?;
        headers.insert(AUTHORIZATION, auth);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        // OpenRouter attribution headers (harmless for other providers)
        headers.insert(
            "HTTP-Referer",
            HeaderValue::from_static("https://github.com/infernet-org/council"),
        );
        headers.insert("X-Title", HeaderValue::from_static("council"));
        Ok(headers)
    }

    /// Delay before retry number `attempt` (1-based) of a failed request.
    fn backoff(attempt: u32) -> Duration {
        Duration::from_secs(1 << attempt.saturating_sub(1).min(5))
    }

    /// Complete a chat request.
    ///
    /// B_i(API available) → Result
    /// I^B(transient failures) → retried up to `max_retries` attempts; only
    /// errors classified by `CouncilError::is_retryable` get another attempt.
    pub async fn chat(
        &self,
        model: &str,
        messages: &[Message],
        max_tokens: Option<u32>,
    ) -> Result<CompletionResponse> {
        let start = Instant::now();
        let request = ChatCompletionRequest {
            model,
            messages,
            max_tokens,
        };

        let mut attempt = 0;
        loop {
            self.rate_limiter.wait_if_needed(model).await;

            let error = match self.send(&request).await {
                Ok(mut response) => {
                    response.duration = start.elapsed();
                    return Ok(response);
                }
                Err(e) => e,
            };

            attempt += 1;
            if !error.is_retryable() || attempt >= self.max_retries {
                return Err(error);
            }

            // After a 429 the rate limiter already holds this model back
            let delay = match &error {
                CouncilError::RateLimited { retry_after } => retry_after.unwrap_or_default(),
                _ => Self::backoff(attempt),
            };
            debug!(
                model = model,
                attempt = attempt,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Retrying request"
            );
            tokio::time::sleep(delay).await;
        }
    }

    /// One attempt: send, record rate-limit headers, classify the response.
    async fn send(&self, request: &ChatCompletionRequest<'_>) -> Result<CompletionResponse> {
        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .client
            .post(&url)
            .headers(self.headers.clone())
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CouncilError::Timeout(self.timeout)
                } else {
                    CouncilError::Network(e)
                }
            })?;

        let status = response.status();
        self.rate_limiter
            .record_request(request.model, status.as_u16(), response.headers());

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(parse_delay_secs);
            return Err(CouncilError::RateLimited { retry_after });
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::api_error(request.model, status, body).into());
        }

        let body: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| CouncilError::ParseError(format!("Failed to parse response: {e}")))?;

        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| {
                ApiError::InvalidResponse("no message content in response".to_string())
            })?;

        let usage = body.usage.unwrap_or_default();
        self.total_input_tokens
            .fetch_add(usage.prompt_tokens as u64, Ordering::Relaxed);
        self.total_output_tokens
            .fetch_add(usage.completion_tokens as u64, Ordering::Relaxed);

        Ok(CompletionResponse {
            content,
            model: body.model.unwrap_or_else(|| request.model.to_string()),
            input_tokens: usage.prompt_tokens,
            output_tokens: usage.completion_tokens,
            duration: Duration::ZERO,
        })
    }

    fn api_error(model: &str, status: StatusCode, body: String) -> ApiError {
        match status {
            StatusCode::UNAUTHORIZED => ApiError::AuthenticationFailed,
            StatusCode::NOT_FOUND => ApiError::ModelNotFound(model.to_string()),
            _ => {
                let message = serde_json::from_str::<ApiErrorResponse>(&body)
                    .map(|r| r.error.message)
                    .unwrap_or(body);
                ApiError::ApiError {
                    status: status.as_u16(),
                    message,
                }
            }
        }
    }

    /// Tokens consumed so far, as (input, output).
    pub fn total_tokens(&self) -> (u64, u64) {
        (
            self.total_input_tokens.load(Ordering::Relaxed),
            self.total_output_tokens.load(Ordering::Relaxed),
        )
    }

    /// Ping `GET {base_url}/models` with the configured credential.
    pub async fn health_check(&self) -> HealthCheckResult {
        let start = Instant::now();
        let response = self
            .client
            .get(format!("{}/models", self.base_url))
            .headers(self.headers.clone())
            .timeout(HEALTH_CHECK_TIMEOUT)
            .send()
            .await;
        let latency_ms = Some(start.elapsed().as_millis() as u64);

        let (status, latency_ms, error) = match response {
            Ok(r) if r.status().is_success() => (HealthStatus::Healthy, latency_ms, None),
            Ok(r) => (
                HealthStatus::Unhealthy,
                latency_ms,
                Some(format!("HTTP {}", r.status().as_u16())),
            ),
            Err(e) => (HealthStatus::Unreachable, None, Some(e.to_string())),
        };
        HealthCheckResult {
            status,
            latency_ms,
            error,
        }
    }
}

#[async_trait]
impl Completion for LLMClient {
    async fn complete(
        &self,
        model: &str,
        messages: Vec<Message>,
        max_tokens: Option<u32>,
    ) -> Result<CompletionResponse> {
        self.chat(model, &messages, max_tokens).await
    }
}

/// Health check result.
#[derive(Debug, Clone)]
pub struct HealthCheckResult {
    /// Health status
    pub status: HealthStatus,
    /// Latency in milliseconds (if reachable)
    pub latency_ms: Option<u64>,
    /// Error message (if unhealthy or unreachable)
    pub error: Option<String>,
}

/// Health status of an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    /// Endpoint is responding normally
    Healthy,
    /// Endpoint is responding but with errors
    Unhealthy,
    /// Endpoint is not reachable
    Unreachable,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "healthy"),
            HealthStatus::Unhealthy => write!(f, "unhealthy"),
            HealthStatus::Unreachable => write!(f, "unreachable"),
        }
    }
}

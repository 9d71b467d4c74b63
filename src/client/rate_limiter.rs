//! Adaptive per-model rate limiter.
//!
//! Epistemic foundation:
//! - K_i: OpenAI-compatible gateways return rate limit headers on each response
//! - K_i: 429 errors require exponential backoff
//! - B_i: Rate limits vary by model and account tier
//! - I^B: Exact rate limits unknowable until headers received
//!
//! Probes of one query hit different models, so state is keyed by model:
//! a throttled roster member never slows down its siblings.

use dashmap::DashMap;
use reqwest::header::HeaderMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Ceiling for any wait, whether computed from 429s or announced by the server.
pub const MAX_BACKOFF_SECS: f64 = 60.0;

/// Parse a server-announced delay in seconds.
///
/// B_i(header is a sane number) → Option: negative, NaN and infinite values
/// are discarded, large values are capped at `MAX_BACKOFF_SECS`.
pub fn parse_delay_secs(value: &str) -> Option<Duration> {
    let secs = value.trim().parse::<f64>().ok()?;
    if !secs.is_finite() || secs < 0.0 {
        return None;
    }
    Duration::try_from_secs_f64(secs.min(MAX_BACKOFF_SECS)).ok()
}

/// Rate limit state for a single model.
#[derive(Debug, Default)]
pub struct ModelRateLimitState {
    /// Remaining requests in current interval
    pub remaining_requests: Option<u32>,
    /// When the request limit resets
    pub reset_requests_at: Option<Instant>,
    /// Consecutive 429 errors (for backoff)
    pub consecutive_429s: u32,
    /// Backoff until this time
    pub backoff_until: Option<Instant>,
}

impl ModelRateLimitState {
    /// Get time to wait before proceeding.
    pub fn wait_time(&self) -> Duration {
        let now = Instant::now();
        let mut max_wait = Duration::ZERO;

        if let Some(backoff_until) = self.backoff_until.filter(|&t| t > now) {
            max_wait = max_wait.max(backoff_until - now);
        }

        // Exhausted quota: wait for the window to reset
        if let Some(reset_at) = self
            .reset_requests_at
            .filter(|&t| t > now && self.remaining_requests == Some(0))
        {
            max_wait = max_wait.max(reset_at - now);
        }

        max_wait
    }

    /// Record a 429 error and calculate backoff.
    pub fn record_429(&mut self) {
        self.consecutive_429s += 1;
        let backoff_secs = 2.0_f64
            .powi(self.consecutive_429s as i32)
            .min(MAX_BACKOFF_SECS);
        self.backoff_until = Some(Instant::now() + Duration::from_secs_f64(backoff_secs));
        warn!(
            consecutive_429s = self.consecutive_429s,
            backoff_secs = backoff_secs,
            "Rate limited (429), backing off"
        );
    }

    /// Record a successful request.
    pub fn record_success(&mut self) {
        if self.consecutive_429s > 0 {
            self.consecutive_429s = 0;
            self.backoff_until = None;
        }
    }

    /// Update state from response headers.
    pub fn update_from_headers(&mut self, headers: &HeaderMap) {
        let header = |key: &str| headers.get(key)?.to_str().ok();

        if let Some(remaining) = header("x-ratelimit-remaining-requests") {
            self.remaining_requests = remaining.parse().ok();
        }
        if let Some(value) = header("x-ratelimit-reset-requests") {
            self.reset_requests_at = parse_delay_secs(value).map(|delay| Instant::now() + delay);
        }
    }
}

/// Adaptive rate limiter shared by all requests of one client.
#[derive(Debug, Default)]
pub struct RateLimiter {
    /// Per-model rate limit state
    states: DashMap<String, ModelRateLimitState>,
    total_requests: AtomicU64,
    total_429s: AtomicU64,
    total_wait_ms: AtomicU64,
}

impl RateLimiter {
    /// Create a new rate limiter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait if necessary before making a request to the given model.
    ///
    /// Returns the duration waited.
    pub async fn wait_if_needed(&self, model: &str) -> Duration {
        // Guard must be released before sleeping
        let wait_time = self
            .states
            .get(model)
            .map(|state| state.wait_time())
            .unwrap_or_default();

        if wait_time > Duration::ZERO {
            debug!(
                model = model,
                wait_ms = wait_time.as_millis() as u64,
                "Waiting for rate limit"
            );
            self.total_wait_ms
                .fetch_add(wait_time.as_millis() as u64, Ordering::Relaxed);
            tokio::time::sleep(wait_time).await;
        }

        wait_time
    }

    /// Record a request result.
    pub fn record_request(&self, model: &str, status: u16, headers: &HeaderMap) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);

        let mut state = self.states.entry(model.to_string()).or_default();
        state.update_from_headers(headers);

        if status == 429 {
            self.total_429s.fetch_add(1, Ordering::Relaxed);
            state.record_429();
        } else if status < 400 {
            state.record_success();
        }
    }

    /// Get statistics.
    pub fn stats(&self) -> RateLimiterStats {
        let total_requests = self.total_requests.load(Ordering::Relaxed);
        let total_429s = self.total_429s.load(Ordering::Relaxed);
        let total_wait_ms = self.total_wait_ms.load(Ordering::Relaxed);

        RateLimiterStats {
            total_requests,
            total_429s,
            total_wait_secs: total_wait_ms as f64 / 1000.0,
            models_tracked: self.states.len(),
        }
    }
}

/// Rate limiter statistics.
#[derive(Debug, Clone)]
pub struct RateLimiterStats {
    pub total_requests: u64,
    pub total_429s: u64,
    pub total_wait_secs: f64,
    pub models_tracked: usize,
}

//! Error types for council.
//!
//! Epistemic taxonomy:
//! - B_i falsified: Expected failures (bad config, unknown tier, empty query)
//! - I^B materialized: Infrastructure failures (network, timeout, judge down)
//! - K_i violated: Internal invariant violations (bugs)

use std::time::Duration;
use thiserror::Error;

/// Top-level error type for council.
#[derive(Debug, Error)]
pub enum CouncilError {
    // ═══════════════════════════════════════════════════════════════════
    // B_i FALSIFIED: Belief proven wrong (expected failures)
    // ═══════════════════════════════════════════════════════════════════

    #[error("Configuration error: {0}")]
    Config(#[from] super::ConfigError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    // ═══════════════════════════════════════════════════════════════════
    // I^B MATERIALIZED: Bounded ignorance became known-bad
    // ═══════════════════════════════════════════════════════════════════

    #[error("API error: {0}")]
    Api(#[from] ApiError),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Request timeout after {0:?}")]
    Timeout(Duration),

    /// `retry_after` is the server's hint, already bounded and sanity-checked.
    #[error("Rate limited by the endpoint (retry hint: {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },

    #[error("No model in the roster produced an answer ({attempted} attempted)")]
    NoSuccessfulProbes { attempted: usize },

    #[error("Judge model {model} could not produce an answer: {source}")]
    JudgeFailed {
        model: String,
        #[source]
        source: Box<CouncilError>,
    },

    #[error("Deadline of {0:?} exceeded before an answer was produced")]
    DeadlineExceeded(Duration),

    // ═══════════════════════════════════════════════════════════════════
    // K_i VIOLATED: Invariant broken (bug, should not happen)
    // ═══════════════════════════════════════════════════════════════════

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Errors reported by an OpenAI-compatible endpoint.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Authentication failed: invalid API key")]
    AuthenticationFailed,

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("API error (status {status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl CouncilError {
    /// Wrap a failure of the synthesis call.
    pub fn judge_failed(model: impl Into<String>, source: CouncilError) -> Self {
        Self::JudgeFailed {
            model: model.into(),
            source: Box::new(source),
        }
    }

    /// Transient failures worth another attempt against the same model.
    ///
    /// Authentication, unknown model and other 4xx answers are final.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout(_) | Self::RateLimited { .. } | Self::Network(_)
        ) || matches!(self, Self::Api(ApiError::ApiError { status, .. }) if *status >= 500)
    }

    /// True for errors raised before any network activity took place.
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}

/// Result type alias for council.
pub type Result<T> = std::result::Result<T, CouncilError>;

//! Query, probe and synthesis records.
//!
//! Epistemic foundation:
//! - K_i: One ProbeResult per roster entry, in roster order
//! - B_i: Each probe may succeed or fail → ProbeOutcome
//! - K_i: A SynthesisResult only exists if the judge answered

use super::{CouncilError, Result, Tier};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// A user question bound to a tier. Immutable once issued.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    id: String,
    query: String,
    tier: Tier,
    issued_at: DateTime<Utc>,
}

impl QueryRequest {
    /// Create a request.
    ///
    /// B_i(query has content) → Result
    pub fn new(query: impl Into<String>, tier: Tier) -> Result<Self> {
        let query = query.into();
        if query.trim().is_empty() {
            return Err(CouncilError::InvalidInput("query is empty".to_string()));
        }
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            query,
            tier,
            issued_at: Utc::now(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn tier(&self) -> Tier {
        self.tier
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }
}

/// What a single roster model produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ProbeOutcome {
    Success { text: String },
    Failure { reason: String },
}

/// Outcome of probing one roster model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeResult {
    /// Roster model that was asked
    pub model: String,
    pub outcome: ProbeOutcome,
    /// Wall time spent on this probe, retries included
    pub elapsed_ms: u64,
}

impl ProbeResult {
    pub fn success(model: impl Into<String>, text: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            model: model.into(),
            outcome: ProbeOutcome::Success { text: text.into() },
            elapsed_ms: elapsed.as_millis() as u64,
        }
    }

    pub fn failure(model: impl Into<String>, reason: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            model: model.into(),
            outcome: ProbeOutcome::Failure {
                reason: reason.into(),
            },
            elapsed_ms: elapsed.as_millis() as u64,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, ProbeOutcome::Success { .. })
    }

    /// Text of a successful probe.
    pub fn text(&self) -> Option<&str> {
        match &self.outcome {
            ProbeOutcome::Success { text } => Some(text),
            ProbeOutcome::Failure { .. } => None,
        }
    }

    /// Reason a failed probe gave.
    pub fn failure_reason(&self) -> Option<&str> {
        match &self.outcome {
            ProbeOutcome::Success { .. } => None,
            ProbeOutcome::Failure { reason } => Some(reason),
        }
    }
}

/// Surviving probe texts, in roster order, failures dropped.
pub fn surviving_texts(probes: &[ProbeResult]) -> Vec<&str> {
    probes.iter().filter_map(ProbeResult::text).collect()
}

/// Final answer for one QueryRequest, with probe diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesisResult {
    pub request_id: String,
    pub tier: Tier,
    /// Judge output, verbatim
    pub text: String,
    /// Model that produced `text`
    pub judge_model: String,
    /// One entry per roster model, in roster order
    pub probes: Vec<ProbeResult>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub elapsed_ms: u64,
}

impl SynthesisResult {
    pub fn succeeded(&self) -> usize {
        self.probes.iter().filter(|p| p.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.probes.len() - self.succeeded()
    }
}

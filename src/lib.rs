//! council - Multi-model consensus over OpenAI-compatible endpoints.
//!
//! ## Architecture
//!
//! A query runs through two phases:
//! - **Probing**: the tier's roster of models answers the query concurrently
//! - **Synthesis**: one judge model merges the surviving answers into one
//!
//! Per-probe failures are isolated and logged; the judge sees only the
//! successful answers, in roster order. A judge failure is fatal.
//!
//! ## Epistemic Design
//!
//! - K_i (Knowledge): Compile-time enforced invariants (tiers, phases)
//! - B_i (Beliefs): Runtime fallible operations (Result, Option)
//! - I^R (Resolvable): User-configurable parameters
//! - I^B (Bounded): Network/API uncertainties (retry, backoff, deadline)

pub mod client;
pub mod council;
pub mod models;

// Re-exports for convenience
pub use client::{Completion, CompletionResponse, LLMClient, Message, RateLimiter};
pub use council::{ConsensusOrchestrator, Judge, OrchestratorSettings, RosterSelector};
pub use models::{
    Config, ConfigError, ConversationState, CouncilError, ProbeResult, QueryRequest, Result,
    SynthesisResult, Tier,
};

//! Consensus orchestrator: probe fan-out, then one judge call.
//!
//! Epistemic foundation:
//! - K_i: Probing → Synthesizing → Complete | Failed
//! - K_i: The judge never starts before every probe has settled
//! - B_i: Each probe may fail → recorded, excluded, never fatal on its own
//! - B_i: The judge may fail → fatal, propagated to the caller
//! - I^R: Concurrency cap, token caps and deadline are configurable

use super::fanout::isolate_and_collect;
use super::{Judge, RosterSelector};
use crate::client::{Completion, Message};
use crate::models::{
    Config, CouncilError, ProbeResult, QueryRequest, Result, SynthesisResult, Tier,
    surviving_texts,
};
use chrono::Utc;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Orchestration phase, for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Probing,
    Synthesizing,
    Complete,
    Failed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Probing => "probing",
            Phase::Synthesizing => "synthesizing",
            Phase::Complete => "complete",
            Phase::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Tunables for one orchestrator.
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    /// Output cap for each probe
    pub probe_max_tokens: u32,
    /// Upper bound on probes in flight
    pub max_concurrent_probes: usize,
    /// Default overall deadline per query
    pub deadline: Option<Duration>,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            probe_max_tokens: 500,
            max_concurrent_probes: 5,
            deadline: None,
        }
    }
}

/// Fans a query out to a tier's roster and has the judge synthesize the answers.
///
/// Stateless between calls: every `synthesize` builds its own request and
/// returns a result the caller owns. The client is shared read-only by all
/// probes.
pub struct ConsensusOrchestrator {
    client: Arc<dyn Completion>,
    rosters: RosterSelector,
    judge: Judge,
    settings: OrchestratorSettings,
}

impl ConsensusOrchestrator {
    /// Create an orchestrator.
    pub fn new(
        client: Arc<dyn Completion>,
        rosters: RosterSelector,
        judge: Judge,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            client,
            rosters,
            judge,
            settings,
        }
    }

    /// Create an orchestrator from configuration.
    ///
    /// B_i(rosters valid) → Result
    pub fn from_config(config: &Config, client: Arc<dyn Completion>) -> Result<Self> {
        config.validate()?;
        let rosters = RosterSelector::from_config(&config.tiers)?;

        let mut judge = Judge::new(config.council.judge_model.clone())
            .with_max_tokens(config.council.judge_max_tokens);
        if let Some(prompt) = &config.council.judge_system_prompt {
            judge = judge.with_system_prompt(prompt.clone());
        }

        let settings = OrchestratorSettings {
            probe_max_tokens: config.council.probe_max_tokens,
            max_concurrent_probes: config.council.max_concurrent_probes,
            deadline: config.council.deadline(),
        };

        Ok(Self::new(client, rosters, judge, settings))
    }

    /// Answer `query` with the council for `tier`.
    pub async fn synthesize(&self, query: &str, tier: Tier) -> Result<SynthesisResult> {
        self.synthesize_with_deadline(query, tier, self.settings.deadline)
            .await
    }

    /// Like [`synthesize`](Self::synthesize), with the tier given by name.
    ///
    /// An unknown name fails before any request is sent.
    pub async fn synthesize_named(&self, query: &str, tier_name: &str) -> Result<SynthesisResult> {
        let (tier, _) = self.rosters.resolve(tier_name)?;
        self.synthesize(query, tier).await
    }

    /// Answer `query`, giving up once `deadline` has elapsed.
    ///
    /// On expiry all in-flight probes and the judge call are dropped.
    pub async fn synthesize_with_deadline(
        &self,
        query: &str,
        tier: Tier,
        deadline: Option<Duration>,
    ) -> Result<SynthesisResult> {
        let request = QueryRequest::new(query, tier)?;

        match deadline {
            Some(limit) => tokio::time::timeout(limit, self.run(&request))
                .await
                .map_err(|_| {
                    warn!(
                        request_id = %request.id(),
                        deadline_ms = limit.as_millis() as u64,
                        "Deadline exceeded, cancelling"
                    );
                    CouncilError::DeadlineExceeded(limit)
                })?,
            None => self.run(&request).await,
        }
    }

    async fn run(&self, request: &QueryRequest) -> Result<SynthesisResult> {
        let start = Instant::now();
        let roster = self.rosters.roster(request.tier());

        info!(
            request_id = %request.id(),
            tier = %request.tier(),
            roster_size = roster.len(),
            "Consulting council"
        );
        self.enter(request, Phase::Probing);

        // Phase A: probes
        let probes = self.probe_all(request, roster).await;
        let texts = surviving_texts(&probes);
        let failed = probes.len() - texts.len();

        info!(
            request_id = %request.id(),
            succeeded = texts.len(),
            failed = failed,
            "Probes settled"
        );

        if texts.is_empty() {
            self.enter(request, Phase::Failed);
            return Err(CouncilError::NoSuccessfulProbes {
                attempted: probes.len(),
            });
        }

        // Phase B: judge
        self.enter(request, Phase::Synthesizing);
        let text = match self
            .judge
            .synthesize(self.client.as_ref(), request.query(), &texts)
            .await
        {
            Ok(text) => text,
            Err(e) => {
                warn!(request_id = %request.id(), error = %e, "Synthesis failed");
                self.enter(request, Phase::Failed);
                return Err(e);
            }
        };
        self.enter(request, Phase::Complete);

        Ok(SynthesisResult {
            request_id: request.id().to_string(),
            tier: request.tier(),
            text,
            judge_model: self.judge.model().to_string(),
            probes,
            started_at: request.issued_at(),
            completed_at: Utc::now(),
            elapsed_ms: start.elapsed().as_millis() as u64,
        })
    }

    /// Probe every roster model; one ProbeResult per model, roster order.
    async fn probe_all(&self, request: &QueryRequest, roster: &[String]) -> Vec<ProbeResult> {
        let max_tokens = self.settings.probe_max_tokens;
        let query = request.query().to_string();

        let settled = isolate_and_collect(
            roster.to_vec(),
            self.settings.max_concurrent_probes,
            |model| {
                let client = Arc::clone(&self.client);
                let messages = vec![Message::user(query.clone())];
                async move {
                    client
                        .complete(&model, messages, Some(max_tokens))
                        .await
                        .map(|response| response.content)
                }
            },
        )
        .await;

        roster
            .iter()
            .zip(settled)
            .map(|(model, settled)| match settled.result {
                Ok(text) => {
                    debug!(
                        request_id = %request.id(),
                        model = %model,
                        elapsed_ms = settled.elapsed.as_millis() as u64,
                        "Probe succeeded"
                    );
                    ProbeResult::success(model, text, settled.elapsed)
                }
                Err(e) => {
                    warn!(
                        request_id = %request.id(),
                        model = %model,
                        error = %e,
                        "Probe failed, dropping from aggregate"
                    );
                    ProbeResult::failure(model, e.to_string(), settled.elapsed)
                }
            })
            .collect()
    }

    fn enter(&self, request: &QueryRequest, phase: Phase) {
        debug!(request_id = %request.id(), phase = %phase, "Phase transition");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::CompletionResponse;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Echoes the model name; the judge returns the user prompt it saw.
    struct EchoClient {
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Completion for EchoClient {
        async fn complete(
            &self,
            model: &str,
            messages: Vec<Message>,
            _max_tokens: Option<u32>,
        ) -> Result<CompletionResponse> {
            self.calls.lock().unwrap().push(model.to_string());
            let last = messages.last().map(|m| m.content.clone()).unwrap_or_default();
            if model == "judge" {
                Ok(CompletionResponse::text(model, last))
            } else {
                Ok(CompletionResponse::text(model, format!("{model} says hi")))
            }
        }
    }

    fn orchestrator(client: Arc<EchoClient>) -> ConsensusOrchestrator {
        ConsensusOrchestrator::new(
            client,
            RosterSelector::default(),
            Judge::new("judge"),
            OrchestratorSettings::default(),
        )
    }

    #[tokio::test]
    async fn test_probe_then_judge_call_order() {
        let client = Arc::new(EchoClient {
            calls: Mutex::new(Vec::new()),
        });
        let result = orchestrator(Arc::clone(&client))
            .synthesize("hello?", Tier::Lite)
            .await
            .unwrap();

        let calls = client.calls.lock().unwrap().clone();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls.last().unwrap(), "judge");
        assert_eq!(result.succeeded(), 2);
        assert_eq!(result.failed(), 0);
        assert!(result.text.contains("openai/gpt-4o-mini says hi"));
        assert_eq!(result.judge_model, "judge");
        assert!(result.started_at <= result.completed_at);
    }

    #[tokio::test]
    async fn test_empty_query_sends_nothing() {
        let client = Arc::new(EchoClient {
            calls: Mutex::new(Vec::new()),
        });
        let err = orchestrator(Arc::clone(&client))
            .synthesize("  ", Tier::Meta)
            .await
            .unwrap_err();
        assert!(matches!(err, CouncilError::InvalidInput(_)));
        assert!(client.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_from_config_rejects_empty_roster() {
        let mut config = Config::default();
        config.tiers.meta = Some(Vec::new());
        let client = Arc::new(EchoClient {
            calls: Mutex::new(Vec::new()),
        });
        let result = ConsensusOrchestrator::from_config(&config, client);
        assert!(matches!(result, Err(CouncilError::Config(_))));
    }
}

//! Caller-owned conversation state.
//!
//! The orchestrator never sees this value: the conversation hands it only the
//! current query and tier, and records the answer itself.

use super::{Result, SynthesisResult, Tier};
use crate::council::ConsensusOrchestrator;
use serde::{Deserialize, Serialize};

/// Who spoke a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One entry in the conversation history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

/// Selected tier plus completed exchanges.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversationState {
    pub tier: Tier,
    turns: Vec<Turn>,
}

impl ConversationState {
    pub fn new(tier: Tier) -> Self {
        Self {
            tier,
            turns: Vec::new(),
        }
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }

    /// Ask the council and record the exchange.
    ///
    /// On failure the history is left as it was before the call.
    pub async fn ask(
        &mut self,
        orchestrator: &ConsensusOrchestrator,
        query: &str,
    ) -> Result<SynthesisResult> {
        self.turns.push(Turn {
            role: Role::User,
            content: query.to_string(),
        });

        match orchestrator.synthesize(query, self.tier).await {
            Ok(result) => {
                self.turns.push(Turn {
                    role: Role::Assistant,
                    content: result.text.clone(),
                });
                Ok(result)
            }
            Err(e) => {
                self.turns.pop();
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{Completion, CompletionResponse, Message};
    use crate::council::{Judge, OrchestratorSettings, RosterSelector};
    use crate::models::{CouncilError, TiersConfig};
    use async_trait::async_trait;
    use std::sync::Arc;

    struct FixedClient {
        judge_fails: bool,
    }

    #[async_trait]
    impl Completion for FixedClient {
        async fn complete(
            &self,
            model: &str,
            _messages: Vec<Message>,
            _max_tokens: Option<u32>,
        ) -> Result<CompletionResponse> {
            if model == "judge" && self.judge_fails {
                return Err(CouncilError::Internal("judge down".to_string()));
            }
            Ok(CompletionResponse::text(model, format!("from {model}")))
        }
    }

    fn orchestrator(judge_fails: bool) -> ConsensusOrchestrator {
        let tiers = TiersConfig {
            lite: Some(vec!["m1".to_string()]),
            ..Default::default()
        };
        ConsensusOrchestrator::new(
            Arc::new(FixedClient { judge_fails }),
            RosterSelector::from_config(&tiers).unwrap(),
            Judge::new("judge"),
            OrchestratorSettings::default(),
        )
    }

    #[tokio::test]
    async fn test_ask_records_exchange() {
        let mut state = ConversationState::new(Tier::Lite);
        let result = state.ask(&orchestrator(false), "Hi?").await.unwrap();

        assert_eq!(result.text, "from judge");
        assert_eq!(state.turns().len(), 2);
        assert_eq!(state.turns()[0].role, Role::User);
        assert_eq!(state.turns()[1].content, "from judge");
        assert_eq!(state.turns()[1].role, Role::Assistant);
    }

    #[tokio::test]
    async fn test_failed_ask_leaves_history_untouched() {
        let mut state = ConversationState::new(Tier::Lite);
        let err = state.ask(&orchestrator(true), "Hi?").await.unwrap_err();

        assert!(matches!(err, CouncilError::JudgeFailed { .. }));
        assert!(state.is_empty());
    }
}

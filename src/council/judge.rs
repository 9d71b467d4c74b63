//! Judge synthesis.
//!
//! Epistemic foundation:
//! - K_i: Exactly one completion call per synthesis
//! - K_i: Responses are presented anonymously, in roster order
//! - B_i: The judge may fail → fatal, there is no fallback judge

use crate::client::{Completion, Message};
use crate::models::{CouncilError, Result};
use tracing::debug;

/// Instruction given to the judge when config does not replace it.
pub const DEFAULT_JUDGE_SYSTEM_PROMPT: &str = "You are the final judge of an expert council. \
You receive several independent answers to the same user question. Compare them, merge \
what they agree on, drop repetition, and resolve contradictions using your own judgment. \
Reply with one concise, authoritative answer addressed directly to the user. Never mention \
the individual responses, their authors, models or providers, and never describe yourself \
as an aggregate or summary of other answers.";

/// Build the user turn handed to the judge.
///
/// Entries are numbered in the order given; model names are withheld.
pub fn build_judge_user_prompt(query: &str, responses: &[&str]) -> String {
    let mut prompt = String::from("## Expert responses\n");
    for (i, response) in responses.iter().enumerate() {
        prompt.push_str(&format!("\n### Response {}\n{}\n", i + 1, response.trim()));
    }
    prompt.push_str(&format!("\n## User question\n{query}"));
    prompt
}

/// The single designated synthesis model.
#[derive(Debug, Clone)]
pub struct Judge {
    model: String,
    system_prompt: String,
    max_tokens: Option<u32>,
}

impl Judge {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            system_prompt: DEFAULT_JUDGE_SYSTEM_PROMPT.to_string(),
            max_tokens: None,
        }
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = system_prompt.into();
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// Messages for one synthesis call.
    pub fn messages(&self, query: &str, responses: &[&str]) -> Vec<Message> {
        vec![
            Message::system(&self.system_prompt),
            Message::user(build_judge_user_prompt(query, responses)),
        ]
    }

    /// Synthesize one answer from the surviving responses.
    ///
    /// B_i(at least one response) → Result
    /// B_i(judge answers) → Result, raw text returned untouched
    pub async fn synthesize(
        &self,
        client: &dyn Completion,
        query: &str,
        responses: &[&str],
    ) -> Result<String> {
        if responses.is_empty() {
            return Err(CouncilError::NoSuccessfulProbes { attempted: 0 });
        }

        debug!(
            judge_model = %self.model,
            responses = responses.len(),
            "Requesting synthesis"
        );

        let response = client
            .complete(&self.model, self.messages(query, responses), self.max_tokens)
            .await
            .map_err(|e| CouncilError::judge_failed(&self.model, e))?;

        Ok(response.content)
    }
}

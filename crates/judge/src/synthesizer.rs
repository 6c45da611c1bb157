//! Judge Synthesizer: builds the anonymized synthesis prompt, makes a
//! single no-retry call to the judge model, and returns the merged
//! answer.

use std::time::Duration;

use aggregator_contracts::model::{DebateRound, Message};
use aggregator_model_client::{CallOptions, ModelGateway};
use aggregator_contracts::error::RemoteError;

use crate::prompt::{anonymize, system_prompt, user_message};

#[derive(Debug, Clone)]
pub struct JudgeConfig {
    pub default_judge_model: String,
    pub timeout: Duration,
    pub max_answer_length_for_judge: usize,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            default_judge_model: "openai/gpt-4o".to_string(),
            timeout: Duration::from_millis(45_000),
            max_answer_length_for_judge: 4_000,
            temperature: 0.3,
            max_tokens: 2_000,
        }
    }
}

/// The inputs a judge call needs. `successful_answers` is `(model_id,
/// answer)` pairs — non-empty by contract; callers validate before
/// constructing this.
pub struct JudgeRequest<'a> {
    pub user_prompt: &'a str,
    pub successful_answers: &'a [(String, String)],
    pub debate_rounds: &'a [DebateRound],
    pub judge_model_override: Option<&'a str>,
    pub research_mode: bool,
}

pub struct JudgeSynthesizer {
    gateway: std::sync::Arc<dyn ModelGateway>,
    config: JudgeConfig,
}

impl JudgeSynthesizer {
    pub fn new(gateway: std::sync::Arc<dyn ModelGateway>, config: JudgeConfig) -> Self {
        Self { gateway, config }
    }

    /// Runs one judge call and returns the merged answer. No retries —
    /// a judge failure is the caller's responsibility to fall back on.
    pub async fn judge_and_merge(&self, request: JudgeRequest<'_>) -> Result<String, RemoteError> {
        let model_id = request.judge_model_override.unwrap_or(&self.config.default_judge_model);

        let anonymized = anonymize(request.successful_answers, self.config.max_answer_length_for_judge);
        let system = system_prompt(request.research_mode);
        let user = user_message(request.user_prompt, request.debate_rounds, &anonymized);

        let messages = [Message::system(system), Message::user(user)];

        let options = CallOptions {
            temperature: Some(self.config.temperature),
            max_tokens: Some(self.config.max_tokens),
        };

        tracing::info!(model_id, num_answers = anonymized.len(), research_mode = request.research_mode, "invoking judge");

        let outcome = self.gateway.call_model(model_id, &messages, self.config.timeout, options).await?;
        Ok(outcome.answer)
    }
}

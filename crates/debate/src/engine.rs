//! The debate state machine: `initial -> feedback_r -> refine_r -> ...
//! -> done` for `r` in `1..=max_debate_rounds`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;

use aggregator_contracts::model::{DebateRound, Message, PerModelAnswer, Role};
use aggregator_model_client::{CallOptions, ModelGateway};

use crate::prompt::{
    anonymize_truncated, feedback_prompt, refinement_system_prompt, refinement_user_message, GENERIC_FEEDBACK,
};

#[derive(Debug, Clone)]
pub struct DebateConfig {
    pub max_rounds: u32,
    pub judge_feedback_timeout: Duration,
    pub debate_timeout: Duration,
    pub feedback_truncate_chars: usize,
    pub peer_truncate_chars: usize,
}

impl Default for DebateConfig {
    fn default() -> Self {
        Self {
            max_rounds: 2,
            judge_feedback_timeout: Duration::from_millis(15_000),
            debate_timeout: Duration::from_millis(30_000),
            feedback_truncate_chars: 500,
            peer_truncate_chars: 300,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DebateOutput {
    pub debate_rounds: Vec<DebateRound>,
    pub final_answers: Vec<(String, String)>,
    pub total_latency_ms: u64,
}

pub struct DebateEngine {
    gateway: Arc<dyn ModelGateway>,
    config: DebateConfig,
}

impl DebateEngine {
    pub fn new(gateway: Arc<dyn ModelGateway>, config: DebateConfig) -> Self {
        Self { gateway, config }
    }

    /// Runs the debate to completion: exactly `max_rounds` rounds, no
    /// early exit. `max_rounds = 0` is identity on the inputs.
    ///
    /// Never fails: a judge-feedback failure is replaced with a
    /// generic feedback string, and a model that fails a refinement
    /// call keeps its previous answer.
    pub async fn run(
        &self,
        user_prompt: &str,
        judge_model: &str,
        initial_answers: Vec<(String, String)>,
    ) -> DebateOutput {
        let started = Instant::now();

        if self.config.max_rounds == 0 {
            return DebateOutput {
                debate_rounds: Vec::new(),
                final_answers: initial_answers,
                total_latency_ms: started.elapsed().as_millis() as u64,
            };
        }

        let mut current = initial_answers;
        let mut rounds = Vec::with_capacity(self.config.max_rounds as usize);

        for round_index in 1..=self.config.max_rounds {
            let feedback = self.get_feedback(user_prompt, judge_model, &current).await;
            let (updated, per_model_answers) = self.refine_round(user_prompt, round_index, &feedback, &current).await;
            current = updated;
            rounds.push(DebateRound { round_index, judge_feedback: feedback, per_model_answers });
        }

        DebateOutput {
            debate_rounds: rounds,
            final_answers: current,
            total_latency_ms: started.elapsed().as_millis() as u64,
        }
    }

    async fn get_feedback(&self, user_prompt: &str, judge_model: &str, current: &[(String, String)]) -> String {
        let anonymized = anonymize_truncated(current, self.config.feedback_truncate_chars);
        let prompt = feedback_prompt(user_prompt, &anonymized);
        let messages = [Message { role: Role::User, content: prompt }];

        match self
            .gateway
            .call_model(judge_model, &messages, self.config.judge_feedback_timeout, CallOptions::default())
            .await
        {
            Ok(outcome) => outcome.answer,
            Err(err) => {
                tracing::warn!(error = %err, "judge feedback call failed, using generic feedback");
                GENERIC_FEEDBACK.to_string()
            }
        }
    }

    async fn refine_round(
        &self,
        user_prompt: &str,
        round_index: u32,
        feedback: &str,
        current: &[(String, String)],
    ) -> (Vec<(String, String)>, Vec<PerModelAnswer>) {
        let futures = current.iter().enumerate().map(|(i, (model_id, previous_answer))| {
            let others: Vec<(String, String)> =
                current.iter().enumerate().filter(|(j, _)| *j != i).map(|(_, pair)| pair.clone()).collect();
            let other_answers = anonymize_truncated(&others, self.config.peer_truncate_chars);

            let system = refinement_system_prompt(round_index, feedback);
            let user = refinement_user_message(user_prompt, feedback, previous_answer, &other_answers);
            let messages = [Message::system(system), Message::user(user)];

            let model_id = model_id.clone();
            let previous_answer = previous_answer.clone();
            async move {
                match self
                    .gateway
                    .call_model(&model_id, &messages, self.config.debate_timeout, CallOptions::default())
                    .await
                {
                    Ok(outcome) => (model_id, outcome.answer, outcome.latency_ms),
                    Err(err) => {
                        tracing::warn!(model_id = %model_id, error = %err, "refinement call failed, retaining previous answer");
                        (model_id, previous_answer, 0)
                    }
                }
            }
        });

        let results = join_all(futures).await;
        let per_model_answers = results
            .iter()
            .map(|(model_id, answer, latency_ms)| PerModelAnswer {
                model_id: model_id.clone(),
                answer: answer.clone(),
                latency_ms: *latency_ms,
            })
            .collect();
        let updated = results.into_iter().map(|(model_id, answer, _)| (model_id, answer)).collect();
        (updated, per_model_answers)
    }
}

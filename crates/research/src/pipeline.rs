//! The Research Pipeline: search, researched answers, debate, judge,
//! citation aggregation.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;

use aggregator_contracts::error::{PipelineError, RemoteError};
use aggregator_contracts::model::{DebateRound, Message, ModelCallResult, ResearchContext};
use aggregator_debate::{DebateConfig, DebateEngine};
use aggregator_judge::{JudgeConfig, JudgeRequest, JudgeSynthesizer};
use aggregator_model_client::{CallOptions, ModelGateway};

use crate::search::{format_sources_block, run_web_search, SearchProvider};
use crate::citation::aggregate_citations;

const RESEARCH_TEMPERATURE: f32 = 0.3;
const RESEARCH_MAX_TOKENS: u32 = 3_000;

#[derive(Debug, Clone)]
pub struct ResearchConfig {
    pub max_search_results: u32,
    pub per_model_timeout: Duration,
    pub debate: DebateConfig,
    pub judge: JudgeConfig,
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            max_search_results: 8,
            per_model_timeout: Duration::from_millis(45_000),
            debate: DebateConfig::default(),
            judge: JudgeConfig::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResearchOutput {
    pub final_answer: String,
    pub citations: Vec<String>,
    pub research_context: ResearchContext,
    pub debate_round_count: usize,
    pub per_model_answers: Vec<ModelCallResult>,
    pub debate_rounds: Vec<DebateRound>,
}

pub struct ResearchPipeline {
    gateway: Arc<dyn ModelGateway>,
    judge: JudgeSynthesizer,
    debate: DebateEngine,
    config: ResearchConfig,
}

impl ResearchPipeline {
    pub fn new(gateway: Arc<dyn ModelGateway>, config: ResearchConfig) -> Self {
        let judge = JudgeSynthesizer::new(gateway.clone(), config.judge.clone());
        let debate = DebateEngine::new(gateway.clone(), config.debate.clone());
        Self { gateway, judge, debate, config }
    }

    pub async fn run(
        &self,
        search_provider: Option<&dyn SearchProvider>,
        query: &str,
        model_ids: &[String],
        judge_model: &str,
    ) -> Result<ResearchOutput, PipelineError> {
        // Stage 1: web search.
        let research_context = run_web_search(search_provider, query, Some(self.config.max_search_results)).await;
        let sources_block = format_sources_block(&research_context);

        // Stage 2: researched answers.
        let per_model_answers = self.fan_out_researched_answers(query, &sources_block, model_ids).await;
        let successful: Vec<(String, String)> = per_model_answers
            .iter()
            .filter(|r| r.success)
            .map(|r| (r.model_id.clone(), r.answer.clone().unwrap_or_default()))
            .collect();

        if successful.is_empty() {
            return Err(PipelineError::NoSuccessfulAnswers);
        }

        // Stage 3: debate.
        let debate_output = self.debate.run(query, judge_model, successful).await;

        // Stage 4: judge, in research mode, with the research summary
        // appended when sources exist.
        let judge_prompt = if research_context.has_sources() {
            format!("{query}\n\nResearch summary: {}", research_context.summary)
        } else {
            query.to_string()
        };

        let judge_answer = match self
            .judge
            .judge_and_merge(JudgeRequest {
                user_prompt: &judge_prompt,
                successful_answers: &debate_output.final_answers,
                debate_rounds: &debate_output.debate_rounds,
                judge_model_override: Some(judge_model),
                research_mode: true,
            })
            .await
        {
            Ok(answer) => answer,
            Err(err) => {
                tracing::warn!(error = %err, "judge call failed, falling back to first answer");
                debate_output.final_answers[0].1.clone()
            }
        };

        // Stage 5: citation aggregation.
        let per_model_texts: Vec<String> = debate_output.final_answers.iter().map(|(_, a)| a.clone()).collect();
        let citations = aggregate_citations(&research_context, &judge_answer, &per_model_texts);

        Ok(ResearchOutput {
            final_answer: judge_answer,
            citations,
            research_context,
            debate_round_count: debate_output.debate_rounds.len(),
            per_model_answers,
            debate_rounds: debate_output.debate_rounds,
        })
    }

    async fn fan_out_researched_answers(
        &self,
        query: &str,
        sources_block: &str,
        model_ids: &[String],
    ) -> Vec<ModelCallResult> {
        let system = research_system_prompt();
        let user = format!("Question:\n{query}\n\n{sources_block}");
        let options = CallOptions { temperature: Some(RESEARCH_TEMPERATURE), max_tokens: Some(RESEARCH_MAX_TOKENS) };

        let futures = model_ids.iter().map(|model_id| {
            let gateway = self.gateway.clone();
            let model_id = model_id.clone();
            let messages = vec![Message::system(system.clone()), Message::user(user.clone())];
            let timeout = self.config.per_model_timeout;
            let options = options.clone();
            async move {
                match gateway.call_model(&model_id, &messages, timeout, options).await {
                    Ok(outcome) if outcome.answer.trim().is_empty() => {
                        ModelCallResult::failure(model_id, "empty answer", outcome.latency_ms)
                    }
                    Ok(outcome) => ModelCallResult::success(model_id, outcome.answer, outcome.latency_ms),
                    Err(err) => map_failure(model_id, err),
                }
            }
        });

        join_all(futures).await
    }
}

fn research_system_prompt() -> String {
    "You are answering using the research sources provided below. Cite sources inline using \
    the form [Source N] matching the numbered source list. Prioritize the research sources over \
    your training knowledge, and be honest about any gaps the sources don't cover."
        .to_string()
}

fn map_failure(model_id: String, err: RemoteError) -> ModelCallResult {
    ModelCallResult::failure(model_id, err.to_string(), 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use aggregator_model_client::{CallOutcome, ImageOutput};
    use std::collections::HashMap;

    struct ScriptedGateway {
        answers: HashMap<String, String>,
    }

    #[async_trait]
    impl ModelGateway for ScriptedGateway {
        async fn call_model(
            &self,
            model_id: &str,
            _messages: &[Message],
            _timeout: Duration,
            _options: CallOptions,
        ) -> Result<CallOutcome, RemoteError> {
            match self.answers.get(model_id) {
                Some(answer) if !answer.is_empty() => Ok(CallOutcome { answer: answer.clone(), latency_ms: 5 }),
                Some(_) => Ok(CallOutcome { answer: String::new(), latency_ms: 5 }),
                None => Err(RemoteError::Timeout),
            }
        }

        async fn generate_image(&self, _model_id: &str, _prompt: &str, _timeout: Duration) -> Result<ImageOutput, RemoteError> {
            unimplemented!()
        }
    }

    #[tokio::test]
    async fn all_models_empty_fails_with_no_successful_answers() {
        let mut answers = HashMap::new();
        answers.insert("m1".to_string(), String::new());
        let gateway = Arc::new(ScriptedGateway { answers });
        let mut config = ResearchConfig::default();
        config.debate.max_rounds = 0;
        let pipeline = ResearchPipeline::new(gateway, config);

        let result = pipeline.run(None, "question", &["m1".to_string()], "judge-model").await;
        assert!(matches!(result, Err(PipelineError::NoSuccessfulAnswers)));
    }

    #[tokio::test]
    async fn judge_failure_falls_back_to_first_final_answer() {
        let mut answers = HashMap::new();
        answers.insert("m1".to_string(), "the answer".to_string());
        // "judge-model" is absent, so the gateway returns a timeout for it.
        let gateway = Arc::new(ScriptedGateway { answers });
        let mut config = ResearchConfig::default();
        config.debate.max_rounds = 0;
        let pipeline = ResearchPipeline::new(gateway, config);

        let output = pipeline.run(None, "question", &["m1".to_string()], "judge-model").await.unwrap();
        assert_eq!(output.final_answer, "the answer");
    }

    #[tokio::test]
    async fn successful_run_produces_final_answer_and_no_sources_citations() {
        let mut answers = HashMap::new();
        answers.insert("m1".to_string(), "the answer".to_string());
        answers.insert("judge-model".to_string(), "merged answer".to_string());
        let gateway = Arc::new(ScriptedGateway { answers });
        let mut config = ResearchConfig::default();
        config.debate.max_rounds = 0;
        let pipeline = ResearchPipeline::new(gateway, config);

        let output = pipeline.run(None, "question", &["m1".to_string()], "judge-model").await.unwrap();
        assert_eq!(output.final_answer, "merged answer");
        assert!(output.citations.is_empty());
        assert!(!output.research_context.has_sources());
        assert_eq!(output.debate_round_count, 0);
    }
}

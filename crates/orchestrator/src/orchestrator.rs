//! The Merge Orchestrator — the central algorithm: concurrent fan-out
//! with early-commit to the judge, an optional debate phase that
//! supersedes any judge call launched before it, and a
//! fallback-on-judge-failure result assembly.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use aggregator_contracts::error::{InputError, PipelineError};
use aggregator_contracts::model::{Message, ModelCallResult, QueryMode};
use aggregator_debate::{DebateConfig, DebateEngine};
use aggregator_judge::{JudgeConfig, JudgeRequest, JudgeSynthesizer};
use aggregator_model_client::{call_model_with_retry, CallOptions, ModelGateway};

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub per_model_timeout: Duration,
    pub max_retries: u32,
    pub max_prompt_length: usize,
    pub min_models_for_judge: usize,
    pub enable_early_judge: bool,
    pub enable_debate: bool,
    pub debate: DebateConfig,
    pub judge: JudgeConfig,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            per_model_timeout: Duration::from_millis(30_000),
            max_retries: 2,
            max_prompt_length: 8_000,
            min_models_for_judge: 2,
            enable_early_judge: true,
            enable_debate: false,
            debate: DebateConfig::default(),
            judge: JudgeConfig::default(),
        }
    }
}

pub struct OrchestrateRequest {
    pub prompt: String,
    pub mode: QueryMode,
    pub model_ids: Vec<String>,
    pub judge_model_override: Option<String>,
}

#[derive(Debug, Clone)]
pub struct OrchestrateOutput {
    pub merged_answer: String,
    pub per_model_results: Vec<ModelCallResult>,
    pub total_latency_ms: u64,
    pub request_id: String,
}

pub struct MergeOrchestrator {
    gateway: Arc<dyn ModelGateway>,
    judge: Arc<JudgeSynthesizer>,
    debate: Arc<DebateEngine>,
    config: OrchestratorConfig,
}

impl MergeOrchestrator {
    pub fn new(gateway: Arc<dyn ModelGateway>, config: OrchestratorConfig) -> Self {
        let judge = Arc::new(JudgeSynthesizer::new(gateway.clone(), config.judge.clone()));
        let debate = Arc::new(DebateEngine::new(gateway.clone(), config.debate.clone()));
        Self { gateway, judge, debate, config }
    }

    fn validate(&self, request: &OrchestrateRequest) -> Result<(), InputError> {
        if request.prompt.trim().is_empty() {
            return Err(InputError::EmptyPrompt);
        }
        if request.prompt.chars().count() > self.config.max_prompt_length {
            return Err(InputError::PromptTooLong { max: self.config.max_prompt_length });
        }
        if request.model_ids.is_empty() {
            return Err(InputError::EmptyModelList);
        }
        Ok(())
    }

    pub async fn orchestrate(&self, request: OrchestrateRequest) -> Result<OrchestrateOutput, PipelineError> {
        self.validate(&request)?;

        let request_id = uuid::Uuid::new_v4().to_string();
        let started = Instant::now();
        let mode = request.mode.normalize();

        tracing::info!(request_id = %request_id, num_models = request.model_ids.len(), ?mode, "orchestration started");

        // --- Phase 1: parallel fan-out with early commit ---------------
        let (tx, mut rx) = mpsc::channel::<ModelCallResult>(request.model_ids.len().max(1));
        for model_id in &request.model_ids {
            let gateway = self.gateway.clone();
            let model_id = model_id.clone();
            let prompt = request.prompt.clone();
            let tx = tx.clone();
            let timeout = self.config.per_model_timeout;
            let max_retries = self.config.max_retries;
            let messages = vec![Message::system(mode.system_prompt_hint()), Message::user(prompt)];

            tokio::spawn(async move {
                let start = Instant::now();
                let result = call_model_with_retry(
                    gateway.as_ref(),
                    &model_id,
                    &messages,
                    timeout,
                    CallOptions::default(),
                    max_retries,
                )
                .await;
                let latency_ms = start.elapsed().as_millis() as u64;
                let call_result = match result {
                    Ok(outcome) => ModelCallResult::success(model_id, outcome.answer, outcome.latency_ms),
                    Err(err) => ModelCallResult::failure(model_id, err.to_string(), latency_ms),
                };
                let _ = tx.send(call_result).await;
            });
        }
        drop(tx);

        let mut results: Vec<ModelCallResult> = Vec::with_capacity(request.model_ids.len());
        let mut successes: Vec<(String, String)> = Vec::new();
        let mut pending_judge: Option<JoinHandle<Result<String, aggregator_contracts::error::RemoteError>>> = None;

        while let Some(result) = rx.recv().await {
            let is_success = result.success;
            let model_id = result.model_id.clone();
            let answer = result.answer.clone();
            results.push(result);

            if is_success {
                if let Some(answer) = answer {
                    successes.push((model_id, answer));
                }

                let should_launch_early_judge = self.config.enable_early_judge
                    && pending_judge.is_none()
                    && successes.len() == self.config.min_models_for_judge;

                if should_launch_early_judge {
                    tracing::debug!(request_id = %request_id, "early judge threshold reached, launching early judge");
                    pending_judge = Some(self.spawn_judge(
                        request.prompt.clone(),
                        successes.clone(),
                        Vec::new(),
                        request.judge_model_override.clone(),
                        false,
                    ));
                }
            }
        }

        // --- Phase 2: late-judge branch ---------------------------------
        if pending_judge.is_none() && !successes.is_empty() {
            tracing::debug!(request_id = %request_id, "early judge never triggered, launching late judge");
            pending_judge = Some(self.spawn_judge(
                request.prompt.clone(),
                successes.clone(),
                Vec::new(),
                request.judge_model_override.clone(),
                false,
            ));
        }

        // --- Phase 3: optional debate ------------------------------------
        let mut final_answers_for_judge = successes.clone();
        let mut active_judge: Option<JoinHandle<Result<String, aggregator_contracts::error::RemoteError>>> = pending_judge;

        if self.config.enable_debate && successes.len() >= 2 {
            tracing::debug!(request_id = %request_id, "running debate engine");
            let judge_model = request
                .judge_model_override
                .clone()
                .unwrap_or_else(|| self.config.judge.default_judge_model.clone());
            let debate_output = self.debate.run(&request.prompt, &judge_model, successes.clone()).await;

            // Supersede any judge call launched before debate ran: await it
            // to avoid orphaning the in-flight request, but never use its
            // result.
            if let Some(handle) = active_judge.take() {
                let _ = handle.await;
            }

            final_answers_for_judge = debate_output.final_answers.clone();
            active_judge = Some(self.spawn_judge(
                request.prompt.clone(),
                debate_output.final_answers,
                debate_output.debate_rounds,
                request.judge_model_override.clone(),
                false,
            ));
        }

        // --- Phase 4: result assembly -------------------------------------
        if final_answers_for_judge.is_empty() {
            tracing::warn!(request_id = %request_id, "all models failed");
            return Err(PipelineError::all_models_failed(results));
        }

        let merged_answer = match active_judge {
            Some(handle) => match handle.await {
                Ok(Ok(answer)) => answer,
                Ok(Err(err)) => {
                    tracing::warn!(request_id = %request_id, error = %err, "judge call failed, falling back to first answer");
                    final_answers_for_judge[0].1.clone()
                }
                Err(join_err) => {
                    tracing::warn!(request_id = %request_id, error = %join_err, "judge task panicked, falling back to first answer");
                    final_answers_for_judge[0].1.clone()
                }
            },
            None => final_answers_for_judge[0].1.clone(),
        };

        Ok(OrchestrateOutput {
            merged_answer,
            per_model_results: results,
            total_latency_ms: started.elapsed().as_millis() as u64,
            request_id,
        })
    }

    fn spawn_judge(
        &self,
        prompt: String,
        answers: Vec<(String, String)>,
        debate_rounds: Vec<aggregator_contracts::model::DebateRound>,
        judge_model_override: Option<String>,
        research_mode: bool,
    ) -> JoinHandle<Result<String, aggregator_contracts::error::RemoteError>> {
        let judge = self.judge.clone();
        tokio::spawn(async move {
            judge
                .judge_and_merge(JudgeRequest {
                    user_prompt: &prompt,
                    successful_answers: &answers,
                    debate_rounds: &debate_rounds,
                    judge_model_override: judge_model_override.as_deref(),
                    research_mode,
                })
                .await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use aggregator_contracts::error::RemoteError;
    use aggregator_model_client::{CallOutcome, ImageOutput};
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct ScriptedGateway {
        behaviors: HashMap<String, ModelBehavior>,
        calls: Mutex<Vec<String>>,
    }

    enum ModelBehavior {
        Succeed { answer: String, delay_ms: u64 },
        Fail,
        Timeout,
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
            self.calls.lock().unwrap().push(model_id.to_string());
            match self.behaviors.get(model_id) {
                Some(ModelBehavior::Succeed { answer, delay_ms }) => {
                    if *delay_ms > 0 {
                        tokio::time::sleep(Duration::from_millis(*delay_ms)).await;
                    }
                    Ok(CallOutcome { answer: answer.clone(), latency_ms: *delay_ms })
                }
                Some(ModelBehavior::Fail) => Err(RemoteError::NetworkError("down".into())),
                Some(ModelBehavior::Timeout) | None => Err(RemoteError::Timeout),
            }
        }

        async fn generate_image(&self, _model_id: &str, _prompt: &str, _timeout: Duration) -> Result<ImageOutput, RemoteError> {
            unimplemented!()
        }
    }

    fn config() -> OrchestratorConfig {
        OrchestratorConfig { max_retries: 0, ..OrchestratorConfig::default() }
    }

    #[tokio::test]
    async fn rejects_empty_prompt() {
        let gateway = Arc::new(ScriptedGateway { behaviors: HashMap::new(), calls: Mutex::new(Vec::new()) });
        let orchestrator = MergeOrchestrator::new(gateway, config());
        let result = orchestrator
            .orchestrate(OrchestrateRequest {
                prompt: "   ".to_string(),
                mode: QueryMode::General,
                model_ids: vec!["m1".to_string()],
                judge_model_override: None,
            })
            .await;
        assert!(matches!(result, Err(PipelineError::BadInput(InputError::EmptyPrompt))));
    }

    #[tokio::test]
    async fn rejects_empty_model_list() {
        let gateway = Arc::new(ScriptedGateway { behaviors: HashMap::new(), calls: Mutex::new(Vec::new()) });
        let orchestrator = MergeOrchestrator::new(gateway, config());
        let result = orchestrator
            .orchestrate(OrchestrateRequest {
                prompt: "hello".to_string(),
                mode: QueryMode::General,
                model_ids: vec![],
                judge_model_override: None,
            })
            .await;
        assert!(matches!(result, Err(PipelineError::BadInput(InputError::EmptyModelList))));
    }

    #[tokio::test]
    async fn all_models_failing_returns_all_models_failed() {
        let mut behaviors = HashMap::new();
        behaviors.insert("m1".to_string(), ModelBehavior::Timeout);
        behaviors.insert("m2".to_string(), ModelBehavior::Timeout);
        behaviors.insert("m3".to_string(), ModelBehavior::Timeout);
        let gateway = Arc::new(ScriptedGateway { behaviors, calls: Mutex::new(Vec::new()) });
        let orchestrator = MergeOrchestrator::new(gateway, config());

        let result = orchestrator
            .orchestrate(OrchestrateRequest {
                prompt: "hello".to_string(),
                mode: QueryMode::General,
                model_ids: vec!["m1".to_string(), "m2".to_string(), "m3".to_string()],
                judge_model_override: None,
            })
            .await;

        match result {
            Err(PipelineError::AllModelsFailed { count, results }) => {
                assert_eq!(count, 3);
                assert_eq!(results.len(), 3);
                assert!(results.iter().all(|r| !r.success));
            }
            other => panic!("expected AllModelsFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn one_failure_two_successes_merges_via_judge() {
        let mut behaviors = HashMap::new();
        behaviors.insert("m1".to_string(), ModelBehavior::Succeed { answer: "answer one".into(), delay_ms: 0 });
        behaviors.insert("m2".to_string(), ModelBehavior::Succeed { answer: "answer two".into(), delay_ms: 0 });
        behaviors.insert("m3".to_string(), ModelBehavior::Fail);
        behaviors.insert("judge-model".to_string(), ModelBehavior::Succeed { answer: "merged".into(), delay_ms: 0 });
        let gateway = Arc::new(ScriptedGateway { behaviors, calls: Mutex::new(Vec::new()) });
        let mut cfg = config();
        cfg.judge.default_judge_model = "judge-model".to_string();

        let orchestrator = MergeOrchestrator::new(gateway, cfg);
        let result = orchestrator
            .orchestrate(OrchestrateRequest {
                prompt: "hello".to_string(),
                mode: QueryMode::General,
                model_ids: vec!["m1".to_string(), "m2".to_string(), "m3".to_string()],
                judge_model_override: None,
            })
            .await
            .unwrap();

        assert_eq!(result.merged_answer, "merged");
        assert_eq!(result.per_model_results.len(), 3);
        let failure_count = result.per_model_results.iter().filter(|r| !r.success).count();
        assert_eq!(failure_count, 1);
    }

    #[tokio::test]
    async fn single_success_below_threshold_still_gets_a_late_judge() {
        let mut behaviors = HashMap::new();
        behaviors.insert("m1".to_string(), ModelBehavior::Succeed { answer: "only answer".into(), delay_ms: 0 });
        behaviors.insert("judge-model".to_string(), ModelBehavior::Succeed { answer: "merged-single".into(), delay_ms: 0 });
        let gateway = Arc::new(ScriptedGateway { behaviors, calls: Mutex::new(Vec::new()) });
        let mut cfg = config();
        cfg.judge.default_judge_model = "judge-model".to_string();

        let orchestrator = MergeOrchestrator::new(gateway, cfg);
        let result = orchestrator
            .orchestrate(OrchestrateRequest {
                prompt: "hello".to_string(),
                mode: QueryMode::General,
                model_ids: vec!["m1".to_string()],
                judge_model_override: None,
            })
            .await
            .unwrap();

        assert_eq!(result.merged_answer, "merged-single");
    }

    #[tokio::test]
    async fn judge_failure_falls_back_to_first_success() {
        let mut behaviors = HashMap::new();
        behaviors.insert("m1".to_string(), ModelBehavior::Succeed { answer: "first".into(), delay_ms: 0 });
        behaviors.insert("m2".to_string(), ModelBehavior::Succeed { answer: "second".into(), delay_ms: 0 });
        behaviors.insert("judge-model".to_string(), ModelBehavior::Timeout);
        let gateway = Arc::new(ScriptedGateway { behaviors, calls: Mutex::new(Vec::new()) });
        let mut cfg = config();
        cfg.judge.default_judge_model = "judge-model".to_string();

        let orchestrator = MergeOrchestrator::new(gateway, cfg);
        let result = orchestrator
            .orchestrate(OrchestrateRequest {
                prompt: "hello".to_string(),
                mode: QueryMode::General,
                model_ids: vec!["m1".to_string(), "m2".to_string()],
                judge_model_override: None,
            })
            .await
            .unwrap();

        assert!(result.merged_answer == "first" || result.merged_answer == "second");
    }
}

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use aggregator_contracts::config::Config;
use aggregator_jobs::{AsyncWorker, JobStore};
use aggregator_model_client::ModelGateway;
use aggregator_orchestrator::{MergeOrchestrator, OrchestratorConfig};
use aggregator_research::{ResearchConfig, SearchProvider};

/// Everything a request handler needs, shared across the process.
///
/// `worker` is a single shared instance: the HTTP handler's
/// immediate-trigger-on-create and the background polling loop must
/// share one `AsyncWorker` so its idempotency guard actually prevents
/// two jobs from running at once.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub gateway: Arc<dyn ModelGateway>,
    pub search_provider: Option<Arc<dyn SearchProvider>>,
    pub orchestrator: Arc<MergeOrchestrator>,
    pub jobs: Arc<JobStore>,
    pub worker: Arc<AsyncWorker>,
    pub shutdown_tx: Arc<watch::Sender<bool>>,
}

impl AppState {
    pub fn new(
        config: Config,
        gateway: Arc<dyn ModelGateway>,
        search_provider: Option<Arc<dyn SearchProvider>>,
    ) -> Self {
        let config = Arc::new(config);
        let orchestrator_config = OrchestratorConfig {
            per_model_timeout: Duration::from_millis(config.per_model_timeout_ms),
            max_retries: config.max_retries,
            max_prompt_length: config.max_prompt_length,
            min_models_for_judge: config.min_models_for_judge,
            enable_early_judge: config.enable_early_judge,
            enable_debate: config.enable_debate,
            debate: aggregator_debate::DebateConfig {
                max_rounds: config.max_debate_rounds,
                judge_feedback_timeout: Duration::from_millis(config.judge_feedback_timeout_ms),
                debate_timeout: Duration::from_millis(config.debate_timeout_ms),
                ..aggregator_debate::DebateConfig::default()
            },
            judge: aggregator_judge::JudgeConfig {
                default_judge_model: config.judge_model.clone(),
                timeout: Duration::from_millis(config.judge_timeout_ms),
                max_answer_length_for_judge: config.max_answer_length_for_judge,
                ..aggregator_judge::JudgeConfig::default()
            },
        };
        let orchestrator = Arc::new(MergeOrchestrator::new(gateway.clone(), orchestrator_config));
        let jobs = Arc::new(JobStore::new());
        let (shutdown_tx, _) = watch::channel(false);

        let research_config = research_config_for(&config);
        let worker = Arc::new(AsyncWorker::new(
            jobs.clone(),
            gateway.clone(),
            search_provider.clone(),
            config.judge_model.clone(),
            research_config,
        ));

        Self { config, gateway, search_provider, orchestrator, jobs, worker, shutdown_tx: Arc::new(shutdown_tx) }
    }

    pub fn research_config(&self) -> ResearchConfig {
        research_config_for(&self.config)
    }
}

fn research_config_for(config: &Config) -> ResearchConfig {
    ResearchConfig {
        max_search_results: 8,
        per_model_timeout: Duration::from_millis(config.per_model_timeout_ms),
        debate: aggregator_debate::DebateConfig {
            max_rounds: config.max_debate_rounds,
            judge_feedback_timeout: Duration::from_millis(config.judge_feedback_timeout_ms),
            debate_timeout: Duration::from_millis(config.debate_timeout_ms),
            ..aggregator_debate::DebateConfig::default()
        },
        judge: aggregator_judge::JudgeConfig {
            default_judge_model: config.judge_model.clone(),
            timeout: Duration::from_millis(config.judge_timeout_ms),
            max_answer_length_for_judge: config.max_answer_length_for_judge,
            ..aggregator_judge::JudgeConfig::default()
        },
    }
}

//! The Async Worker: polls the job store every 2 seconds, runs at most
//! one job at a time, and emits progress milestones at scheduled
//! wall-clock offsets while the research pipeline runs.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use uuid::Uuid;

use aggregator_contracts::error::{PipelineError, RemoteError};
use aggregator_contracts::job::{FallbackReason, Job, JobError, JobOptions, JobResult, JobResultMetadata, JobStatus, ResultSection, SectionKind};
use aggregator_contracts::model::DebateRound;
use aggregator_model_client::ModelGateway;
use aggregator_research::{ResearchConfig, ResearchOutput, ResearchPipeline, SearchProvider};

use crate::store::JobStore;

const POLL_INTERVAL: Duration = Duration::from_secs(2);
const TOTAL_ITERATIONS: u32 = 5;
/// Progress value set at the start of each iteration, 1-indexed.
const MILESTONES: [u8; 5] = [10, 30, 50, 70, 100];
/// Wall-clock offset from job start at which iterations 1-4 fire;
/// iteration 5 (100%) fires on pipeline completion, not on a timer.
const SCHEDULED_OFFSETS: [Duration; 4] =
    [Duration::from_millis(0), Duration::from_secs(2), Duration::from_secs(4), Duration::from_secs(6)];

pub struct AsyncWorker {
    store: Arc<JobStore>,
    gateway: Arc<dyn ModelGateway>,
    search_provider: Option<Arc<dyn SearchProvider>>,
    default_judge_model: String,
    research_config: ResearchConfig,
    processing: AtomicBool,
}

impl AsyncWorker {
    pub fn new(
        store: Arc<JobStore>,
        gateway: Arc<dyn ModelGateway>,
        search_provider: Option<Arc<dyn SearchProvider>>,
        default_judge_model: String,
        research_config: ResearchConfig,
    ) -> Self {
        Self { store, gateway, search_provider, default_judge_model, research_config, processing: AtomicBool::new(false) }
    }

    /// Runs the polling loop until `shutdown` reports `true`. Drains
    /// the in-flight job (if any) before returning.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(POLL_INTERVAL);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.clone().try_process_next().await;
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        tracing::info!("worker shutting down, draining current job");
                        return;
                    }
                }
            }
        }
    }

    /// Attempts to dequeue and run the oldest queued job. Idempotent
    /// against a concurrent trigger: if a job is already running, this
    /// call is a no-op.
    pub async fn try_process_next(self: Arc<Self>) {
        if self.processing.swap(true, Ordering::SeqCst) {
            return;
        }

        let next = self.store.list_queued().into_iter().next();
        match next {
            Some(job) => self.run_job(job).await,
            None => {}
        }

        self.processing.store(false, Ordering::SeqCst);
    }

    async fn run_job(&self, job: Job) {
        self.store.update_status(&job.id, JobStatus::Running);
        self.store.update_progress(&job.id, MILESTONES[0] as i64, None, Some(1), Some(TOTAL_ITERATIONS));

        let progress_ticker = {
            let store = self.store.clone();
            let job_id = job.id.clone();
            tokio::spawn(async move {
                for (i, offset) in SCHEDULED_OFFSETS.iter().enumerate().skip(1) {
                    tokio::time::sleep(*offset - SCHEDULED_OFFSETS[i - 1]).await;
                    store.update_progress(&job_id, MILESTONES[i] as i64, None, Some((i + 1) as u32), Some(TOTAL_ITERATIONS));
                }
            })
        };

        let judge_model = job.options.judge_model.clone().unwrap_or_else(|| self.default_judge_model.clone());
        let mut config = self.research_config.clone();
        config.debate.max_rounds = job.options.max_debate_rounds;
        if !job.options.enable_debate {
            config.debate.max_rounds = 0;
        }
        let pipeline = ResearchPipeline::new(self.gateway.clone(), config);

        let result = pipeline
            .run(self.search_provider.as_deref(), &job.query, &job.options.models, &judge_model)
            .await;

        progress_ticker.abort();

        match result {
            Ok(output) => self.store.set_result(&job.id, build_job_result(output)),
            Err(err) => self.store.set_error(&job.id, classify_pipeline_error(&err)),
        }
    }
}

fn build_job_result(output: ResearchOutput) -> JobResult {
    let metadata = JobResultMetadata::from_research_context(&output.research_context, &output.citations);

    let mut sections = vec![ResultSection {
        title: "Summary".to_string(),
        content: output.final_answer.clone(),
        kind: SectionKind::Summary,
    }];
    if !output.citations.is_empty() {
        sections.push(ResultSection {
            title: "Citations".to_string(),
            content: output.citations.join("\n"),
            kind: SectionKind::Citations,
        });
    }
    if output.research_context.has_sources() {
        let sources = output.research_context.results.iter().map(|r| r.url.clone()).collect::<Vec<_>>().join("\n");
        sections.push(ResultSection { title: "Sources".to_string(), content: sources, kind: SectionKind::Sources });
    }

    let research_sources = output.research_context.results.iter().map(|r| r.url.clone()).collect();
    let model_answers = output
        .per_model_answers
        .iter()
        .filter_map(|r| r.answer.clone())
        .collect::<Vec<_>>();
    let debate_rounds: Vec<DebateRound> = output.debate_rounds;

    JobResult {
        summary: output.final_answer,
        sections,
        citations: output.citations,
        research_sources,
        debate_rounds,
        model_answers,
        metadata,
    }
}

fn classify_pipeline_error(err: &PipelineError) -> JobError {
    let message = err.to_string();
    let code = aggregator_contracts::error::JobErrorCode::classify(&message);
    JobError { code: code.as_str().to_string(), message }
}

/// Generates a fresh job id. Kept as a free function so callers (the
/// HTTP handler) don't reach into `uuid` directly.
pub fn new_job_id() -> String {
    Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use aggregator_contracts::error::RemoteError;
    use aggregator_contracts::job::JobOptions;
    use aggregator_model_client::{CallOptions, CallOutcome, ImageOutput};
    use aggregator_contracts::model::Message;
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
                Some(answer) => Ok(CallOutcome { answer: answer.clone(), latency_ms: 1 }),
                None => Err(RemoteError::Timeout),
            }
        }

        async fn generate_image(&self, _model_id: &str, _prompt: &str, _timeout: Duration) -> Result<ImageOutput, RemoteError> {
            unimplemented!()
        }
    }

    fn options() -> JobOptions {
        JobOptions { models: vec!["m1".to_string()], judge_model: Some("judge-model".to_string()), enable_debate: false, max_debate_rounds: 0 }
    }

    #[tokio::test(start_paused = true)]
    async fn successful_job_completes_with_result() {
        let mut answers = HashMap::new();
        answers.insert("m1".to_string(), "the answer".to_string());
        answers.insert("judge-model".to_string(), "merged".to_string());
        let gateway = Arc::new(ScriptedGateway { answers });
        let store = Arc::new(JobStore::new());
        let worker = Arc::new(AsyncWorker::new(store.clone(), gateway, None, "judge-model".to_string(), ResearchConfig::default()));

        let job = store.create(new_job_id(), "question".to_string(), options(), None);
        worker.try_process_next().await;

        let finished = store.get(&job.id, None).unwrap();
        assert_eq!(finished.status, JobStatus::Completed);
        assert_eq!(finished.progress, 100);
        assert_eq!(finished.result.unwrap().summary, "merged");
    }

    #[tokio::test(start_paused = true)]
    async fn failing_job_sets_error() {
        let gateway = Arc::new(ScriptedGateway { answers: HashMap::new() });
        let store = Arc::new(JobStore::new());
        let worker = Arc::new(AsyncWorker::new(store.clone(), gateway, None, "judge-model".to_string(), ResearchConfig::default()));

        let job = store.create(new_job_id(), "question".to_string(), options(), None);
        worker.try_process_next().await;

        let finished = store.get(&job.id, None).unwrap();
        assert_eq!(finished.status, JobStatus::Failed);
        assert_eq!(finished.progress, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn double_trigger_is_idempotent() {
        let gateway = Arc::new(ScriptedGateway { answers: HashMap::new() });
        let store = Arc::new(JobStore::new());
        let worker = Arc::new(AsyncWorker::new(store.clone(), gateway, None, "judge-model".to_string(), ResearchConfig::default()));
        store.create(new_job_id(), "q1".to_string(), options(), None);
        store.create(new_job_id(), "q2".to_string(), options(), None);

        let first = worker.clone().try_process_next();
        let second = worker.clone().try_process_next();
        tokio::join!(first, second);

        // One of the two calls must have been a no-op: at most one job
        // transitions away from `queued` synchronously with the other
        // still sitting untouched, since `processing` serializes them.
        let remaining_queued = store.list_queued().len();
        assert!(remaining_queued <= 1);
    }
}

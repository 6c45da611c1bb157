use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use aggregator_contracts::error::{InputError, PipelineError};
use aggregator_contracts::job::JobOptions;
use aggregator_contracts::model::QueryMode;
use aggregator_jobs::new_job_id;
use aggregator_orchestrator::OrchestrateRequest;

use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub prompt: String,
    #[serde(default)]
    pub mode: Option<QueryMode>,
    #[serde(default)]
    pub models: Option<Vec<String>>,
    #[serde(default)]
    pub judge_model: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct QueryResponse {
    pub merged_answer: String,
    pub request_id: String,
    pub total_latency_ms: u64,
    pub model_count: usize,
}

pub async fn query(State(state): State<AppState>, Json(request): Json<QueryRequest>) -> Response {
    let model_ids = request.models.unwrap_or_else(|| state.config.models.clone());
    let mode = request.mode.unwrap_or(QueryMode::General);

    let outcome = state
        .orchestrator
        .orchestrate(OrchestrateRequest {
            prompt: request.prompt,
            mode,
            model_ids,
            judge_model_override: request.judge_model,
        })
        .await;

    match outcome {
        Ok(output) => Json(QueryResponse {
            merged_answer: output.merged_answer,
            request_id: output.request_id,
            total_latency_ms: output.total_latency_ms,
            model_count: output.per_model_results.len(),
        })
        .into_response(),
        Err(err) => pipeline_error_response(err),
    }
}

#[derive(Debug, Deserialize)]
pub struct GenerateImageRequest {
    pub prompt: String,
    #[serde(default)]
    pub models: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
pub struct ImageResult {
    pub model_id: String,
    pub success: bool,
    pub url: Option<String>,
    pub inline_data_uri: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct GenerateImageResponse {
    pub results: Vec<ImageResult>,
}

pub async fn generate_image(State(state): State<AppState>, Json(request): Json<GenerateImageRequest>) -> Response {
    if request.prompt.trim().is_empty() {
        return input_error_response(InputError::EmptyPrompt);
    }
    let model_ids = request.models.unwrap_or_else(|| state.config.models.clone());
    if model_ids.is_empty() {
        return input_error_response(InputError::EmptyModelList);
    }

    let timeout = Duration::from_millis(state.config.per_model_timeout_ms);
    let futures = model_ids.into_iter().map(|model_id| {
        let gateway = state.gateway.clone();
        let prompt = request.prompt.clone();
        async move {
            match gateway.generate_image(&model_id, &prompt, timeout).await {
                Ok(aggregator_model_client::ImageOutput::Url(url)) => {
                    ImageResult { model_id, success: true, url: Some(url), inline_data_uri: None, error: None }
                }
                Ok(aggregator_model_client::ImageOutput::InlineDataUri(uri)) => {
                    ImageResult { model_id, success: true, url: None, inline_data_uri: Some(uri), error: None }
                }
                Err(err) => ImageResult { model_id, success: false, url: None, inline_data_uri: None, error: Some(err.to_string()) },
            }
        }
    });

    let results = futures::future::join_all(futures).await;
    Json(GenerateImageResponse { results }).into_response()
}

#[derive(Debug, Deserialize)]
pub struct DeepResearchRequest {
    pub query: String,
    #[serde(default)]
    pub models: Option<Vec<String>>,
    #[serde(default)]
    pub judge_model: Option<String>,
    #[serde(default)]
    pub enable_debate: Option<bool>,
    #[serde(default)]
    pub max_debate_rounds: Option<u32>,
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DeepResearchAcceptedResponse {
    pub job_id: String,
    pub status: &'static str,
}

pub async fn deep_research(State(state): State<AppState>, Json(request): Json<DeepResearchRequest>) -> Response {
    if request.query.trim().is_empty() {
        return input_error_response(InputError::EmptyPrompt);
    }

    let options = JobOptions {
        models: request.models.unwrap_or_else(|| state.config.models.clone()),
        judge_model: request.judge_model.or_else(|| Some(state.config.judge_model.clone())),
        enable_debate: request.enable_debate.unwrap_or(state.config.enable_debate),
        max_debate_rounds: request.max_debate_rounds.unwrap_or(state.config.max_debate_rounds),
    };

    let job = state.jobs.create(new_job_id(), request.query, options, request.user_id);

    // Immediate trigger in addition to the worker's polling loop:
    // triggering the shared worker instance means its idempotency
    // guard covers this path too, so a poll tick landing at the same
    // moment can't double-process a job.
    let worker = state.worker.clone();
    tokio::spawn(async move { worker.try_process_next().await });

    (StatusCode::ACCEPTED, Json(DeepResearchAcceptedResponse { job_id: job.id, status: "queued" })).into_response()
}

#[derive(Debug, Deserialize)]
pub struct JobQuery {
    #[serde(default)]
    pub user_id: Option<String>,
}

pub async fn get_deep_research_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
    Query(params): Query<JobQuery>,
) -> Response {
    match state.jobs.get(&job_id, params.user_id.as_deref()) {
        Some(job) => Json(job).into_response(),
        None => (StatusCode::NOT_FOUND, Json(ErrorBody { error: "job not found".to_string() })).into_response(),
    }
}

pub async fn health() -> Response {
    Json(serde_json::json!({ "status": "ok" })).into_response()
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

fn input_error_response(err: InputError) -> Response {
    (StatusCode::BAD_REQUEST, Json(ErrorBody { error: err.to_string() })).into_response()
}

fn pipeline_error_response(err: PipelineError) -> Response {
    match err {
        PipelineError::BadInput(input_err) => input_error_response(input_err),
        other => (StatusCode::BAD_GATEWAY, Json(ErrorBody { error: other.to_string() })).into_response(),
    }
}

//! The deep-research job record. Owned exclusively by the job store in
//! `aggregator-jobs`; every other crate only ever sees an owned clone
//! returned from a store operation, never a live reference.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{DebateRound, ResearchContext};

/// `queued -> running -> {completed, failed}`. No other transition is
/// permitted; `JobStore::update_status` enforces this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// Caller-supplied parameters for a deep-research job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobOptions {
    pub models: Vec<String>,
    pub judge_model: Option<String>,
    pub enable_debate: bool,
    pub max_debate_rounds: u32,
}

/// One section of the worker's structured result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultSection {
    pub title: String,
    pub content: String,
    #[serde(rename = "type")]
    pub kind: SectionKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionKind {
    Summary,
    Citations,
    Sources,
}

/// Tag describing why a completed job has no citations, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FallbackReason {
    NoExternalSources,
    NoCitationsExtracted,
}

/// The structured payload attached to a completed job. Built by the
/// async worker from a `ResearchPipelineOutput`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobResult {
    pub summary: String,
    pub sections: Vec<ResultSection>,
    pub citations: Vec<String>,
    pub research_sources: Vec<String>,
    pub debate_rounds: Vec<DebateRound>,
    pub model_answers: Vec<String>,
    pub metadata: JobResultMetadata,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobResultMetadata {
    pub fallback_reason: Option<FallbackReason>,
}

impl JobResultMetadata {
    pub fn from_research_context(ctx: &ResearchContext, citations: &[String]) -> Self {
        let fallback_reason = if !ctx.has_sources() {
            Some(FallbackReason::NoExternalSources)
        } else if citations.is_empty() {
            Some(FallbackReason::NoCitationsExtracted)
        } else {
            None
        };
        Self { fallback_reason }
    }
}

/// The job record. All mutation flows through `JobStore` operations
/// that take `(job_id, ...)` and re-store the updated value — see
/// `aggregator-jobs::store`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub user_id: Option<String>,
    pub status: JobStatus,
    /// Always a multiple of 5 in `[0, 100]`.
    pub progress: u8,
    pub current_iteration: Option<u32>,
    pub total_iterations: Option<u32>,
    pub query: String,
    pub options: JobOptions,
    pub result: Option<JobResult>,
    pub error: Option<JobError>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub estimated_remaining_seconds: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobError {
    pub code: String,
    pub message: String,
}

/// Rounds `progress` to the nearest multiple of 5 and clamps to
/// `[0, 100]`. Shared by `JobStore::update_progress` and the result
/// constructors so every caller rounds identically.
pub fn round_progress(progress: i64) -> u8 {
    let clamped = progress.clamp(0, 100);
    let rounded = ((clamped as f64 / 5.0).round() as i64) * 5;
    rounded.clamp(0, 100) as u8
}

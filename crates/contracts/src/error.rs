//! Error taxonomy shared across the workspace.

use thiserror::Error;

use crate::model::ModelCallResult;

/// Input validation failures. Surface to HTTP callers as `400 BadInput`.
#[derive(Debug, Error)]
pub enum InputError {
    #[error("prompt must not be empty")]
    EmptyPrompt,
    #[error("prompt exceeds maximum length of {max} characters")]
    PromptTooLong { max: usize },
    #[error("at least one model id must be supplied")]
    EmptyModelList,
    #[error("unsupported mode: {0}")]
    UnsupportedMode(String),
}

/// Per-call remote failures. These are captured into `ModelCallResult`
/// by the caller, not propagated, except where a component's contract
/// says otherwise (the Judge Synthesizer and image generation surface
/// them directly since they are single-call operations with no
/// per-model fan-out to shield).
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("request timed out")]
    Timeout,
    #[error("remote error: status {status}, body: {body}")]
    RemoteError { status: u16, body: String },
    #[error("network error: {0}")]
    NetworkError(String),
    #[error("model returned an empty response")]
    EmptyResponse,
    #[error("no recognized image response format")]
    UnsupportedImageResponseFormat,
    #[error("circuit open for model {model_id}, retry after cooldown")]
    CircuitOpen { model_id: String },
}

impl aggregator_resilience::Retryable for RemoteError {
    /// Neither `Timeout` nor `CircuitOpen` is retried: a timeout means
    /// the upstream is slow, not transiently broken, and an open
    /// circuit means retrying immediately would just hit the same
    /// cooldown.
    fn is_timeout(&self) -> bool {
        matches!(self, RemoteError::Timeout | RemoteError::CircuitOpen { .. })
    }
}

/// Pipeline-level failures that are fatal to the enclosing request.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("all {count} models failed")]
    AllModelsFailed { count: usize, results: Vec<ModelCallResult> },
    #[error("no successful answers were produced")]
    NoSuccessfulAnswers,
    #[error(transparent)]
    BadInput(#[from] InputError),
}

impl PipelineError {
    pub fn all_models_failed(results: Vec<ModelCallResult>) -> Self {
        PipelineError::AllModelsFailed { count: results.len(), results }
    }
}

/// Error codes exposed on a failed job, classified by substring match
/// on the underlying pipeline error message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobErrorCode {
    ResearchTimeout,
    RateLimitExceeded,
    InvalidInput,
    ResearchFailed,
}

impl JobErrorCode {
    /// Classifies an error message by case-insensitive substring
    /// match, in a fixed priority order.
    pub fn classify(message: &str) -> Self {
        let lower = message.to_lowercase();
        if lower.contains("timeout") {
            JobErrorCode::ResearchTimeout
        } else if lower.contains("rate limit") {
            JobErrorCode::RateLimitExceeded
        } else if lower.contains("invalid") {
            JobErrorCode::InvalidInput
        } else {
            JobErrorCode::ResearchFailed
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobErrorCode::ResearchTimeout => "RESEARCH_TIMEOUT",
            JobErrorCode::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
            JobErrorCode::InvalidInput => "INVALID_INPUT",
            JobErrorCode::ResearchFailed => "RESEARCH_FAILED",
        }
    }
}

/// Top-level error returned by the HTTP boundary; every library error
/// converts into one of these variants.
#[derive(Debug, Error)]
pub enum AggregatorError {
    #[error(transparent)]
    Input(#[from] InputError),
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

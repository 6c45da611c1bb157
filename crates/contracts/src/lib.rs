//! Shared data model for the multi-model aggregation engine.
//!
//! Every other crate in the workspace depends on this one for the
//! types that cross component boundaries: model descriptors, chat
//! messages, per-model call results, the debate and research records,
//! the job lifecycle, the error taxonomy, and process configuration.
//! Nothing here makes a network call or owns a mutable registry —
//! those live in `aggregator-model-client`, `aggregator-research`, and
//! `aggregator-jobs` respectively.

pub mod config;
pub mod error;
pub mod job;
pub mod model;

pub use config::Config;
pub use error::{AggregatorError, InputError, JobErrorCode, PipelineError, RemoteError};
pub use job::{Job, JobOptions, JobResult, JobStatus};
pub use model::{
    AnonymizedAnswer, DebateRound, Message, ModelCallResult, ModelDescriptor, PerModelAnswer,
    QueryMode, ResearchContext, ResearchResult, Role,
};

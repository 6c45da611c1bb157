//! Job Store and Async Worker for deep-research jobs.

pub mod store;
pub mod worker;

pub use store::JobStore;
pub use worker::{new_job_id, AsyncWorker};

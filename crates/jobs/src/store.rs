//! The Job Store: an in-memory registry of deep-research jobs, safe
//! for concurrent access from the HTTP handler (create/get) and the
//! async worker (update*/set*).

use chrono::Utc;
use dashmap::DashMap;

use aggregator_contracts::job::{round_progress, Job, JobError, JobOptions, JobResult, JobStatus};

/// Keyed by job id. `DashMap` shards its locking per entry, so mutating
/// one job never blocks a reader of another — and every method here
/// that mutates a job does so via a single `get_mut` borrow, so no
/// caller can observe a job half-updated across two fields.
#[derive(Default)]
pub struct JobStore {
    jobs: DashMap<String, Job>,
}

impl JobStore {
    pub fn new() -> Self {
        Self { jobs: DashMap::new() }
    }

    pub fn create(&self, id: String, query: String, options: JobOptions, user_id: Option<String>) -> Job {
        let now = Utc::now();
        let job = Job {
            id: id.clone(),
            user_id,
            status: JobStatus::Queued,
            progress: 0,
            current_iteration: None,
            total_iterations: None,
            query,
            options,
            result: None,
            error: None,
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
            estimated_remaining_seconds: None,
        };
        self.jobs.insert(id, job.clone());
        job
    }

    /// Returns `None` if the job doesn't exist, or if `user_id` is
    /// supplied, non-empty, and doesn't match the job's owner (both
    /// sides non-empty and unequal hides the job).
    pub fn get(&self, job_id: &str, user_id: Option<&str>) -> Option<Job> {
        let job = self.jobs.get(job_id)?;
        if let (Some(requested), Some(owner)) = (user_id, job.user_id.as_deref()) {
            if !requested.is_empty() && !owner.is_empty() && requested != owner {
                return None;
            }
        }
        Some(job.clone())
    }

    pub fn update_status(&self, job_id: &str, status: JobStatus) {
        if let Some(mut job) = self.jobs.get_mut(job_id) {
            let now = Utc::now();
            if status == JobStatus::Running && job.started_at.is_none() {
                job.started_at = Some(now);
            }
            if status.is_terminal() {
                job.completed_at = Some(now);
            }
            job.status = status;
            job.updated_at = now;
        }
    }

    pub fn update_progress(
        &self,
        job_id: &str,
        progress: i64,
        remaining_seconds: Option<u32>,
        current_iteration: Option<u32>,
        total_iterations: Option<u32>,
    ) {
        if let Some(mut job) = self.jobs.get_mut(job_id) {
            job.progress = round_progress(progress);
            if remaining_seconds.is_some() {
                job.estimated_remaining_seconds = remaining_seconds;
            }
            if current_iteration.is_some() {
                job.current_iteration = current_iteration;
            }
            if total_iterations.is_some() {
                job.total_iterations = total_iterations;
            }
            job.updated_at = Utc::now();
        }
    }

    pub fn set_result(&self, job_id: &str, result: JobResult) {
        if let Some(mut job) = self.jobs.get_mut(job_id) {
            let now = Utc::now();
            job.result = Some(result);
            job.status = JobStatus::Completed;
            job.progress = 100;
            job.completed_at = Some(now);
            job.updated_at = now;
        }
    }

    pub fn set_error(&self, job_id: &str, error: JobError) {
        if let Some(mut job) = self.jobs.get_mut(job_id) {
            let now = Utc::now();
            job.error = Some(error);
            job.status = JobStatus::Failed;
            job.progress = 0;
            job.completed_at = Some(now);
            job.updated_at = now;
        }
    }

    /// Returns queued jobs ordered oldest-first so the worker dequeues
    /// in FIFO order.
    pub fn list_queued(&self) -> Vec<Job> {
        let mut queued: Vec<Job> =
            self.jobs.iter().filter(|entry| entry.status == JobStatus::Queued).map(|entry| entry.clone()).collect();
        queued.sort_by_key(|job| job.created_at);
        queued
    }

    pub fn cleanup(&self, max_age_hours: i64) {
        let cutoff = Utc::now() - chrono::Duration::hours(max_age_hours);
        self.jobs.retain(|_, job| !(job.status.is_terminal() && job.completed_at.map(|t| t < cutoff).unwrap_or(false)));
    }
}

//! JobStore trait definition.

use super::models::{JobRun, JobRunStatus};
use anyhow::Result;

/// Trait for job history storage backends.
pub trait JobStore: Send + Sync {
    /// Record a job start. Returns the run id.
    fn record_job_start(&self, job_name: &str, triggered_by: &str) -> Result<i64>;

    /// Record a job finishing with the given terminal status.
    fn record_job_finish(
        &self,
        run_id: i64,
        status: JobRunStatus,
        error_message: Option<&str>,
    ) -> Result<()>;

    /// The most recent run of a job, if any.
    fn get_last_run(&self, job_name: &str) -> Result<Option<JobRun>>;

    /// Recent run history for a job, newest first.
    fn get_job_history(&self, job_name: &str, limit: usize) -> Result<Vec<JobRun>>;

    /// Mark runs still `running` from a previous process as failed.
    /// Called once at startup. Returns the number of runs marked.
    fn mark_stale_jobs_failed(&self) -> Result<usize>;
}

use super::context::JobContext;
use super::orchestrator::JobHandle;

/// Errors that can occur during job execution.
#[derive(Debug)]
pub enum JobError {
    AlreadyRunning,
    ExecutionFailed(String),
    Cancelled,
    TimedOut,
}

impl std::fmt::Display for JobError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobError::AlreadyRunning => write!(f, "Job is already running"),
            JobError::ExecutionFailed(msg) => write!(f, "Execution failed: {}", msg),
            JobError::Cancelled => write!(f, "Job was cancelled"),
            JobError::TimedOut => write!(f, "Job timed out"),
        }
    }
}

impl std::error::Error for JobError {}

/// Trait for background jobs.
///
/// Jobs run synchronously in a blocking context (`spawn_blocking`).
/// Long-running bodies should check `ctx.is_cancelled()` periodically and
/// return `JobError::Cancelled` when set, and report progress through the
/// orchestrator via the handle they were given.
pub trait BackgroundJob: Send + Sync {
    /// Unique job name; also the at-most-one-running key.
    fn name(&self) -> String;

    /// Description of what this job does.
    fn description(&self) -> &'static str;

    /// Execute the job.
    fn execute(&self, ctx: &JobContext, handle: &JobHandle) -> Result<(), JobError>;
}

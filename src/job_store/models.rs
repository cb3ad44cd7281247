use serde::{Deserialize, Serialize};

/// Terminal and non-terminal states of a persisted job run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobRunStatus {
    Running,
    Completed,
    Failed,
    TimedOut,
}

impl JobRunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobRunStatus::Running => "running",
            JobRunStatus::Completed => "completed",
            JobRunStatus::Failed => "failed",
            JobRunStatus::TimedOut => "timed_out",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "running" => Some(JobRunStatus::Running),
            "completed" => Some(JobRunStatus::Completed),
            "failed" => Some(JobRunStatus::Failed),
            "timed_out" => Some(JobRunStatus::TimedOut),
            _ => None,
        }
    }
}

/// A single execution of a named job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRun {
    pub id: i64,
    pub job_name: String,
    /// Unix timestamp when the run started.
    pub started_at: i64,
    /// Unix timestamp when the run finished, None while running.
    pub finished_at: Option<i64>,
    pub status: JobRunStatus,
    pub error_message: Option<String>,
    /// What triggered this run (e.g. "startup", "api", "ingestion").
    pub triggered_by: String,
}

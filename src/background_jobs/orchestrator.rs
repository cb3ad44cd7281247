use super::context::JobContext;
use super::job::{BackgroundJob, JobError};
use crate::job_store::{JobRunStatus, JobStore};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Lifecycle state exposed by `status()`. `Idle` means the name has never
/// run in this process; terminal states stick around until the next start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Idle,
    Running,
    Completed,
    Failed,
    TimedOut,
}

impl From<JobRunStatus> for JobStatus {
    fn from(status: JobRunStatus) -> Self {
        match status {
            JobRunStatus::Running => JobStatus::Running,
            JobRunStatus::Completed => JobStatus::Completed,
            JobRunStatus::Failed => JobStatus::Failed,
            JobRunStatus::TimedOut => JobStatus::TimedOut,
        }
    }
}

/// Point-in-time view of a job, safe to take while the job runs.
#[derive(Debug, Clone, Serialize)]
pub struct JobSnapshot {
    pub name: String,
    pub status: JobStatus,
    /// Percent in [0, 100], non-decreasing within a run.
    pub progress: f64,
    pub message: Option<String>,
    pub error_message: Option<String>,
    pub started_at: Option<i64>,
    pub finished_at: Option<i64>,
    pub triggered_by: Option<String>,
}

impl JobSnapshot {
    fn idle(name: &str) -> Self {
        Self {
            name: name.to_string(),
            status: JobStatus::Idle,
            progress: 0.0,
            message: None,
            error_message: None,
            started_at: None,
            finished_at: None,
            triggered_by: None,
        }
    }
}

/// Proof of an acquired run. Progress reports and completion are only
/// honored from the handle of the current run; a handle kept across a
/// restart of the same name is superseded and its reports get dropped.
#[derive(Debug)]
pub struct JobHandle {
    name: String,
    seq: u64,
    run_id: i64,
}

impl JobHandle {
    pub fn name(&self) -> &str {
        &self.name
    }
}

struct JobSlot {
    seq: u64,
    run_id: i64,
    status: JobRunStatus,
    progress: f64,
    message: Option<String>,
    error_message: Option<String>,
    started: Instant,
    started_at: i64,
    finished_at: Option<i64>,
    triggered_by: String,
}

/// Supervises named jobs: at most one running per name, clamped monotonic
/// progress, persisted run history and a timeout watchdog.
pub struct JobOrchestrator {
    job_store: Arc<dyn JobStore>,
    max_run_duration: Duration,
    slots: Mutex<HashMap<String, JobSlot>>,
}

impl JobOrchestrator {
    pub fn new(job_store: Arc<dyn JobStore>, max_run_duration: Duration) -> Self {
        Self {
            job_store,
            max_run_duration,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Acquire the run slot for `name`. Fails with `AlreadyRunning` when a
    /// run holds it; a terminal previous run is replaced.
    pub fn start(&self, name: &str, triggered_by: &str) -> Result<JobHandle, JobError> {
        let mut slots = self.slots.lock().unwrap();
        let seq = match slots.get(name) {
            Some(slot) if slot.status == JobRunStatus::Running => {
                return Err(JobError::AlreadyRunning);
            }
            Some(slot) => slot.seq + 1,
            None => 1,
        };

        let run_id = self
            .job_store
            .record_job_start(name, triggered_by)
            .map_err(|e| JobError::ExecutionFailed(e.to_string()))?;

        info!("Job {} run {} started ({})", name, run_id, triggered_by);
        slots.insert(
            name.to_string(),
            JobSlot {
                seq,
                run_id,
                status: JobRunStatus::Running,
                progress: 0.0,
                message: None,
                error_message: None,
                started: Instant::now(),
                started_at: chrono::Utc::now().timestamp(),
                finished_at: None,
                triggered_by: triggered_by.to_string(),
            },
        );
        Ok(JobHandle {
            name: name.to_string(),
            seq,
            run_id,
        })
    }

    /// Report progress for a run. Percent is clamped into [0, 100] and never
    /// moves backwards; reports from a superseded or finished run are
    /// dropped with a warning.
    pub fn report_progress(&self, handle: &JobHandle, percent: f64, message: &str) {
        let mut slots = self.slots.lock().unwrap();
        let Some(slot) = slots.get_mut(&handle.name) else {
            warn!("Progress report for unknown job {} dropped", handle.name);
            return;
        };
        if slot.seq != handle.seq {
            warn!(
                "Progress report from superseded run of job {} dropped",
                handle.name
            );
            return;
        }
        if slot.status != JobRunStatus::Running {
            warn!(
                "Progress report for finished job {} dropped",
                handle.name
            );
            return;
        }
        let clamped = percent.clamp(0.0, 100.0);
        slot.progress = slot.progress.max(clamped);
        slot.message = Some(message.to_string());
    }

    /// Finish a run. A no-op (with a warning) when the run was superseded or
    /// the watchdog already timed it out.
    pub fn complete(&self, handle: JobHandle, result: Result<(), String>) {
        let mut slots = self.slots.lock().unwrap();
        let Some(slot) = slots.get_mut(&handle.name) else {
            warn!("Completion for unknown job {} dropped", handle.name);
            return;
        };
        if slot.seq != handle.seq || slot.status != JobRunStatus::Running {
            warn!(
                "Completion for superseded or finished run of job {} dropped",
                handle.name
            );
            return;
        }

        let (status, error_message) = match result {
            Ok(()) => (JobRunStatus::Completed, None),
            Err(msg) => (JobRunStatus::Failed, Some(msg)),
        };
        slot.status = status;
        slot.error_message = error_message.clone();
        slot.finished_at = Some(chrono::Utc::now().timestamp());
        if status == JobRunStatus::Completed {
            slot.progress = 100.0;
            info!("Job {} run {} completed", handle.name, handle.run_id);
        } else {
            warn!(
                "Job {} run {} failed: {}",
                handle.name,
                handle.run_id,
                error_message.as_deref().unwrap_or("unknown error")
            );
        }

        if let Err(e) =
            self.job_store
                .record_job_finish(handle.run_id, status, error_message.as_deref())
        {
            error!("Failed to persist finish of job {}: {}", handle.name, e);
        }
    }

    /// Non-blocking snapshot of a job's current state.
    pub fn status(&self, name: &str) -> JobSnapshot {
        let slots = self.slots.lock().unwrap();
        match slots.get(name) {
            None => JobSnapshot::idle(name),
            Some(slot) => JobSnapshot {
                name: name.to_string(),
                status: slot.status.into(),
                progress: slot.progress,
                message: slot.message.clone(),
                error_message: slot.error_message.clone(),
                started_at: Some(slot.started_at),
                finished_at: slot.finished_at,
                triggered_by: Some(slot.triggered_by.clone()),
            },
        }
    }

    /// Force-fail runs that have been running longer than the configured
    /// maximum. Returns the names of the runs that were timed out.
    pub fn watchdog_sweep(&self) -> Vec<String> {
        let mut timed_out = Vec::new();
        let mut slots = self.slots.lock().unwrap();
        for (name, slot) in slots.iter_mut() {
            if slot.status != JobRunStatus::Running {
                continue;
            }
            if slot.started.elapsed() <= self.max_run_duration {
                continue;
            }

            let message = format!(
                "Timed out after {}s",
                self.max_run_duration.as_secs()
            );
            warn!("Watchdog timing out job {} run {}", name, slot.run_id);
            slot.status = JobRunStatus::TimedOut;
            slot.error_message = Some(message.clone());
            slot.finished_at = Some(chrono::Utc::now().timestamp());
            if let Err(e) = self.job_store.record_job_finish(
                slot.run_id,
                JobRunStatus::TimedOut,
                Some(&message),
            ) {
                error!("Failed to persist timeout of job {}: {}", name, e);
            }
            timed_out.push(name.clone());
        }
        timed_out
    }

    /// Watchdog loop. Sweeps on an interval until shutdown.
    pub async fn run_watchdog(self: Arc<Self>, sweep_interval: Duration, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(sweep_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.watchdog_sweep();
                }
                _ = shutdown.cancelled() => {
                    info!("Job watchdog stopped");
                    break;
                }
            }
        }
    }

    /// Acquire the slot and run the job body on the blocking pool. Returns
    /// `AlreadyRunning` synchronously; the body completes in the background.
    pub fn spawn(
        self: &Arc<Self>,
        job: Arc<dyn BackgroundJob>,
        ctx: JobContext,
        triggered_by: &str,
    ) -> Result<(), JobError> {
        let handle = self.start(&job.name(), triggered_by)?;
        let orchestrator = self.clone();
        tokio::spawn(async move {
            let name = job.name();
            let result = tokio::task::spawn_blocking({
                let job = job.clone();
                let ctx = ctx.clone();
                let handle_ref = JobHandle {
                    name: handle.name.clone(),
                    seq: handle.seq,
                    run_id: handle.run_id,
                };
                move || job.execute(&ctx, &handle_ref)
            })
            .await;

            let outcome = match result {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => Err(e.to_string()),
                Err(join_err) => Err(format!("Job panicked: {}", join_err)),
            };
            if outcome.is_err() {
                error!("Job {} finished with error", name);
            }
            orchestrator.complete(handle, outcome);
        });
        Ok(())
    }
}

//! Background job orchestration.
//!
//! At most one run per job name at a time. Runs are tracked in memory for
//! progress reporting and persisted to the job store for history; a watchdog
//! force-fails runs that exceed the configured maximum duration.

mod context;
mod job;
pub mod jobs;
mod orchestrator;

pub use context::JobContext;
pub use job::{BackgroundJob, JobError};
pub use orchestrator::{JobHandle, JobOrchestrator, JobSnapshot, JobStatus};

use super::{load_index_entries, rebuild_job_name};
use crate::background_jobs::{BackgroundJob, JobContext, JobError, JobHandle};
use crate::tracks::SimilarityType;

/// Full rebuild of one similarity type's index from persisted vectors.
pub struct IndexRebuildJob {
    similarity_type: SimilarityType,
}

impl IndexRebuildJob {
    pub fn new(similarity_type: SimilarityType) -> Self {
        Self { similarity_type }
    }
}

impl BackgroundJob for IndexRebuildJob {
    fn name(&self) -> String {
        rebuild_job_name(self.similarity_type)
    }

    fn description(&self) -> &'static str {
        "Rebuilds one vector index from the persisted feature vectors"
    }

    fn execute(&self, ctx: &JobContext, handle: &JobHandle) -> Result<(), JobError> {
        ctx.orchestrator
            .report_progress(handle, 5.0, "Loading vectors");
        let entries = load_index_entries(ctx.library_store.as_ref(), self.similarity_type)
            .map_err(|e| JobError::ExecutionFailed(e.to_string()))?;

        if ctx.is_cancelled() {
            return Err(JobError::Cancelled);
        }

        let count = entries.len();
        ctx.orchestrator.report_progress(
            handle,
            50.0,
            &format!("Building index from {} vectors", count),
        );
        let generation = ctx
            .index_manager
            .build(self.similarity_type, entries)
            .map_err(|e| JobError::ExecutionFailed(e.to_string()))?;

        ctx.orchestrator.report_progress(
            handle,
            100.0,
            &format!("Generation {} live with {} vectors", generation, count),
        );
        Ok(())
    }
}

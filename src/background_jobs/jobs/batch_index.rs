use super::BATCH_INDEX_JOB_NAME;
use crate::background_jobs::{BackgroundJob, JobContext, JobError, JobHandle};
use crate::tracks::{SimilarityType, TrackStatus};
use crate::vector_index::fuse_combined;
use std::collections::BTreeSet;

/// Sweeps analyzed-but-unindexed tracks into the live indexes and advances
/// their lifecycle status.
pub struct BatchIndexJob;

impl BackgroundJob for BatchIndexJob {
    fn name(&self) -> String {
        BATCH_INDEX_JOB_NAME.to_string()
    }

    fn description(&self) -> &'static str {
        "Adds pending analyzed tracks to the live vector indexes"
    }

    fn execute(&self, ctx: &JobContext, handle: &JobHandle) -> Result<(), JobError> {
        let fail = |e: anyhow::Error| JobError::ExecutionFailed(e.to_string());

        // BTreeSet for a stable sweep order across runs.
        let mut pending: BTreeSet<String> = BTreeSet::new();
        for similarity_type in [SimilarityType::Essentia, SimilarityType::Tensorflow] {
            if ctx.index_manager.is_built(similarity_type) {
                pending.extend(
                    ctx.library_store
                        .list_unindexed_tracks(similarity_type)
                        .map_err(fail)?,
                );
            }
        }

        let total = pending.len();
        ctx.orchestrator.report_progress(
            handle,
            0.0,
            &format!("{} tracks pending indexing", total),
        );

        for (i, track_id) in pending.iter().enumerate() {
            if ctx.is_cancelled() {
                return Err(JobError::Cancelled);
            }
            index_track(ctx, track_id).map_err(|e| JobError::ExecutionFailed(e.to_string()))?;
            ctx.library_store
                .set_track_status(track_id, TrackStatus::Indexed)
                .map_err(fail)?;
            ctx.orchestrator.report_progress(
                handle,
                (i + 1) as f64 / total as f64 * 100.0,
                &format!("Indexed {}/{} tracks", i + 1, total),
            );
        }

        ctx.orchestrator
            .report_progress(handle, 100.0, &format!("Indexed {} tracks", total));
        Ok(())
    }
}

/// Add every available vector of a track to the built indexes, fusing the
/// combined entry when both sources are present.
fn index_track(ctx: &JobContext, track_id: &str) -> anyhow::Result<()> {
    let mut essentia = None;
    let mut tensorflow = None;
    for similarity_type in [SimilarityType::Essentia, SimilarityType::Tensorflow] {
        if let Some(feature) = ctx
            .library_store
            .get_feature_vector(track_id, similarity_type)?
        {
            if ctx.index_manager.is_built(similarity_type) {
                ctx.index_manager
                    .add(similarity_type, track_id, feature.vector.clone())?;
            }
            match similarity_type {
                SimilarityType::Essentia => essentia = Some(feature.vector),
                SimilarityType::Tensorflow => tensorflow = Some(feature.vector),
                SimilarityType::Combined => unreachable!(),
            }
        }
    }

    if let (Some(essentia), Some(tensorflow)) = (essentia, tensorflow) {
        if ctx.index_manager.is_built(SimilarityType::Combined) {
            ctx.index_manager.add(
                SimilarityType::Combined,
                track_id,
                fuse_combined(&essentia, &tensorflow),
            )?;
        }
    }
    Ok(())
}

//! Concrete background jobs.

mod batch_index;
mod index_rebuild;

pub use batch_index::BatchIndexJob;
pub use index_rebuild::IndexRebuildJob;

use crate::library_store::LibraryStore;
use crate::tracks::SimilarityType;
use crate::vector_index::fuse_combined;
use anyhow::Result;
use std::collections::HashMap;

/// Job name for a full index rebuild of one similarity type.
pub fn rebuild_job_name(similarity_type: SimilarityType) -> String {
    format!("rebuild_index:{}", similarity_type)
}

/// Job name for the unindexed-track sweep.
pub const BATCH_INDEX_JOB_NAME: &str = "batch_index";

/// Load every index entry for a similarity type from the library store.
/// For the combined space, only tracks holding both source vectors qualify.
pub fn load_index_entries(
    library: &dyn LibraryStore,
    similarity_type: SimilarityType,
) -> Result<Vec<(String, Vec<f32>)>> {
    match similarity_type {
        SimilarityType::Essentia | SimilarityType::Tensorflow => {
            library.list_vectors(similarity_type)
        }
        SimilarityType::Combined => {
            let tensorflow: HashMap<String, Vec<f32>> = library
                .list_vectors(SimilarityType::Tensorflow)?
                .into_iter()
                .collect();
            Ok(library
                .list_vectors(SimilarityType::Essentia)?
                .into_iter()
                .filter_map(|(id, essentia)| {
                    tensorflow
                        .get(&id)
                        .map(|tf| (id, fuse_combined(&essentia, tf)))
                })
                .collect())
        }
    }
}

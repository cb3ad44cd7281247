//! SimilarityStore trait definition.

use crate::tracks::SimilarityType;
use crate::vector_index::SearchHit;
use anyhow::Result;

/// Trait for similarity cache storage backends.
pub trait SimilarityStore: Send + Sync {
    /// Cached neighbors of a source track, ordered by score descending then
    /// target id ascending.
    fn get_neighbors(
        &self,
        source_track_id: &str,
        similarity_type: SimilarityType,
        limit: usize,
    ) -> Result<Vec<SearchHit>>;

    /// Persist a batch of neighbors for one source in a single transaction,
    /// replacing any existing row for the same (source, target, type).
    fn insert_neighbors(
        &self,
        source_track_id: &str,
        similarity_type: SimilarityType,
        neighbors: &[SearchHit],
    ) -> Result<()>;

    /// Delete every cached pair where the track appears as source OR target,
    /// across all similarity types. Returns the number of rows removed.
    fn delete_for_track(&self, track_id: &str) -> Result<usize>;
}

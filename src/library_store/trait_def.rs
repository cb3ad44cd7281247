//! LibraryStore trait definition.

use super::models::{PlaylistCandidate, TrackAnalysis};
use crate::tracks::{FeatureVector, SimilarityType, Track, TrackStatus};
use anyhow::Result;

/// Trait for library storage backends.
pub trait LibraryStore: Send + Sync {
    // =========================================================================
    // Tracks
    // =========================================================================

    /// Insert or update a track record.
    fn upsert_track(&self, track: &Track) -> Result<()>;

    /// Get a track by ID.
    fn get_track(&self, track_id: &str) -> Result<Option<Track>>;

    /// Advance the lifecycle status of a track.
    fn set_track_status(&self, track_id: &str, status: TrackStatus) -> Result<()>;

    /// Soft-activate or deactivate a track. Deactivated tracks stay on disk
    /// because playlists may still reference them.
    fn set_track_active(&self, track_id: &str, active: bool) -> Result<()>;

    // =========================================================================
    // Feature vectors
    // =========================================================================

    /// Replace the active feature vector for (track, similarity type).
    fn upsert_feature_vector(&self, vector: &FeatureVector) -> Result<()>;

    /// Get the active feature vector for (track, similarity type).
    fn get_feature_vector(
        &self,
        track_id: &str,
        similarity_type: SimilarityType,
    ) -> Result<Option<FeatureVector>>;

    /// All vectors of a similarity type for active tracks, for index builds.
    fn list_vectors(&self, similarity_type: SimilarityType) -> Result<Vec<(String, Vec<f32>)>>;

    /// Active track IDs that hold a vector of the given type but whose
    /// lifecycle status is still behind `indexed`.
    fn list_unindexed_tracks(&self, similarity_type: SimilarityType) -> Result<Vec<String>>;

    // =========================================================================
    // Analysis summaries
    // =========================================================================

    /// Insert or update the analysis summary row for a track.
    fn upsert_analysis(&self, analysis: &TrackAnalysis) -> Result<()>;

    /// Get the analysis summary for a track.
    fn get_analysis(&self, track_id: &str) -> Result<Option<TrackAnalysis>>;

    /// Quality-gated playlist candidates: active tracks, status analyzed or
    /// indexed, quality_score >= confidence_threshold or manual_override set.
    fn list_candidates(&self) -> Result<Vec<PlaylistCandidate>>;
}

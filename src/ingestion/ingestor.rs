use super::models::{FeatureDelivery, IngestError, IngestOutcome};
use crate::library_store::{LibraryStore, TrackAnalysis};
use crate::similarity::SimilarityCache;
use crate::tracks::{
    AnalysisQuality, FeatureVector, SimilarityType, TrackStatus, DEFAULT_CONFIDENCE_THRESHOLD,
};
use crate::vector_index::{fuse_combined, IndexError, VectorIndexManager};
use std::sync::Arc;
use tracing::{debug, info};

/// Applies feature deliveries: persists the vector and analysis summary,
/// invalidates stale cache entries, refreshes the live indexes and advances
/// the track lifecycle.
pub struct FeatureIngestor {
    library: Arc<dyn LibraryStore>,
    index: Arc<VectorIndexManager>,
    cache: Arc<SimilarityCache>,
}

impl FeatureIngestor {
    pub fn new(
        library: Arc<dyn LibraryStore>,
        index: Arc<VectorIndexManager>,
        cache: Arc<SimilarityCache>,
    ) -> Self {
        Self {
            library,
            index,
            cache,
        }
    }

    pub fn ingest(&self, delivery: FeatureDelivery) -> Result<IngestOutcome, IngestError> {
        if delivery.similarity_type == SimilarityType::Combined {
            return Err(IngestError::InvalidDelivery(
                "combined vectors are derived internally, not delivered".to_string(),
            ));
        }
        let expected = self.index.dimension_of(delivery.similarity_type);
        if delivery.vector.len() != expected {
            return Err(IngestError::Index(IndexError::DimensionMismatch {
                similarity_type: delivery.similarity_type,
                expected,
                actual: delivery.vector.len(),
            }));
        }

        let track = self
            .library
            .get_track(&delivery.track_id)?
            .ok_or_else(|| IngestError::UnknownTrack(delivery.track_id.clone()))?;

        let now = chrono::Utc::now().timestamp();
        self.library.upsert_feature_vector(&FeatureVector {
            track_id: delivery.track_id.clone(),
            similarity_type: delivery.similarity_type,
            vector: delivery.vector.clone(),
            analyzed_at: now,
            analyzer_version: delivery.analyzer_version.clone(),
        })?;

        self.update_analysis(&delivery, now)?;

        if track.status == TrackStatus::Discovered
            || track.status == TrackStatus::HasMetadata
            || track.status == TrackStatus::Failed
        {
            self.library
                .set_track_status(&delivery.track_id, TrackStatus::Analyzed)?;
        }

        // Swap the new vector into the live index first, then drop the cached
        // scores: a read-through racing the swap recomputes against the new
        // index, never re-caches neighbors of the old vector.
        let indexed = self.refresh_index(&delivery)?;
        if indexed {
            self.library
                .set_track_status(&delivery.track_id, TrackStatus::Indexed)?;
        }
        let invalidated_pairs = self.cache.invalidate(&delivery.track_id)?;

        info!(
            "Ingested {} vector for track {} (indexed: {}, invalidated {} pairs)",
            delivery.similarity_type, delivery.track_id, indexed, invalidated_pairs
        );
        Ok(IngestOutcome {
            track_id: delivery.track_id,
            similarity_type: delivery.similarity_type,
            indexed,
            invalidated_pairs,
        })
    }

    /// Soft-deactivate a track: it leaves the indexes and the cache but its
    /// rows stay, since playlists may reference it.
    pub fn deactivate_track(&self, track_id: &str) -> Result<(), IngestError> {
        self.library
            .get_track(track_id)?
            .ok_or_else(|| IngestError::UnknownTrack(track_id.to_string()))?;

        self.library.set_track_active(track_id, false)?;
        let invalidated = self.cache.invalidate(track_id)?;
        for similarity_type in SimilarityType::ALL {
            self.index.remove(similarity_type, track_id);
        }
        info!(
            "Deactivated track {} ({} cached pairs dropped)",
            track_id, invalidated
        );
        Ok(())
    }

    /// Merge the delivery into the per-track analysis summary. The essentia
    /// delivery owns the primary quality fields and scalars; the tensorflow
    /// delivery contributes the secondary score.
    fn update_analysis(&self, delivery: &FeatureDelivery, now: i64) -> Result<(), IngestError> {
        let existing = self.library.get_analysis(&delivery.track_id)?;

        let mut analysis = match (existing, &delivery.features) {
            (Some(existing), _) => existing,
            (None, Some(features)) => TrackAnalysis {
                track_id: delivery.track_id.clone(),
                bpm: features.bpm,
                energy: features.energy,
                valence: features.valence,
                genre: features.genre.clone(),
                quality: AnalysisQuality {
                    quality_score: 0.0,
                    secondary_score: None,
                    confidence_threshold: delivery
                        .confidence_threshold
                        .unwrap_or(DEFAULT_CONFIDENCE_THRESHOLD),
                    manual_override: false,
                    override_reason: None,
                },
                analyzed_at: now,
                analyzer_version: delivery.analyzer_version.clone(),
            },
            (None, None) => {
                if delivery.similarity_type == SimilarityType::Essentia {
                    return Err(IngestError::InvalidDelivery(format!(
                        "first essentia delivery for track {} must carry scalar features",
                        delivery.track_id
                    )));
                }
                // A tensorflow vector without a summary row has nowhere to
                // put its score yet; the essentia delivery will follow.
                debug!(
                    "No analysis summary for track {} yet, deferring secondary score",
                    delivery.track_id
                );
                return Ok(());
            }
        };

        if let Some(features) = &delivery.features {
            analysis.bpm = features.bpm;
            analysis.energy = features.energy;
            analysis.valence = features.valence;
            analysis.genre = features.genre.clone();
        }
        match delivery.similarity_type {
            SimilarityType::Essentia => {
                analysis.quality.quality_score = delivery.quality_score;
                if let Some(threshold) = delivery.confidence_threshold {
                    analysis.quality.confidence_threshold = threshold;
                }
                analysis.quality.manual_override = delivery.manual_override;
                analysis.quality.override_reason = delivery.override_reason.clone();
                analysis.analyzed_at = now;
                analysis.analyzer_version = delivery.analyzer_version.clone();
            }
            SimilarityType::Tensorflow => {
                analysis.quality.secondary_score = Some(delivery.quality_score);
            }
            SimilarityType::Combined => unreachable!("rejected above"),
        }

        self.library.upsert_analysis(&analysis)?;
        Ok(())
    }

    /// Refresh the live indexes with the new vector. The combined index is
    /// refreshed too once both source vectors exist.
    fn refresh_index(&self, delivery: &FeatureDelivery) -> Result<bool, IngestError> {
        let mut indexed = false;
        if self.index.is_built(delivery.similarity_type) {
            self.index.add(
                delivery.similarity_type,
                &delivery.track_id,
                delivery.vector.clone(),
            )?;
            indexed = true;
        }

        if self.index.is_built(SimilarityType::Combined) {
            let essentia = self
                .library
                .get_feature_vector(&delivery.track_id, SimilarityType::Essentia)?;
            let tensorflow = self
                .library
                .get_feature_vector(&delivery.track_id, SimilarityType::Tensorflow)?;
            if let (Some(essentia), Some(tensorflow)) = (essentia, tensorflow) {
                self.index.add(
                    SimilarityType::Combined,
                    &delivery.track_id,
                    fuse_combined(&essentia.vector, &tensorflow.vector),
                )?;
                indexed = true;
            }
        }
        Ok(indexed)
    }
}

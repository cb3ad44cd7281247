use crate::similarity::SimilarityError;
use crate::tracks::SimilarityType;
use crate::vector_index::IndexError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Unknown track: {0}")]
    UnknownTrack(String),
    #[error("Invalid delivery: {0}")]
    InvalidDelivery(String),
    #[error(transparent)]
    Index(#[from] IndexError),
    #[error(transparent)]
    Similarity(#[from] SimilarityError),
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

/// Scalar features extracted alongside the vector. Required on the first
/// essentia delivery for a track; later deliveries may omit them to keep
/// the existing summary values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScalarFeatures {
    pub bpm: f64,
    pub energy: f64,
    pub valence: f64,
    pub genre: Option<String>,
}

/// One analysis result for one (track, similarity type) pair. This is the
/// only shape the core accepts numeric analysis data through.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureDelivery {
    pub track_id: String,
    pub similarity_type: SimilarityType,
    pub vector: Vec<f32>,
    pub quality_score: f64,
    /// Defaults to [`crate::tracks::DEFAULT_CONFIDENCE_THRESHOLD`].
    pub confidence_threshold: Option<f64>,
    #[serde(default)]
    pub manual_override: bool,
    pub override_reason: Option<String>,
    pub analyzer_version: String,
    pub features: Option<ScalarFeatures>,
}

/// What a delivery ended up doing.
#[derive(Debug, Clone, Serialize)]
pub struct IngestOutcome {
    pub track_id: String,
    pub similarity_type: SimilarityType,
    /// Whether the live index was refreshed with this vector.
    pub indexed: bool,
    /// How many cached similarity pairs were invalidated.
    pub invalidated_pairs: usize,
}

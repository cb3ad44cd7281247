use crate::tracks::SimilarityType;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum IndexError {
    #[error("Vector for {similarity_type} has dimension {actual}, index expects {expected}")]
    DimensionMismatch {
        similarity_type: SimilarityType,
        expected: usize,
        actual: usize,
    },
    #[error("No {0} index has been built yet")]
    NotBuilt(SimilarityType),
}

/// A single search result. Scores live in [0, 1], higher is more similar.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub track_id: String,
    pub score: f64,
}

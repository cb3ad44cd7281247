use crate::tracks::SimilarityType;
use crate::vector_index::IndexError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimilarityError {
    #[error(transparent)]
    Index(#[from] IndexError),
    #[error("Track {track_id} has no {similarity_type} vector")]
    NoVector {
        track_id: String,
        similarity_type: SimilarityType,
    },
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

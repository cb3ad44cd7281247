//! Shared domain types for tracks, feature vectors and analysis quality.

mod models;

pub use models::{
    decode_vector, encode_vector, AnalysisQuality, FeatureVector, SimilarityType, Track,
    TrackStatus, DEFAULT_CONFIDENCE_THRESHOLD,
};

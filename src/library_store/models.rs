//! Data models for the library database.

use crate::tracks::AnalysisQuality;
use serde::{Deserialize, Serialize};

/// Per-track analysis summary, one row per track.
///
/// Scalar features come from the primary (essentia) analyzer; the secondary
/// (tensorflow) analyzer contributes only its quality score. Playlist
/// templates rank candidates against these scalars.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackAnalysis {
    pub track_id: String,
    pub bpm: f64,
    /// Average loudness-derived energy in [0, 1].
    pub energy: f64,
    /// Emotional valence in [0, 1] (0 = dark, 1 = bright).
    pub valence: f64,
    pub genre: Option<String>,
    pub quality: AnalysisQuality,
    pub analyzed_at: i64,
    pub analyzer_version: String,
}

/// A quality-gated candidate for playlist selection.
///
/// Joined from `tracks` and `track_analysis`; only active tracks whose
/// status is analyzed or indexed and which pass the quality gate appear.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaylistCandidate {
    pub track_id: String,
    pub duration_secs: f64,
    pub bpm: f64,
    pub energy: f64,
    pub valence: f64,
    pub genre: Option<String>,
    pub quality_score: f64,
}

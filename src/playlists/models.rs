use super::templates::TemplateParams;
use crate::similarity::SimilarityError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("Unknown template: {0}")]
    UnknownTemplate(String),
    #[error("Invalid template parameters: {0}")]
    InvalidTemplateParameters(String),
    #[error("Template requires {required} tracks, only {available} candidates qualify")]
    InsufficientCandidates { required: usize, available: usize },
    #[error(transparent)]
    Similarity(#[from] SimilarityError),
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

/// A named, reusable selection rule set. Templates are write-once: there is
/// no update path, so a template referenced by provenance rows can never
/// drift from what those rows recorded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaylistTemplate {
    pub id: String,
    pub name: String,
    pub params: TemplateParams,
    pub created_at: i64,
}

/// A committed playlist. `track_count` and `total_duration_secs` are derived
/// from the track rows and recomputed on every commit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Playlist {
    pub id: String,
    pub template_id: String,
    pub name: String,
    pub track_count: usize,
    pub total_duration_secs: f64,
    pub created_at: i64,
}

/// One position of a playlist, with the provenance of its selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaylistEntry {
    pub position: usize,
    pub track_id: String,
    pub selection_score: f64,
    /// Which rule selected this track. Written at selection time, never
    /// reconstructed afterwards.
    pub selection_reason: String,
    pub duration_secs: f64,
}

/// Provenance record of one generation attempt, successful or not.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedPlaylist {
    pub id: i64,
    pub template_id: String,
    /// The exact parameters the attempt ran with, as JSON.
    pub params_json: String,
    /// Set only on success.
    pub playlist_id: Option<String>,
    pub success: bool,
    pub error_message: Option<String>,
    /// Mean selection score over the committed tracks.
    pub quality_score: Option<f64>,
    /// How many times the logical playlist of this template has been
    /// regenerated. Never reset.
    pub regeneration_count: i64,
    pub created_at: i64,
}

/// Derived playlist figures, recomputed from the track rows on demand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaylistStats {
    pub track_count: usize,
    pub total_duration_secs: f64,
}

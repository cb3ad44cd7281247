//! Playlist template parameters.

use crate::tracks::SimilarityType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const MAX_PLAYLIST_LENGTH: usize = 1000;

/// Attribute keys a custom template may target.
const CUSTOM_ATTRIBUTES: &[&str] = &["bpm", "energy", "valence", "quality"];

/// Upper bound used to normalize bpm distances into [0, 1].
pub(crate) const BPM_RANGE: f64 = 300.0;

/// Ordering of the final track list. The track id is always the secondary
/// key, so any ordering is deterministic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderBy {
    /// Descending selection score.
    #[default]
    SelectionScore,
    /// Descending bpm (e.g. workout playlists).
    Bpm,
}

/// The selection rule of a template, one variant per template type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TemplateRule {
    /// Neighbors of a seed track above a minimum similarity score.
    Similarity {
        seed_track_id: String,
        similarity_type: SimilarityType,
        min_score: f64,
    },
    /// Tracks closest to a target energy range.
    Energy { min_energy: f64, max_energy: f64 },
    /// Tracks closest to a target valence.
    Mood { target_valence: f64 },
    /// Tracks of one genre, ranked by quality.
    Genre { genre: String },
    /// Free-form attribute targets, ranked by mean attribute distance.
    Custom { targets: BTreeMap<String, f64> },
}

/// Full parameter set of a template. Serialized as JSON into the template
/// row and into every provenance record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateParams {
    #[serde(flatten)]
    pub rule: TemplateRule,
    /// Exact number of tracks the playlist must contain.
    pub length: usize,
    #[serde(default)]
    pub order_by: OrderBy,
}

impl TemplateParams {
    /// Check every constraint value against its domain range.
    pub fn validate(&self) -> Result<(), String> {
        if self.length == 0 {
            return Err("length must be at least 1".to_string());
        }
        if self.length > MAX_PLAYLIST_LENGTH {
            return Err(format!("length must be at most {}", MAX_PLAYLIST_LENGTH));
        }

        match &self.rule {
            TemplateRule::Similarity {
                seed_track_id,
                min_score,
                ..
            } => {
                if seed_track_id.is_empty() {
                    return Err("seed_track_id must not be empty".to_string());
                }
                if !(0.0..=1.0).contains(min_score) {
                    return Err(format!("min_score {} outside [0, 1]", min_score));
                }
            }
            TemplateRule::Energy {
                min_energy,
                max_energy,
            } => {
                if !(0.0..=1.0).contains(min_energy) || !(0.0..=1.0).contains(max_energy) {
                    return Err("energy bounds must be within [0, 1]".to_string());
                }
                if min_energy > max_energy {
                    return Err(format!(
                        "min_energy {} above max_energy {}",
                        min_energy, max_energy
                    ));
                }
            }
            TemplateRule::Mood { target_valence } => {
                if !(0.0..=1.0).contains(target_valence) {
                    return Err(format!("target_valence {} outside [0, 1]", target_valence));
                }
            }
            TemplateRule::Genre { genre } => {
                if genre.trim().is_empty() {
                    return Err("genre must not be empty".to_string());
                }
            }
            TemplateRule::Custom { targets } => {
                if targets.is_empty() {
                    return Err("custom template needs at least one target".to_string());
                }
                for (key, value) in targets {
                    if !CUSTOM_ATTRIBUTES.contains(&key.as_str()) {
                        return Err(format!(
                            "unknown attribute '{}', expected one of {:?}",
                            key, CUSTOM_ATTRIBUTES
                        ));
                    }
                    let range = if key == "bpm" { 0.0..=BPM_RANGE } else { 0.0..=1.0 };
                    if !range.contains(value) {
                        return Err(format!("target {} = {} outside {:?}", key, value, range));
                    }
                }
            }
        }
        Ok(())
    }
}

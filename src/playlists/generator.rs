//! Template evaluation and playlist assembly.

use super::models::{GenerateError, GeneratedPlaylist, Playlist, PlaylistEntry, PlaylistTemplate};
use super::templates::{OrderBy, TemplateParams, TemplateRule, BPM_RANGE};
use super::trait_def::PlaylistStore;
use crate::library_store::{LibraryStore, PlaylistCandidate};
use crate::similarity::SimilarityCache;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// Extra neighbors fetched beyond the template length, so the quality gate
/// and min_score filter have room to drop some.
const SIMILARITY_FETCH_MARGIN: usize = 16;

struct Selected {
    track_id: String,
    selection_score: f64,
    selection_reason: String,
    bpm: f64,
    duration_secs: f64,
}

/// Walks one generation attempt through selection, scoring, ordering and an
/// all-or-nothing commit. Every attempt, failed or not, leaves a provenance
/// row behind.
pub struct PlaylistGenerator {
    store: Arc<dyn PlaylistStore>,
    library: Arc<dyn LibraryStore>,
    cache: Arc<SimilarityCache>,
}

impl PlaylistGenerator {
    pub fn new(
        store: Arc<dyn PlaylistStore>,
        library: Arc<dyn LibraryStore>,
        cache: Arc<SimilarityCache>,
    ) -> Self {
        Self {
            store,
            library,
            cache,
        }
    }

    /// Generate a playlist from a template, optionally overriding its
    /// parameters for this attempt only.
    pub fn generate(
        &self,
        template_id: &str,
        params_override: Option<TemplateParams>,
    ) -> Result<GeneratedPlaylist, GenerateError> {
        let template = self
            .store
            .get_template(template_id)?
            .ok_or_else(|| GenerateError::UnknownTemplate(template_id.to_string()))?;
        let params = params_override.unwrap_or_else(|| template.params.clone());
        let params_json =
            serde_json::to_string(&params).map_err(|e| GenerateError::Storage(e.into()))?;

        match self.select_and_score(&params) {
            Ok(selected) => self.commit(&template, &params, &params_json, selected),
            Err(e) => {
                // A failed attempt does not replace the latest playlist, so
                // the count carries over unchanged.
                let regeneration_count = self
                    .store
                    .latest_successful_generation(template_id)?
                    .map(|g| g.regeneration_count)
                    .unwrap_or(0);
                self.store.record_generation(
                    template_id,
                    &params_json,
                    None,
                    false,
                    Some(&e.to_string()),
                    None,
                    regeneration_count,
                )?;
                Err(e)
            }
        }
    }

    fn select_and_score(&self, params: &TemplateParams) -> Result<Vec<Selected>, GenerateError> {
        params
            .validate()
            .map_err(GenerateError::InvalidTemplateParameters)?;

        let pool = self.library.list_candidates()?;
        debug!("Candidate pool holds {} tracks", pool.len());

        let mut qualifying = match &params.rule {
            TemplateRule::Similarity {
                seed_track_id,
                similarity_type,
                min_score,
            } => {
                let by_id: HashMap<&str, &PlaylistCandidate> =
                    pool.iter().map(|c| (c.track_id.as_str(), c)).collect();
                let neighbors = self.cache.get_similar(
                    seed_track_id,
                    *similarity_type,
                    params.length + SIMILARITY_FETCH_MARGIN,
                )?;
                neighbors
                    .into_iter()
                    .filter(|hit| hit.score >= *min_score)
                    .filter_map(|hit| {
                        by_id.get(hit.track_id.as_str()).map(|candidate| Selected {
                            track_id: hit.track_id.clone(),
                            selection_score: hit.score,
                            selection_reason: format!(
                                "{} similarity {:.3} to seed {}",
                                similarity_type, hit.score, seed_track_id
                            ),
                            bpm: candidate.bpm,
                            duration_secs: candidate.duration_secs,
                        })
                    })
                    .collect::<Vec<_>>()
            }
            rule => pool
                .iter()
                .filter_map(|candidate| {
                    score_candidate(rule, candidate).map(|(score, reason)| Selected {
                        track_id: candidate.track_id.clone(),
                        selection_score: score,
                        selection_reason: reason,
                        bpm: candidate.bpm,
                        duration_secs: candidate.duration_secs,
                    })
                })
                .collect(),
        };

        // Selection order: best score first, track id breaking ties.
        qualifying.sort_by(|a, b| {
            b.selection_score
                .partial_cmp(&a.selection_score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.track_id.cmp(&b.track_id))
        });

        if qualifying.len() < params.length {
            return Err(GenerateError::InsufficientCandidates {
                required: params.length,
                available: qualifying.len(),
            });
        }
        qualifying.truncate(params.length);
        Ok(qualifying)
    }

    fn commit(
        &self,
        template: &PlaylistTemplate,
        params: &TemplateParams,
        params_json: &str,
        mut selected: Vec<Selected>,
    ) -> Result<GeneratedPlaylist, GenerateError> {
        // Selection already ordered by score; the alternate key reorders
        // with the track id still as the mandatory secondary key.
        if params.order_by == OrderBy::Bpm {
            selected.sort_by(|a, b| {
                b.bpm
                    .partial_cmp(&a.bpm)
                    .unwrap_or(Ordering::Equal)
                    .then_with(|| a.track_id.cmp(&b.track_id))
            });
        }

        let quality_score =
            selected.iter().map(|s| s.selection_score).sum::<f64>() / selected.len() as f64;
        let total_duration_secs = selected.iter().map(|s| s.duration_secs).sum::<f64>();

        let entries: Vec<PlaylistEntry> = selected
            .into_iter()
            .enumerate()
            .map(|(position, s)| PlaylistEntry {
                position,
                track_id: s.track_id,
                selection_score: s.selection_score,
                selection_reason: s.selection_reason,
                duration_secs: s.duration_secs,
            })
            .collect();

        let playlist = Playlist {
            id: Uuid::new_v4().to_string(),
            template_id: template.id.clone(),
            name: template.name.clone(),
            track_count: entries.len(),
            total_duration_secs,
            created_at: chrono::Utc::now().timestamp(),
        };

        let regeneration_count = self
            .store
            .latest_successful_generation(&template.id)?
            .map(|g| g.regeneration_count + 1)
            .unwrap_or(0);

        self.store.commit_playlist(&playlist, &entries)?;
        let generation = self.store.record_generation(
            &template.id,
            params_json,
            Some(&playlist.id),
            true,
            None,
            Some(quality_score),
            regeneration_count,
        )?;
        info!(
            "Generated playlist {} from template {} ({} tracks, quality {:.3}, regeneration {})",
            playlist.id,
            template.id,
            playlist.track_count,
            quality_score,
            regeneration_count
        );
        Ok(generation)
    }
}

/// Score one candidate against a template-match rule. None excludes the
/// candidate outright (genre mismatch).
fn score_candidate(rule: &TemplateRule, candidate: &PlaylistCandidate) -> Option<(f64, String)> {
    match rule {
        TemplateRule::Energy {
            min_energy,
            max_energy,
        } => {
            let distance = if candidate.energy < *min_energy {
                min_energy - candidate.energy
            } else if candidate.energy > *max_energy {
                candidate.energy - max_energy
            } else {
                0.0
            };
            let reason = if distance == 0.0 {
                format!(
                    "energy {:.2} within target [{:.2}, {:.2}]",
                    candidate.energy, min_energy, max_energy
                )
            } else {
                format!(
                    "energy {:.2} at {:.2} from target [{:.2}, {:.2}]",
                    candidate.energy, distance, min_energy, max_energy
                )
            };
            Some(((1.0 - distance).clamp(0.0, 1.0), reason))
        }
        TemplateRule::Mood { target_valence } => {
            let distance = (candidate.valence - target_valence).abs();
            Some((
                (1.0 - distance).clamp(0.0, 1.0),
                format!(
                    "valence {:.2} vs target {:.2}",
                    candidate.valence, target_valence
                ),
            ))
        }
        TemplateRule::Genre { genre } => {
            let matches = candidate
                .genre
                .as_deref()
                .map(|g| g.eq_ignore_ascii_case(genre))
                .unwrap_or(false);
            if !matches {
                return None;
            }
            Some((
                candidate.quality_score,
                format!(
                    "genre '{}' match, quality {:.2}",
                    genre, candidate.quality_score
                ),
            ))
        }
        TemplateRule::Custom { targets } => {
            let mut total = 0.0;
            for (key, target) in targets {
                total += match key.as_str() {
                    "bpm" => ((candidate.bpm - target).abs() / BPM_RANGE).min(1.0),
                    "energy" => (candidate.energy - target).abs(),
                    "valence" => (candidate.valence - target).abs(),
                    "quality" => (candidate.quality_score - target).abs(),
                    // Unknown keys are rejected by validation before this.
                    _ => return None,
                };
            }
            let mean = total / targets.len() as f64;
            Some((
                (1.0 - mean).clamp(0.0, 1.0),
                format!("custom attribute distance {:.3}", mean),
            ))
        }
        TemplateRule::Similarity { .. } => unreachable!("similarity handled by the cache path"),
    }
}

//! PlaylistStore trait definition.

use super::models::{GeneratedPlaylist, Playlist, PlaylistEntry, PlaylistStats, PlaylistTemplate};
use anyhow::Result;

/// Trait for playlist storage backends.
pub trait PlaylistStore: Send + Sync {
    /// Insert a new template. Fails if the id is taken; templates are never
    /// updated in place.
    fn insert_template(&self, template: &PlaylistTemplate) -> Result<()>;

    /// Get a template by id.
    fn get_template(&self, template_id: &str) -> Result<Option<PlaylistTemplate>>;

    /// Commit a playlist and all its track rows in one transaction. Either
    /// everything lands or nothing does.
    fn commit_playlist(&self, playlist: &Playlist, entries: &[PlaylistEntry]) -> Result<()>;

    /// Get a playlist header row.
    fn get_playlist(&self, playlist_id: &str) -> Result<Option<Playlist>>;

    /// The track rows of a playlist, ordered by position.
    fn get_playlist_entries(&self, playlist_id: &str) -> Result<Vec<PlaylistEntry>>;

    /// Recompute track count and total duration from the track rows.
    /// None for an unknown playlist.
    fn playlist_stats(&self, playlist_id: &str) -> Result<Option<PlaylistStats>>;

    /// Append one provenance row and return it with id and timestamp filled.
    #[allow(clippy::too_many_arguments)]
    fn record_generation(
        &self,
        template_id: &str,
        params_json: &str,
        playlist_id: Option<&str>,
        success: bool,
        error_message: Option<&str>,
        quality_score: Option<f64>,
        regeneration_count: i64,
    ) -> Result<GeneratedPlaylist>;

    /// The most recent successful generation of a template, if any.
    fn latest_successful_generation(&self, template_id: &str)
        -> Result<Option<GeneratedPlaylist>>;
}

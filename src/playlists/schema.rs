//! SQLite schema definitions for the playlists database.

use crate::sqlite_column;
use crate::sqlite_persistence::{Column, SqlType, Table, VersionedSchema, DEFAULT_TIMESTAMP};

/// Selection rule sets. Write-once: referenced templates must never change.
const PLAYLIST_TEMPLATES_TABLE: Table = Table {
    name: "playlist_templates",
    columns: &[
        sqlite_column!("id", &SqlType::Text, is_primary_key = true),
        sqlite_column!("name", &SqlType::Text, non_null = true),
        sqlite_column!("params_json", &SqlType::Text, non_null = true),
        sqlite_column!(
            "created_at",
            &SqlType::Integer,
            non_null = true,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    indices: &[],
    unique_constraints: &[],
};

const PLAYLISTS_TABLE: Table = Table {
    name: "playlists",
    columns: &[
        sqlite_column!("id", &SqlType::Text, is_primary_key = true),
        sqlite_column!("template_id", &SqlType::Text, non_null = true),
        sqlite_column!("name", &SqlType::Text, non_null = true),
        sqlite_column!("track_count", &SqlType::Integer, non_null = true),
        sqlite_column!("total_duration_secs", &SqlType::Real, non_null = true),
        sqlite_column!(
            "created_at",
            &SqlType::Integer,
            non_null = true,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    indices: &[("idx_playlists_template", "template_id")],
    unique_constraints: &[],
};

/// Playlist membership with selection provenance. Positions are contiguous
/// from 0 within a playlist.
const PLAYLIST_TRACKS_TABLE: Table = Table {
    name: "playlist_tracks",
    columns: &[
        sqlite_column!("playlist_id", &SqlType::Text, non_null = true),
        sqlite_column!("position", &SqlType::Integer, non_null = true),
        sqlite_column!("track_id", &SqlType::Text, non_null = true),
        sqlite_column!("selection_score", &SqlType::Real, non_null = true),
        sqlite_column!("selection_reason", &SqlType::Text, non_null = true),
        sqlite_column!("duration_secs", &SqlType::Real, non_null = true),
    ],
    indices: &[("idx_playlist_tracks_playlist", "playlist_id")],
    unique_constraints: &[&["playlist_id", "position"]],
};

/// Provenance of every generation attempt, failed ones included.
const GENERATED_PLAYLISTS_TABLE: Table = Table {
    name: "generated_playlists",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("template_id", &SqlType::Text, non_null = true),
        sqlite_column!("params_json", &SqlType::Text, non_null = true),
        sqlite_column!("playlist_id", &SqlType::Text),
        sqlite_column!("success", &SqlType::Integer, non_null = true),
        sqlite_column!("error_message", &SqlType::Text),
        sqlite_column!("quality_score", &SqlType::Real),
        sqlite_column!(
            "regeneration_count",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("0")
        ),
        sqlite_column!(
            "created_at",
            &SqlType::Integer,
            non_null = true,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    indices: &[("idx_generated_playlists_template", "template_id")],
    unique_constraints: &[],
};

pub const PLAYLISTS_VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 0,
    tables: &[
        PLAYLIST_TEMPLATES_TABLE,
        PLAYLISTS_TABLE,
        PLAYLIST_TRACKS_TABLE,
        GENERATED_PLAYLISTS_TABLE,
    ],
    migration: None,
}];

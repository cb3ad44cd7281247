//! SQLite schema definitions for the library database.

use crate::sqlite_column;
use crate::sqlite_persistence::{Column, SqlType, Table, VersionedSchema, DEFAULT_TIMESTAMP};

/// Track records (created by the discovery collaborator).
const TRACKS_TABLE: Table = Table {
    name: "tracks",
    columns: &[
        sqlite_column!("id", &SqlType::Text, is_primary_key = true),
        sqlite_column!("file_ref", &SqlType::Text, non_null = true),
        sqlite_column!("title", &SqlType::Text),
        sqlite_column!("duration_secs", &SqlType::Real, non_null = true),
        sqlite_column!("status", &SqlType::Text, non_null = true),
        sqlite_column!("active", &SqlType::Integer, non_null = true, default_value = Some("1")),
        sqlite_column!(
            "created_at",
            &SqlType::Integer,
            non_null = true,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
        sqlite_column!(
            "updated_at",
            &SqlType::Integer,
            non_null = true,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    indices: &[("idx_tracks_status", "status")],
    unique_constraints: &[],
};

/// Feature vectors, one active row per (track, similarity type).
/// Rows are immutable; re-analysis replaces the whole row.
const TRACK_FEATURES_TABLE: Table = Table {
    name: "track_features",
    columns: &[
        sqlite_column!("track_id", &SqlType::Text, non_null = true),
        sqlite_column!("similarity_type", &SqlType::Text, non_null = true),
        sqlite_column!("vector", &SqlType::Blob, non_null = true),
        sqlite_column!("analyzed_at", &SqlType::Integer, non_null = true),
        sqlite_column!("analyzer_version", &SqlType::Text, non_null = true),
    ],
    indices: &[("idx_track_features_type", "similarity_type")],
    unique_constraints: &[&["track_id", "similarity_type"]],
};

/// Analysis summaries: one row per track, primary (essentia) scalar features
/// plus primary and secondary analyzer quality columns.
const TRACK_ANALYSIS_TABLE: Table = Table {
    name: "track_analysis",
    columns: &[
        sqlite_column!("track_id", &SqlType::Text, is_primary_key = true),
        sqlite_column!("bpm", &SqlType::Real, non_null = true),
        sqlite_column!("energy", &SqlType::Real, non_null = true),
        sqlite_column!("valence", &SqlType::Real, non_null = true),
        sqlite_column!("genre", &SqlType::Text),
        sqlite_column!("quality_score", &SqlType::Real, non_null = true),
        sqlite_column!("secondary_score", &SqlType::Real),
        sqlite_column!("confidence_threshold", &SqlType::Real, non_null = true),
        sqlite_column!("manual_override", &SqlType::Integer, non_null = true, default_value = Some("0")),
        sqlite_column!("override_reason", &SqlType::Text),
        sqlite_column!("analyzed_at", &SqlType::Integer, non_null = true),
        sqlite_column!("analyzer_version", &SqlType::Text, non_null = true),
    ],
    indices: &[],
    unique_constraints: &[],
};

pub const LIBRARY_VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 0,
    tables: &[TRACKS_TABLE, TRACK_FEATURES_TABLE, TRACK_ANALYSIS_TABLE],
    migration: None,
}];

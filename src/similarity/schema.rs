//! SQLite schema definitions for the similarity database.

use crate::sqlite_column;
use crate::sqlite_persistence::{Column, SqlType, Table, VersionedSchema, DEFAULT_TIMESTAMP};

/// Cached pairwise similarity scores. One row per directed pair per type;
/// both directions are deleted when either endpoint is invalidated.
const TRACK_SIMILARITY_TABLE: Table = Table {
    name: "track_similarity",
    columns: &[
        sqlite_column!("source_track_id", &SqlType::Text, non_null = true),
        sqlite_column!("target_track_id", &SqlType::Text, non_null = true),
        sqlite_column!("similarity_type", &SqlType::Text, non_null = true),
        sqlite_column!("score", &SqlType::Real, non_null = true),
        sqlite_column!(
            "created_at",
            &SqlType::Integer,
            non_null = true,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    indices: &[
        ("idx_track_similarity_source", "source_track_id"),
        ("idx_track_similarity_target", "target_track_id"),
    ],
    unique_constraints: &[&["source_track_id", "target_track_id", "similarity_type"]],
};

pub const SIMILARITY_VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 0,
    tables: &[TRACK_SIMILARITY_TABLE],
    migration: None,
}];

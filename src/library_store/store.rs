//! SQLite-backed library store implementation.

use super::models::{PlaylistCandidate, TrackAnalysis};
use super::schema::LIBRARY_VERSIONED_SCHEMAS;
use super::trait_def::LibraryStore;
use crate::sqlite_persistence::migrate_if_needed;
use crate::tracks::{
    decode_vector, encode_vector, AnalysisQuality, FeatureVector, SimilarityType, Track,
    TrackStatus,
};
use anyhow::{anyhow, Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::info;

/// SQLite-backed library store.
#[derive(Clone)]
pub struct SqliteLibraryStore {
    read_conn: Arc<Mutex<Connection>>,
    write_conn: Arc<Mutex<Connection>>,
}

impl SqliteLibraryStore {
    /// Create a new SqliteLibraryStore.
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_path_ref = db_path.as_ref();

        let mut write_conn = Connection::open_with_flags(
            db_path_ref,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI
                | rusqlite::OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .context("Failed to open library database")?;

        migrate_if_needed(&mut write_conn, "library", LIBRARY_VERSIONED_SCHEMAS)?;

        write_conn
            .pragma_update(None, "journal_mode", "WAL")
            .context("Failed to set WAL mode on library write connection")?;

        let read_conn = Connection::open_with_flags(
            db_path_ref,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY
                | rusqlite::OpenFlags::SQLITE_OPEN_URI
                | rusqlite::OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .context("Failed to open library database for reading")?;

        read_conn
            .pragma_update(None, "journal_mode", "WAL")
            .context("Failed to set WAL mode on library read connection")?;

        let track_count: usize =
            read_conn.query_row("SELECT COUNT(*) FROM tracks", [], |r| r.get(0))?;
        let vector_count: usize =
            read_conn.query_row("SELECT COUNT(*) FROM track_features", [], |r| r.get(0))?;
        info!(
            "Library store ready: {} tracks, {} feature vectors",
            track_count, vector_count
        );

        Ok(Self {
            read_conn: Arc::new(Mutex::new(read_conn)),
            write_conn: Arc::new(Mutex::new(write_conn)),
        })
    }
}

fn row_to_track(row: &rusqlite::Row) -> rusqlite::Result<Track> {
    let status_str: String = row.get(4)?;
    Ok(Track {
        id: row.get(0)?,
        file_ref: row.get(1)?,
        title: row.get(2)?,
        duration_secs: row.get(3)?,
        status: TrackStatus::parse(&status_str).unwrap_or(TrackStatus::Failed),
        active: row.get::<_, i32>(5)? != 0,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

impl LibraryStore for SqliteLibraryStore {
    fn upsert_track(&self, track: &Track) -> Result<()> {
        let conn = self.write_conn.lock().unwrap();
        conn.execute(
            "INSERT INTO tracks (id, file_ref, title, duration_secs, status, active)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(id) DO UPDATE SET
                file_ref = excluded.file_ref,
                title = excluded.title,
                duration_secs = excluded.duration_secs,
                status = excluded.status,
                active = excluded.active,
                updated_at = cast(strftime('%s','now') as int)",
            params![
                track.id,
                track.file_ref,
                track.title,
                track.duration_secs,
                track.status.as_str(),
                track.active as i32,
            ],
        )?;
        Ok(())
    }

    fn get_track(&self, track_id: &str) -> Result<Option<Track>> {
        let conn = self.read_conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(
            "SELECT id, file_ref, title, duration_secs, status, active, created_at, updated_at
             FROM tracks WHERE id = ?1",
        )?;
        let result = stmt.query_row(params![track_id], row_to_track).optional()?;
        Ok(result)
    }

    fn set_track_status(&self, track_id: &str, status: TrackStatus) -> Result<()> {
        let conn = self.write_conn.lock().unwrap();
        let updated = conn.execute(
            "UPDATE tracks SET status = ?2, updated_at = cast(strftime('%s','now') as int)
             WHERE id = ?1",
            params![track_id, status.as_str()],
        )?;
        if updated == 0 {
            return Err(anyhow!("Unknown track: {}", track_id));
        }
        Ok(())
    }

    fn set_track_active(&self, track_id: &str, active: bool) -> Result<()> {
        let conn = self.write_conn.lock().unwrap();
        let updated = conn.execute(
            "UPDATE tracks SET active = ?2, updated_at = cast(strftime('%s','now') as int)
             WHERE id = ?1",
            params![track_id, active as i32],
        )?;
        if updated == 0 {
            return Err(anyhow!("Unknown track: {}", track_id));
        }
        Ok(())
    }

    fn upsert_feature_vector(&self, vector: &FeatureVector) -> Result<()> {
        let conn = self.write_conn.lock().unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO track_features
             (track_id, similarity_type, vector, analyzed_at, analyzer_version)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                vector.track_id,
                vector.similarity_type.as_str(),
                encode_vector(&vector.vector),
                vector.analyzed_at,
                vector.analyzer_version,
            ],
        )?;
        Ok(())
    }

    fn get_feature_vector(
        &self,
        track_id: &str,
        similarity_type: SimilarityType,
    ) -> Result<Option<FeatureVector>> {
        let conn = self.read_conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(
            "SELECT track_id, similarity_type, vector, analyzed_at, analyzer_version
             FROM track_features WHERE track_id = ?1 AND similarity_type = ?2",
        )?;
        let row = stmt
            .query_row(params![track_id, similarity_type.as_str()], |row| {
                let blob: Vec<u8> = row.get(2)?;
                Ok((
                    row.get::<_, String>(0)?,
                    blob,
                    row.get::<_, i64>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })
            .optional()?;

        match row {
            None => Ok(None),
            Some((track_id, blob, analyzed_at, analyzer_version)) => {
                let vector = decode_vector(&blob)
                    .ok_or_else(|| anyhow!("Corrupt vector blob for track {}", track_id))?;
                Ok(Some(FeatureVector {
                    track_id,
                    similarity_type,
                    vector,
                    analyzed_at,
                    analyzer_version,
                }))
            }
        }
    }

    fn list_vectors(&self, similarity_type: SimilarityType) -> Result<Vec<(String, Vec<f32>)>> {
        let conn = self.read_conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(
            "SELECT f.track_id, f.vector FROM track_features f
             JOIN tracks t ON t.id = f.track_id
             WHERE f.similarity_type = ?1 AND t.active = 1
             ORDER BY f.track_id",
        )?;
        let rows: Vec<(String, Vec<u8>)> = stmt
            .query_map(params![similarity_type.as_str()], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })?
            .collect::<rusqlite::Result<_>>()?;

        let mut result = Vec::with_capacity(rows.len());
        for (track_id, blob) in rows {
            let vector = decode_vector(&blob)
                .ok_or_else(|| anyhow!("Corrupt vector blob for track {}", track_id))?;
            result.push((track_id, vector));
        }
        Ok(result)
    }

    fn list_unindexed_tracks(&self, similarity_type: SimilarityType) -> Result<Vec<String>> {
        let conn = self.read_conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(
            "SELECT f.track_id FROM track_features f
             JOIN tracks t ON t.id = f.track_id
             WHERE f.similarity_type = ?1 AND t.active = 1 AND t.status != 'indexed'
             ORDER BY f.track_id",
        )?;
        let ids = stmt
            .query_map(params![similarity_type.as_str()], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(ids)
    }

    fn upsert_analysis(&self, analysis: &TrackAnalysis) -> Result<()> {
        let conn = self.write_conn.lock().unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO track_analysis
             (track_id, bpm, energy, valence, genre, quality_score, secondary_score,
              confidence_threshold, manual_override, override_reason, analyzed_at,
              analyzer_version)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                analysis.track_id,
                analysis.bpm,
                analysis.energy,
                analysis.valence,
                analysis.genre,
                analysis.quality.quality_score,
                analysis.quality.secondary_score,
                analysis.quality.confidence_threshold,
                analysis.quality.manual_override as i32,
                analysis.quality.override_reason,
                analysis.analyzed_at,
                analysis.analyzer_version,
            ],
        )?;
        Ok(())
    }

    fn get_analysis(&self, track_id: &str) -> Result<Option<TrackAnalysis>> {
        let conn = self.read_conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(
            "SELECT track_id, bpm, energy, valence, genre, quality_score, secondary_score,
                    confidence_threshold, manual_override, override_reason, analyzed_at,
                    analyzer_version
             FROM track_analysis WHERE track_id = ?1",
        )?;
        let result = stmt
            .query_row(params![track_id], |row| {
                Ok(TrackAnalysis {
                    track_id: row.get(0)?,
                    bpm: row.get(1)?,
                    energy: row.get(2)?,
                    valence: row.get(3)?,
                    genre: row.get(4)?,
                    quality: AnalysisQuality {
                        quality_score: row.get(5)?,
                        secondary_score: row.get(6)?,
                        confidence_threshold: row.get(7)?,
                        manual_override: row.get::<_, i32>(8)? != 0,
                        override_reason: row.get(9)?,
                    },
                    analyzed_at: row.get(10)?,
                    analyzer_version: row.get(11)?,
                })
            })
            .optional()?;
        Ok(result)
    }

    fn list_candidates(&self) -> Result<Vec<PlaylistCandidate>> {
        let conn = self.read_conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(
            "SELECT t.id, t.duration_secs, a.bpm, a.energy, a.valence, a.genre, a.quality_score
             FROM tracks t
             JOIN track_analysis a ON a.track_id = t.id
             WHERE t.active = 1
               AND t.status IN ('analyzed', 'indexed')
               AND (a.manual_override = 1 OR a.quality_score >= a.confidence_threshold)
             ORDER BY t.id",
        )?;
        let candidates = stmt
            .query_map([], |row| {
                Ok(PlaylistCandidate {
                    track_id: row.get(0)?,
                    duration_secs: row.get(1)?,
                    bpm: row.get(2)?,
                    energy: row.get(3)?,
                    valence: row.get(4)?,
                    genre: row.get(5)?,
                    quality_score: row.get(6)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(candidates)
    }
}

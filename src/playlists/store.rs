//! SQLite-backed playlist store implementation.

use super::models::{GeneratedPlaylist, Playlist, PlaylistEntry, PlaylistStats, PlaylistTemplate};
use super::schema::PLAYLISTS_VERSIONED_SCHEMAS;
use super::templates::TemplateParams;
use super::trait_def::PlaylistStore;
use crate::sqlite_persistence::migrate_if_needed;
use anyhow::{anyhow, Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::info;

/// SQLite-backed playlist store.
#[derive(Clone)]
pub struct SqlitePlaylistStore {
    read_conn: Arc<Mutex<Connection>>,
    write_conn: Arc<Mutex<Connection>>,
}

impl SqlitePlaylistStore {
    /// Create a new SqlitePlaylistStore.
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_path_ref = db_path.as_ref();

        let mut write_conn = Connection::open_with_flags(
            db_path_ref,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI
                | rusqlite::OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .context("Failed to open playlists database")?;

        migrate_if_needed(&mut write_conn, "playlists", PLAYLISTS_VERSIONED_SCHEMAS)?;

        write_conn
            .pragma_update(None, "journal_mode", "WAL")
            .context("Failed to set WAL mode on playlists write connection")?;

        let read_conn = Connection::open_with_flags(
            db_path_ref,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY
                | rusqlite::OpenFlags::SQLITE_OPEN_URI
                | rusqlite::OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .context("Failed to open playlists database for reading")?;

        read_conn
            .pragma_update(None, "journal_mode", "WAL")
            .context("Failed to set WAL mode on playlists read connection")?;

        let playlist_count: usize =
            read_conn.query_row("SELECT COUNT(*) FROM playlists", [], |r| r.get(0))?;
        info!("Playlist store ready: {} playlists", playlist_count);

        Ok(Self {
            read_conn: Arc::new(Mutex::new(read_conn)),
            write_conn: Arc::new(Mutex::new(write_conn)),
        })
    }
}

fn row_to_generation(row: &rusqlite::Row) -> rusqlite::Result<GeneratedPlaylist> {
    Ok(GeneratedPlaylist {
        id: row.get(0)?,
        template_id: row.get(1)?,
        params_json: row.get(2)?,
        playlist_id: row.get(3)?,
        success: row.get::<_, i32>(4)? != 0,
        error_message: row.get(5)?,
        quality_score: row.get(6)?,
        regeneration_count: row.get(7)?,
        created_at: row.get(8)?,
    })
}

const GENERATION_COLUMNS: &str = "id, template_id, params_json, playlist_id, success, \
     error_message, quality_score, regeneration_count, created_at";

impl PlaylistStore for SqlitePlaylistStore {
    fn insert_template(&self, template: &PlaylistTemplate) -> Result<()> {
        let params_json = serde_json::to_string(&template.params)?;
        let conn = self.write_conn.lock().unwrap();
        conn.execute(
            "INSERT INTO playlist_templates (id, name, params_json) VALUES (?1, ?2, ?3)",
            params![template.id, template.name, params_json],
        )
        .with_context(|| format!("Failed to insert template {}", template.id))?;
        Ok(())
    }

    fn get_template(&self, template_id: &str) -> Result<Option<PlaylistTemplate>> {
        let conn = self.read_conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(
            "SELECT id, name, params_json, created_at FROM playlist_templates WHERE id = ?1",
        )?;
        let row = stmt
            .query_row(params![template_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i64>(3)?,
                ))
            })
            .optional()?;

        match row {
            None => Ok(None),
            Some((id, name, params_json, created_at)) => {
                let params: TemplateParams = serde_json::from_str(&params_json)
                    .with_context(|| format!("Corrupt params for template {}", id))?;
                Ok(Some(PlaylistTemplate {
                    id,
                    name,
                    params,
                    created_at,
                }))
            }
        }
    }

    fn commit_playlist(&self, playlist: &Playlist, entries: &[PlaylistEntry]) -> Result<()> {
        if playlist.track_count != entries.len() {
            return Err(anyhow!(
                "Playlist {} claims {} tracks but has {} rows",
                playlist.id,
                playlist.track_count,
                entries.len()
            ));
        }

        let mut conn = self.write_conn.lock().unwrap();
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO playlists (id, template_id, name, track_count, total_duration_secs)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                playlist.id,
                playlist.template_id,
                playlist.name,
                playlist.track_count,
                playlist.total_duration_secs,
            ],
        )?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO playlist_tracks
                 (playlist_id, position, track_id, selection_score, selection_reason,
                  duration_secs)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for entry in entries {
                stmt.execute(params![
                    playlist.id,
                    entry.position,
                    entry.track_id,
                    entry.selection_score,
                    entry.selection_reason,
                    entry.duration_secs,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn get_playlist(&self, playlist_id: &str) -> Result<Option<Playlist>> {
        let conn = self.read_conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(
            "SELECT id, template_id, name, track_count, total_duration_secs, created_at
             FROM playlists WHERE id = ?1",
        )?;
        let playlist = stmt
            .query_row(params![playlist_id], |row| {
                Ok(Playlist {
                    id: row.get(0)?,
                    template_id: row.get(1)?,
                    name: row.get(2)?,
                    track_count: row.get(3)?,
                    total_duration_secs: row.get(4)?,
                    created_at: row.get(5)?,
                })
            })
            .optional()?;
        Ok(playlist)
    }

    fn get_playlist_entries(&self, playlist_id: &str) -> Result<Vec<PlaylistEntry>> {
        let conn = self.read_conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(
            "SELECT position, track_id, selection_score, selection_reason, duration_secs
             FROM playlist_tracks WHERE playlist_id = ?1 ORDER BY position",
        )?;
        let entries = stmt
            .query_map(params![playlist_id], |row| {
                Ok(PlaylistEntry {
                    position: row.get(0)?,
                    track_id: row.get(1)?,
                    selection_score: row.get(2)?,
                    selection_reason: row.get(3)?,
                    duration_secs: row.get(4)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }

    fn playlist_stats(&self, playlist_id: &str) -> Result<Option<PlaylistStats>> {
        let conn = self.read_conn.lock().unwrap();
        let exists: Option<i64> = conn
            .prepare_cached("SELECT 1 FROM playlists WHERE id = ?1")?
            .query_row(params![playlist_id], |row| row.get(0))
            .optional()?;
        if exists.is_none() {
            return Ok(None);
        }

        let mut stmt = conn.prepare_cached(
            "SELECT COUNT(*), COALESCE(SUM(duration_secs), 0)
             FROM playlist_tracks WHERE playlist_id = ?1",
        )?;
        let stats = stmt.query_row(params![playlist_id], |row| {
            Ok(PlaylistStats {
                track_count: row.get(0)?,
                total_duration_secs: row.get(1)?,
            })
        })?;
        Ok(Some(stats))
    }

    fn record_generation(
        &self,
        template_id: &str,
        params_json: &str,
        playlist_id: Option<&str>,
        success: bool,
        error_message: Option<&str>,
        quality_score: Option<f64>,
        regeneration_count: i64,
    ) -> Result<GeneratedPlaylist> {
        let conn = self.write_conn.lock().unwrap();
        conn.execute(
            "INSERT INTO generated_playlists
             (template_id, params_json, playlist_id, success, error_message, quality_score,
              regeneration_count)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                template_id,
                params_json,
                playlist_id,
                success as i32,
                error_message,
                quality_score,
                regeneration_count,
            ],
        )?;
        let id = conn.last_insert_rowid();
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {GENERATION_COLUMNS} FROM generated_playlists WHERE id = ?1"
        ))?;
        let generation = stmt.query_row(params![id], row_to_generation)?;
        Ok(generation)
    }

    fn latest_successful_generation(
        &self,
        template_id: &str,
    ) -> Result<Option<GeneratedPlaylist>> {
        let conn = self.read_conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {GENERATION_COLUMNS} FROM generated_playlists
             WHERE template_id = ?1 AND success = 1 ORDER BY id DESC LIMIT 1"
        ))?;
        let generation = stmt
            .query_row(params![template_id], row_to_generation)
            .optional()?;
        Ok(generation)
    }
}

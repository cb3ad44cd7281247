//! SQLite-backed similarity store implementation.

use super::schema::SIMILARITY_VERSIONED_SCHEMAS;
use super::trait_def::SimilarityStore;
use crate::sqlite_persistence::migrate_if_needed;
use crate::tracks::SimilarityType;
use crate::vector_index::SearchHit;
use anyhow::{Context, Result};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::info;

/// SQLite-backed similarity store.
#[derive(Clone)]
pub struct SqliteSimilarityStore {
    read_conn: Arc<Mutex<Connection>>,
    write_conn: Arc<Mutex<Connection>>,
}

impl SqliteSimilarityStore {
    /// Create a new SqliteSimilarityStore.
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_path_ref = db_path.as_ref();

        let mut write_conn = Connection::open_with_flags(
            db_path_ref,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI
                | rusqlite::OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .context("Failed to open similarity database")?;

        migrate_if_needed(&mut write_conn, "similarity", SIMILARITY_VERSIONED_SCHEMAS)?;

        write_conn
            .pragma_update(None, "journal_mode", "WAL")
            .context("Failed to set WAL mode on similarity write connection")?;

        let read_conn = Connection::open_with_flags(
            db_path_ref,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY
                | rusqlite::OpenFlags::SQLITE_OPEN_URI
                | rusqlite::OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .context("Failed to open similarity database for reading")?;

        read_conn
            .pragma_update(None, "journal_mode", "WAL")
            .context("Failed to set WAL mode on similarity read connection")?;

        let pair_count: usize =
            read_conn.query_row("SELECT COUNT(*) FROM track_similarity", [], |r| r.get(0))?;
        info!("Similarity store ready: {} cached pairs", pair_count);

        Ok(Self {
            read_conn: Arc::new(Mutex::new(read_conn)),
            write_conn: Arc::new(Mutex::new(write_conn)),
        })
    }
}

impl SimilarityStore for SqliteSimilarityStore {
    fn get_neighbors(
        &self,
        source_track_id: &str,
        similarity_type: SimilarityType,
        limit: usize,
    ) -> Result<Vec<SearchHit>> {
        let conn = self.read_conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(
            "SELECT target_track_id, score FROM track_similarity
             WHERE source_track_id = ?1 AND similarity_type = ?2
             ORDER BY score DESC, target_track_id ASC
             LIMIT ?3",
        )?;
        let hits = stmt
            .query_map(
                params![source_track_id, similarity_type.as_str(), limit],
                |row| {
                    Ok(SearchHit {
                        track_id: row.get(0)?,
                        score: row.get(1)?,
                    })
                },
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(hits)
    }

    fn insert_neighbors(
        &self,
        source_track_id: &str,
        similarity_type: SimilarityType,
        neighbors: &[SearchHit],
    ) -> Result<()> {
        let mut conn = self.write_conn.lock().unwrap();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO track_similarity
                 (source_track_id, target_track_id, similarity_type, score)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(source_track_id, target_track_id, similarity_type)
                 DO UPDATE SET score = excluded.score,
                               created_at = cast(strftime('%s','now') as int)",
            )?;
            for neighbor in neighbors {
                stmt.execute(params![
                    source_track_id,
                    neighbor.track_id,
                    similarity_type.as_str(),
                    neighbor.score,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn delete_for_track(&self, track_id: &str) -> Result<usize> {
        let conn = self.write_conn.lock().unwrap();
        let deleted = conn.execute(
            "DELETE FROM track_similarity
             WHERE source_track_id = ?1 OR target_track_id = ?1",
            params![track_id],
        )?;
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_store() -> (SqliteSimilarityStore, TempDir) {
        let tmp = TempDir::new().unwrap();
        let store = SqliteSimilarityStore::new(tmp.path().join("similarity.db")).unwrap();
        (store, tmp)
    }

    fn hit(track_id: &str, score: f64) -> SearchHit {
        SearchHit {
            track_id: track_id.to_string(),
            score,
        }
    }

    #[test]
    fn test_neighbors_ordered_by_score_then_id() {
        let (store, _tmp) = create_test_store();
        store
            .insert_neighbors(
                "src",
                SimilarityType::Essentia,
                &[hit("c", 0.8), hit("a", 0.9), hit("b", 0.8)],
            )
            .unwrap();

        let neighbors = store
            .get_neighbors("src", SimilarityType::Essentia, 10)
            .unwrap();
        let ids: Vec<&str> = neighbors.iter().map(|h| h.track_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);

        let limited = store
            .get_neighbors("src", SimilarityType::Essentia, 2)
            .unwrap();
        assert_eq!(limited.len(), 2);
    }

    #[test]
    fn test_reinsert_replaces_score() {
        let (store, _tmp) = create_test_store();
        store
            .insert_neighbors("src", SimilarityType::Essentia, &[hit("a", 0.5)])
            .unwrap();
        store
            .insert_neighbors("src", SimilarityType::Essentia, &[hit("a", 0.9)])
            .unwrap();

        let neighbors = store
            .get_neighbors("src", SimilarityType::Essentia, 10)
            .unwrap();
        assert_eq!(neighbors.len(), 1);
        assert!((neighbors[0].score - 0.9).abs() < f64::EPSILON);
    }

    #[test]
    fn test_types_do_not_mix() {
        let (store, _tmp) = create_test_store();
        store
            .insert_neighbors("src", SimilarityType::Essentia, &[hit("a", 0.9)])
            .unwrap();

        assert!(store
            .get_neighbors("src", SimilarityType::Tensorflow, 10)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_delete_covers_both_directions_and_all_types() {
        let (store, _tmp) = create_test_store();
        store
            .insert_neighbors("x", SimilarityType::Essentia, &[hit("y", 0.9)])
            .unwrap();
        store
            .insert_neighbors("y", SimilarityType::Tensorflow, &[hit("x", 0.8)])
            .unwrap();
        store
            .insert_neighbors("y", SimilarityType::Essentia, &[hit("z", 0.7)])
            .unwrap();

        let deleted = store.delete_for_track("x").unwrap();
        assert_eq!(deleted, 2);

        assert!(store
            .get_neighbors("x", SimilarityType::Essentia, 10)
            .unwrap()
            .is_empty());
        assert!(store
            .get_neighbors("y", SimilarityType::Tensorflow, 10)
            .unwrap()
            .is_empty());
        // Unrelated pair survives.
        assert_eq!(
            store
                .get_neighbors("y", SimilarityType::Essentia, 10)
                .unwrap()
                .len(),
            1
        );
    }

    #[test]
    fn test_delete_missing_track_is_noop() {
        let (store, _tmp) = create_test_store();
        assert_eq!(store.delete_for_track("ghost").unwrap(), 0);
    }
}

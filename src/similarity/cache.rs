//! Read-through similarity cache.

use super::models::SimilarityError;
use super::trait_def::SimilarityStore;
use crate::library_store::LibraryStore;
use crate::tracks::SimilarityType;
use crate::vector_index::{fuse_combined, SearchHit, VectorIndexManager};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// Read-through cache over the vector indexes.
///
/// Populate and invalidate can race: an index query started before an
/// invalidation must not re-insert rows computed from the old vector. The
/// epoch counter is bumped on every invalidation; a populate that observes a
/// bump between its snapshot and its write drops the write and only returns
/// the computed rows to the caller. The re-check and the store write happen
/// under `write_lock`, which `invalidate` also holds across its bump and
/// delete, so an invalidation can never land between the two.
pub struct SimilarityCache {
    store: Arc<dyn SimilarityStore>,
    index: Arc<VectorIndexManager>,
    library: Arc<dyn LibraryStore>,
    invalidation_epoch: AtomicU64,
    write_lock: Mutex<()>,
}

impl SimilarityCache {
    pub fn new(
        store: Arc<dyn SimilarityStore>,
        index: Arc<VectorIndexManager>,
        library: Arc<dyn LibraryStore>,
    ) -> Self {
        Self {
            store,
            index,
            library,
            invalidation_epoch: AtomicU64::new(0),
            write_lock: Mutex::new(()),
        }
    }

    /// The `limit` most similar tracks to `track_id`, best first. The source
    /// track never appears in its own results.
    pub fn get_similar(
        &self,
        track_id: &str,
        similarity_type: SimilarityType,
        limit: usize,
    ) -> Result<Vec<SearchHit>, SimilarityError> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let cached = self.store.get_neighbors(track_id, similarity_type, limit)?;
        if cached.len() >= limit {
            return Ok(cached);
        }

        self.populate(track_id, similarity_type, limit)
    }

    fn populate(
        &self,
        track_id: &str,
        similarity_type: SimilarityType,
        limit: usize,
    ) -> Result<Vec<SearchHit>, SimilarityError> {
        let epoch = self.invalidation_epoch.load(Ordering::SeqCst);

        let query = self.query_vector(track_id, similarity_type)?;
        // Over-fetch by one so the self-match can be dropped.
        let mut hits = self.index.search(similarity_type, &query, limit + 1)?;
        hits.retain(|hit| hit.track_id != track_id);
        hits.truncate(limit);

        // The index search above runs unlocked; only the re-check and the
        // write are serialized against invalidation.
        let _guard = self.write_lock.lock().unwrap();
        if self.invalidation_epoch.load(Ordering::SeqCst) == epoch {
            self.store.insert_neighbors(track_id, similarity_type, &hits)?;
            debug!(
                "Cached {} {} neighbors for track {}",
                hits.len(),
                similarity_type,
                track_id
            );
        } else {
            warn!(
                "Stale cache write for track {} ({}) dropped, invalidated mid-populate",
                track_id, similarity_type
            );
        }
        Ok(hits)
    }

    /// Drop every cached pair touching the track, in both directions and
    /// across all similarity types. Returns the number of rows removed.
    pub fn invalidate(&self, track_id: &str) -> Result<usize, SimilarityError> {
        let _guard = self.write_lock.lock().unwrap();
        self.invalidation_epoch.fetch_add(1, Ordering::SeqCst);
        let deleted = self.store.delete_for_track(track_id)?;
        debug!("Invalidated {} cached pairs for track {}", deleted, track_id);
        Ok(deleted)
    }

    /// Resolve the query vector: the live index entry when present, the
    /// persisted vector otherwise (fused for the combined space).
    fn query_vector(
        &self,
        track_id: &str,
        similarity_type: SimilarityType,
    ) -> Result<Vec<f32>, SimilarityError> {
        if self.index.is_built(similarity_type) {
            if let Some(vector) = self.index.vector_of(similarity_type, track_id)? {
                return Ok(vector);
            }
        }

        let no_vector = || SimilarityError::NoVector {
            track_id: track_id.to_string(),
            similarity_type,
        };

        match similarity_type {
            SimilarityType::Essentia | SimilarityType::Tensorflow => Ok(self
                .library
                .get_feature_vector(track_id, similarity_type)?
                .ok_or_else(no_vector)?
                .vector),
            SimilarityType::Combined => {
                let essentia = self
                    .library
                    .get_feature_vector(track_id, SimilarityType::Essentia)?
                    .ok_or_else(no_vector)?;
                let tensorflow = self
                    .library
                    .get_feature_vector(track_id, SimilarityType::Tensorflow)?
                    .ok_or_else(no_vector)?;
                Ok(fuse_combined(&essentia.vector, &tensorflow.vector))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library_store::SqliteLibraryStore;
    use crate::similarity::SqliteSimilarityStore;
    use crate::tracks::{FeatureVector, Track, TrackStatus};
    use crate::vector_index::{IndexDimensions, IndexError};
    use tempfile::TempDir;

    struct Fixture {
        cache: SimilarityCache,
        store: Arc<SqliteSimilarityStore>,
        index: Arc<VectorIndexManager>,
        _tmp: TempDir,
    }

    fn fixture_with_tracks(entries: &[(&str, &[f32])]) -> Fixture {
        let tmp = TempDir::new().unwrap();
        let library =
            Arc::new(SqliteLibraryStore::new(tmp.path().join("library.db")).unwrap());
        let store =
            Arc::new(SqliteSimilarityStore::new(tmp.path().join("similarity.db")).unwrap());
        let index = Arc::new(VectorIndexManager::new(IndexDimensions {
            essentia: 2,
            tensorflow: 3,
        }));

        for (id, vector) in entries {
            library
                .upsert_track(&Track {
                    id: id.to_string(),
                    file_ref: format!("/music/{}.flac", id),
                    title: None,
                    duration_secs: 180.0,
                    status: TrackStatus::Indexed,
                    active: true,
                    created_at: 0,
                    updated_at: 0,
                })
                .unwrap();
            library
                .upsert_feature_vector(&FeatureVector {
                    track_id: id.to_string(),
                    similarity_type: SimilarityType::Essentia,
                    vector: vector.to_vec(),
                    analyzed_at: 0,
                    analyzer_version: "test".to_string(),
                })
                .unwrap();
        }
        index
            .build(
                SimilarityType::Essentia,
                entries
                    .iter()
                    .map(|(id, v)| (id.to_string(), v.to_vec()))
                    .collect(),
            )
            .unwrap();

        let cache = SimilarityCache::new(store.clone(), index.clone(), library);
        Fixture {
            cache,
            store,
            index,
            _tmp: tmp,
        }
    }

    const TRACKS: &[(&str, &[f32])] = &[
        ("a", &[1.0, 0.0]),
        ("b", &[0.9, 0.1]),
        ("c", &[0.0, 1.0]),
    ];

    #[test]
    fn test_miss_populates_and_excludes_self() {
        let f = fixture_with_tracks(TRACKS);

        let hits = f
            .cache
            .get_similar("a", SimilarityType::Essentia, 2)
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|h| h.track_id != "a"));
        assert_eq!(hits[0].track_id, "b");

        // The computed pairs were persisted.
        let cached = f
            .store
            .get_neighbors("a", SimilarityType::Essentia, 10)
            .unwrap();
        assert_eq!(cached.len(), 2);
    }

    #[test]
    fn test_hit_serves_from_store_not_index() {
        let f = fixture_with_tracks(TRACKS);
        f.cache
            .get_similar("a", SimilarityType::Essentia, 2)
            .unwrap();

        // Mutate the index; a cache hit must still serve the stored rows.
        f.index.remove(SimilarityType::Essentia, "b");
        let hits = f
            .cache
            .get_similar("a", SimilarityType::Essentia, 2)
            .unwrap();
        assert_eq!(hits[0].track_id, "b");
    }

    #[test]
    fn test_invalidate_forces_recompute() {
        let f = fixture_with_tracks(TRACKS);
        f.cache
            .get_similar("a", SimilarityType::Essentia, 2)
            .unwrap();

        f.index.remove(SimilarityType::Essentia, "b");
        let deleted = f.cache.invalidate("a").unwrap();
        assert_eq!(deleted, 2);

        let hits = f
            .cache
            .get_similar("a", SimilarityType::Essentia, 2)
            .unwrap();
        assert!(hits.iter().all(|h| h.track_id != "b"));
    }

    #[test]
    fn test_invalidate_removes_target_direction() {
        let f = fixture_with_tracks(TRACKS);
        f.cache
            .get_similar("a", SimilarityType::Essentia, 2)
            .unwrap();
        f.cache
            .get_similar("b", SimilarityType::Essentia, 2)
            .unwrap();

        // b appears as a's target and as its own source.
        f.cache.invalidate("b").unwrap();
        assert!(f
            .store
            .get_neighbors("b", SimilarityType::Essentia, 10)
            .unwrap()
            .is_empty());
        let remaining = f
            .store
            .get_neighbors("a", SimilarityType::Essentia, 10)
            .unwrap();
        assert!(remaining.iter().all(|h| h.track_id != "b"));
    }

    #[test]
    fn test_unbuilt_type_surfaces_not_built() {
        let f = fixture_with_tracks(TRACKS);
        let err = f
            .cache
            .get_similar("a", SimilarityType::Tensorflow, 2)
            .unwrap_err();
        match err {
            SimilarityError::NoVector { .. } => {}
            other => panic!("unexpected error: {other}"),
        }

        // Built but empty tensorflow index with a persisted vector: the
        // NotBuilt case shows through the combined space instead.
        f.index
            .build(SimilarityType::Tensorflow, Vec::new())
            .unwrap();
        let err = f
            .cache
            .get_similar("a", SimilarityType::Combined, 2)
            .unwrap_err();
        match err {
            SimilarityError::NoVector { .. } | SimilarityError::Index(IndexError::NotBuilt(_)) => {}
            other => panic!("unexpected error: {other}"),
        }
    }

    /// Flags when a populate is inside its store write, so the test can fire
    /// an invalidation into that window from another thread.
    struct SlowInsertStore {
        inner: Arc<SqliteSimilarityStore>,
        in_insert: Arc<std::sync::atomic::AtomicBool>,
    }

    impl SimilarityStore for SlowInsertStore {
        fn get_neighbors(
            &self,
            source_track_id: &str,
            similarity_type: SimilarityType,
            limit: usize,
        ) -> anyhow::Result<Vec<SearchHit>> {
            self.inner.get_neighbors(source_track_id, similarity_type, limit)
        }

        fn insert_neighbors(
            &self,
            source_track_id: &str,
            similarity_type: SimilarityType,
            neighbors: &[SearchHit],
        ) -> anyhow::Result<()> {
            self.in_insert.store(true, Ordering::SeqCst);
            std::thread::sleep(std::time::Duration::from_millis(50));
            self.inner.insert_neighbors(source_track_id, similarity_type, neighbors)
        }

        fn delete_for_track(&self, track_id: &str) -> anyhow::Result<usize> {
            self.inner.delete_for_track(track_id)
        }
    }

    #[test]
    fn test_invalidation_during_populate_leaves_no_rows() {
        let tmp = TempDir::new().unwrap();
        let library =
            Arc::new(SqliteLibraryStore::new(tmp.path().join("library.db")).unwrap());
        let inner =
            Arc::new(SqliteSimilarityStore::new(tmp.path().join("similarity.db")).unwrap());
        let index = Arc::new(VectorIndexManager::new(IndexDimensions {
            essentia: 2,
            tensorflow: 3,
        }));
        index
            .build(
                SimilarityType::Essentia,
                TRACKS
                    .iter()
                    .map(|(id, v)| (id.to_string(), v.to_vec()))
                    .collect(),
            )
            .unwrap();

        let in_insert = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let cache = Arc::new(SimilarityCache::new(
            Arc::new(SlowInsertStore {
                inner: inner.clone(),
                in_insert: in_insert.clone(),
            }),
            index,
            library,
        ));

        // Fires the invalidation while the populate is mid-write. It must
        // block until the write commits and then delete every row, never
        // interleave between the epoch re-check and the insert.
        let invalidator = {
            let cache = cache.clone();
            let in_insert = in_insert.clone();
            std::thread::spawn(move || {
                while !in_insert.load(Ordering::SeqCst) {
                    std::thread::sleep(std::time::Duration::from_millis(1));
                }
                cache.invalidate("a").unwrap()
            })
        };

        let hits = cache
            .get_similar("a", SimilarityType::Essentia, 2)
            .unwrap();
        assert_eq!(hits.len(), 2);

        let deleted = invalidator.join().unwrap();
        assert_eq!(deleted, 2);
        assert!(inner
            .get_neighbors("a", SimilarityType::Essentia, 10)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_zero_limit_short_circuits() {
        let f = fixture_with_tracks(TRACKS);
        assert!(f
            .cache
            .get_similar("a", SimilarityType::Essentia, 0)
            .unwrap()
            .is_empty());
        assert!(f
            .store
            .get_neighbors("a", SimilarityType::Essentia, 10)
            .unwrap()
            .is_empty());
    }
}

use super::types::SearchHit;
use rayon::prelude::*;
use std::cmp::Ordering;

/// One immutable index snapshot.
///
/// Track ids are kept sorted and vectors are stored as a flat row-major
/// buffer, so a snapshot is a pair of contiguous allocations that can be
/// scanned without chasing pointers.
pub struct IndexGeneration {
    generation: u64,
    dimension: usize,
    track_ids: Vec<String>,
    vectors: Vec<f32>,
}

impl IndexGeneration {
    /// Build a snapshot from (id, vector) pairs. Callers must have validated
    /// dimensions already; a later pair with the same id replaces the earlier
    /// one.
    pub fn new(generation: u64, dimension: usize, entries: Vec<(String, Vec<f32>)>) -> Self {
        let mut sorted = entries;
        sorted.sort_by(|a, b| a.0.cmp(&b.0));
        sorted.dedup_by(|later, earlier| {
            if later.0 == earlier.0 {
                std::mem::swap(&mut earlier.1, &mut later.1);
                true
            } else {
                false
            }
        });

        let mut track_ids = Vec::with_capacity(sorted.len());
        let mut vectors = Vec::with_capacity(sorted.len() * dimension);
        for (id, vector) in sorted {
            track_ids.push(id);
            vectors.extend_from_slice(&vector);
        }
        Self {
            generation,
            dimension,
            track_ids,
            vectors,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.track_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.track_ids.is_empty()
    }

    pub fn contains(&self, track_id: &str) -> bool {
        self.track_ids
            .binary_search_by(|id| id.as_str().cmp(track_id))
            .is_ok()
    }

    pub fn vector_of(&self, track_id: &str) -> Option<&[f32]> {
        let idx = self
            .track_ids
            .binary_search_by(|id| id.as_str().cmp(track_id))
            .ok()?;
        Some(&self.vectors[idx * self.dimension..(idx + 1) * self.dimension])
    }

    /// Derive the next snapshot with `track_id` set to `vector`.
    pub fn with_entry(&self, track_id: &str, vector: Vec<f32>) -> Self {
        let mut entries = self.entries();
        match entries.binary_search_by(|(id, _)| id.as_str().cmp(track_id)) {
            Ok(idx) => entries[idx].1 = vector,
            Err(idx) => entries.insert(idx, (track_id.to_string(), vector)),
        }
        Self::new(self.generation + 1, self.dimension, entries)
    }

    /// Derive the next snapshot without `track_id`. Returns None when the id
    /// is absent and there is nothing to do.
    pub fn without_entry(&self, track_id: &str) -> Option<Self> {
        let mut entries = self.entries();
        let idx = entries
            .binary_search_by(|(id, _)| id.as_str().cmp(track_id))
            .ok()?;
        entries.remove(idx);
        Some(Self::new(self.generation + 1, self.dimension, entries))
    }

    fn entries(&self) -> Vec<(String, Vec<f32>)> {
        self.track_ids
            .iter()
            .enumerate()
            .map(|(i, id)| {
                (
                    id.clone(),
                    self.vectors[i * self.dimension..(i + 1) * self.dimension].to_vec(),
                )
            })
            .collect()
    }

    /// Exhaustive k-NN scan. Cosine similarity mapped to [0, 1] via
    /// (1 + cos) / 2; results ordered by score descending, ties broken by
    /// ascending track id so repeated scans of the same snapshot agree.
    pub fn search(&self, query: &[f32], k: usize) -> Vec<SearchHit> {
        debug_assert_eq!(query.len(), self.dimension);
        if k == 0 || self.track_ids.is_empty() {
            return Vec::new();
        }

        let mut hits: Vec<SearchHit> = self
            .vectors
            .par_chunks_exact(self.dimension.max(1))
            .zip(self.track_ids.par_iter())
            .map(|(vector, id)| SearchHit {
                track_id: id.clone(),
                score: similarity_score(query, vector),
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.track_id.cmp(&b.track_id))
        });
        hits.truncate(k);
        hits
    }
}

/// Cosine similarity shifted into [0, 1]. Zero-norm vectors have no
/// direction and score 0.5 against everything.
fn similarity_score(a: &[f32], b: &[f32]) -> f64 {
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += *x as f64 * *y as f64;
        norm_a += *x as f64 * *x as f64;
        norm_b += *y as f64 * *y as f64;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.5;
    }
    let cos = (dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(-1.0, 1.0);
    (1.0 + cos) / 2.0
}
